pub mod convert;
pub mod xml;

use crate::error::PosError;
use crate::model::Pos;

/// Two-pass pipeline: OSM XML → node → POS candidate.
pub fn process_node(xml: &str, node_id: u64) -> Result<Pos, PosError> {
    let node = xml::parse_node(xml, node_id)?;
    convert::convert(&node)
}
