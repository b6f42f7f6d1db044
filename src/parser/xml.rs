use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::error::{NodeLookupError, PosError};
use crate::model::OsmNode;

/// Parse an OSM API `node` document. Every structural failure is reported
/// as the node not being found, with the actual cause attached.
pub fn parse_node(xml: &str, node_id: u64) -> Result<OsmNode, PosError> {
    read_node(xml, node_id).map_err(|cause| {
        warn!("Failed to parse OSM XML for node {}: {}", node_id, cause);
        PosError::node_not_found(node_id, cause)
    })
}

fn read_node(xml: &str, node_id: u64) -> Result<OsmNode, NodeLookupError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut coords: Option<(f64, f64)> = None;
    // Depth of the primary <node> while it is open.
    let mut node_depth: Option<usize> = None;
    let mut tags = BTreeMap::new();
    let mut root_closed = false;

    loop {
        match reader.read_event()? {
            Event::Start(_) | Event::Empty(_) if root_closed => {
                return Err(NodeLookupError::OutsideRoot);
            }
            Event::Text(t) if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) => {
                return Err(NodeLookupError::OutsideRoot);
            }
            Event::CData(_) if depth == 0 => return Err(NodeLookupError::OutsideRoot),
            Event::Start(e) => {
                depth += 1;
                if visit(&e, node_depth.is_some(), &mut coords, &mut tags)? {
                    node_depth = Some(depth);
                }
            }
            Event::Empty(e) => {
                visit(&e, node_depth.is_some(), &mut coords, &mut tags)?;
                root_closed = depth == 0;
            }
            Event::End(_) => {
                if node_depth == Some(depth) {
                    node_depth = None;
                }
                depth = depth.saturating_sub(1);
                root_closed = depth == 0;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(NodeLookupError::Unbalanced);
    }
    let (latitude, longitude) = coords.ok_or(NodeLookupError::MissingNode)?;

    debug!("Extracted {} tags from OSM node {}", tags.len(), node_id);
    Ok(OsmNode {
        node_id,
        latitude,
        longitude,
        tags,
    })
}

/// Handle one element. Returns true when `e` is the primary node element.
fn visit(
    e: &BytesStart,
    inside_node: bool,
    coords: &mut Option<(f64, f64)>,
    tags: &mut BTreeMap<String, String>,
) -> Result<bool, NodeLookupError> {
    match e.name().as_ref() {
        b"node" if coords.is_none() => {
            let lat = coordinate(e, "lat")?;
            let lon = coordinate(e, "lon")?;
            *coords = Some((lat, lon));
            Ok(true)
        }
        b"tag" if inside_node => {
            let key = attribute(e, b"k")?.unwrap_or_default();
            let value = attribute(e, b"v")?.unwrap_or_default();
            if !key.is_empty() && !value.is_empty() {
                // Later duplicates overwrite earlier ones.
                tags.insert(key, value);
            }
            Ok(false)
        }
        _ => Ok(false),
    }
}

fn coordinate(e: &BytesStart, attr: &'static str) -> Result<f64, NodeLookupError> {
    let raw = attribute(e, attr.as_bytes())?
        .filter(|v| !v.is_empty())
        .ok_or(NodeLookupError::MissingCoordinate(attr))?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(NodeLookupError::InvalidCoordinate { attr, value: raw }),
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, NodeLookupError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
