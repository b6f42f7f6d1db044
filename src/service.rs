use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::db;
use crate::error::PosError;
use crate::model::{PersistedPos, Pos};
use crate::osm::NodeSource;
use crate::parser;

pub fn get_all(conn: &Connection) -> Result<Vec<PersistedPos>, PosError> {
    debug!("Retrieving all POS");
    db::fetch_all_pos(conn)
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<PersistedPos, PosError> {
    debug!("Retrieving POS with ID: {}", id);
    db::get_pos_by_id(conn, id)
}

pub fn clear(conn: &Connection) -> Result<usize, PosError> {
    warn!("Clearing all POS data");
    db::clear_pos(conn)
}

/// Create when `id` is `None`, otherwise overwrite the existing record.
/// Names are unique across all records in both cases.
pub fn upsert(conn: &Connection, id: Option<i64>, pos: &Pos) -> Result<PersistedPos, PosError> {
    let result = match id {
        None => {
            info!("Creating new POS: {}", pos.name());
            db::insert_pos(conn, pos)
        }
        Some(id) => {
            info!("Updating POS with ID: {}", id);
            update_existing(conn, id, pos)
        }
    };

    match &result {
        Ok(saved) => info!("Successfully upserted POS with ID: {}", saved.id),
        Err(e) => error!("Error upserting POS '{}': {}", pos.name(), e),
    }
    result
}

fn update_existing(conn: &Connection, id: i64, pos: &Pos) -> Result<PersistedPos, PosError> {
    let tx = conn.unchecked_transaction()?;
    db::get_pos_by_id(&tx, id)?;
    let saved = db::update_pos(&tx, id, pos)?;
    tx.commit()?;
    Ok(saved)
}

/// Fetch, parse, convert and create. Nothing is retried; the first failure is returned.
pub async fn import_from_node<S: NodeSource>(
    conn: &Connection,
    source: &S,
    node_id: u64,
) -> Result<PersistedPos, PosError> {
    info!("Importing POS from OpenStreetMap node {}...", node_id);

    let xml = source.fetch_node(node_id).await?;
    let pos = parser::process_node(&xml, node_id)?;
    let saved = upsert(conn, None, &pos)?;

    info!(
        "Successfully imported POS '{}' from OSM node {}",
        saved.pos.name(),
        node_id
    );
    Ok(saved)
}
