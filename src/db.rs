use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::PosError;
use crate::model::{Category, PersistedPos, Pos, Region};

pub const DB_PATH: &str = "data/pos.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn connect_in_memory() -> Result<Connection, PosError> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), PosError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pos (
            id           INTEGER PRIMARY KEY,
            name         TEXT NOT NULL UNIQUE,
            description  TEXT NOT NULL,
            category     TEXT NOT NULL
                         CHECK(category IN ('CAFE','BAKERY','CAFETERIA','VENDING_MACHINE')),
            region       TEXT NOT NULL CHECK(region IN ('ALTSTADT','BERGHEIM','INF')),
            street       TEXT NOT NULL,
            house_number TEXT NOT NULL,
            postal_code  INTEGER,
            city         TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

const SELECT_POS: &str = "SELECT id, name, description, category, region, street, house_number,
                                 postal_code, city, created_at, updated_at
                          FROM pos";

struct PosRow {
    id: i64,
    name: String,
    description: String,
    category: Category,
    region: Region,
    street: String,
    house_number: String,
    postal_code: Option<u32>,
    city: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PosRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(PosRow {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: parse_column(row, 3)?,
            region: parse_column(row, 4)?,
            street: row.get(5)?,
            house_number: row.get(6)?,
            postal_code: row.get(7)?,
            city: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_persisted(self) -> Result<PersistedPos, PosError> {
        let pos = Pos::builder()
            .name(self.name)
            .description(self.description)
            .category(self.category)
            .region(self.region)
            .street(self.street)
            .house_number(self.house_number)
            .postal_code(self.postal_code)
            .city(self.city)
            .build()?;
        Ok(PersistedPos {
            id: self.id,
            pos,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Name collisions surface as `DuplicateName`; everything else is a storage error.
fn map_write_error(err: rusqlite::Error, name: &str) -> PosError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            PosError::DuplicateName {
                name: name.to_string(),
            }
        }
        _ => PosError::Storage(err),
    }
}

pub fn get_pos_by_id(conn: &Connection, id: i64) -> Result<PersistedPos, PosError> {
    let row = conn
        .query_row(&format!("{SELECT_POS} WHERE id = ?1"), [id], PosRow::read)
        .optional()?;
    match row {
        Some(row) => row.into_persisted(),
        None => Err(PosError::PosNotFound { id }),
    }
}

pub fn fetch_all_pos(conn: &Connection) -> Result<Vec<PersistedPos>, PosError> {
    let mut stmt = conn.prepare(&format!("{SELECT_POS} ORDER BY id"))?;
    let rows = stmt
        .query_map([], PosRow::read)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PosRow::into_persisted).collect()
}

pub fn insert_pos(conn: &Connection, pos: &Pos) -> Result<PersistedPos, PosError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO pos
         (name, description, category, region, street, house_number, postal_code, city,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            pos.name(),
            pos.description(),
            pos.category().as_str(),
            pos.region().as_str(),
            pos.street(),
            pos.house_number(),
            pos.postal_code(),
            pos.city(),
            now,
        ],
    )
    .map_err(|e| map_write_error(e, pos.name()))?;

    Ok(PersistedPos {
        id: conn.last_insert_rowid(),
        pos: pos.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Overwrites every field of an existing row; `created_at` is left alone.
pub fn update_pos(conn: &Connection, id: i64, pos: &Pos) -> Result<PersistedPos, PosError> {
    let changed = conn
        .execute(
            "UPDATE pos
             SET name = ?2, description = ?3, category = ?4, region = ?5, street = ?6,
                 house_number = ?7, postal_code = ?8, city = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                id,
                pos.name(),
                pos.description(),
                pos.category().as_str(),
                pos.region().as_str(),
                pos.street(),
                pos.house_number(),
                pos.postal_code(),
                pos.city(),
                Utc::now(),
            ],
        )
        .map_err(|e| map_write_error(e, pos.name()))?;
    if changed == 0 {
        return Err(PosError::PosNotFound { id });
    }
    get_pos_by_id(conn, id)
}

pub fn clear_pos(conn: &Connection) -> Result<usize, PosError> {
    Ok(conn.execute("DELETE FROM pos", [])?)
}
