use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{RecordStore, RegistryEntry};
use crate::error::StoreError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS vehicles (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      created_at INTEGER NOT NULL,
      owner_name TEXT NOT NULL,
      phone TEXT NOT NULL DEFAULT '',
      license_plate TEXT NOT NULL UNIQUE,
      vehicle_info TEXT NOT NULL DEFAULT ''
    );
"#;

/// Registry kept in a SQLite file. Snapshots come back ordered by insertion.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub fn open(db_path: &str) -> Result<Self, StoreError> {
        let conn = if db_path.starts_with("file:") {
            Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )?
        } else {
            Connection::open(db_path)?
        };
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Adds a vehicle. The plate is stored uppercased and must not already
    /// be registered.
    pub fn register(&self, entry: &RegistryEntry) -> Result<RegistryEntry, StoreError> {
        let owner_name = entry.owner_name.trim();
        let plate = entry.plate.trim().to_uppercase();
        if owner_name.is_empty() {
            return Err(StoreError::InvalidEntry("owner name is required".to_string()));
        }
        if plate.is_empty() {
            return Err(StoreError::InvalidEntry("license plate is required".to_string()));
        }

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM vehicles WHERE license_plate = ?1",
                params![plate],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StoreError::DuplicatePlate(plate));
        }

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.conn.execute(
            "INSERT INTO vehicles (created_at, owner_name, phone, license_plate, vehicle_info)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![created_at, owner_name, entry.phone, plate, entry.vehicle_info],
        )?;
        tracing::info!(plate = %plate, owner = %owner_name, "registered vehicle");

        Ok(RegistryEntry {
            plate,
            owner_name: owner_name.to_string(),
            phone: entry.phone.clone(),
            vehicle_info: entry.vehicle_info.clone(),
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn snapshot(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT license_plate, owner_name, phone, vehicle_info FROM vehicles ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RegistryEntry {
                plate: row.get(0)?,
                owner_name: row.get(1)?,
                phone: row.get(2)?,
                vehicle_info: row.get(3)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
