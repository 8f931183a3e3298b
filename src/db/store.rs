//! SQLite tower registry.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;
use crate::registry::{RegistryError, RegistryTarget, TargetRegistry};

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("database connection poisoned")]
    Poisoned,
}

const TOWER_COLUMNS: &str = "id, name, location, host_address, latitude, longitude, notes";

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;

        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        Ok(())
    }

    // --- Tower CRUD ---

    /// Add a new tower and return its ID.
    pub fn add_tower(&self, tower: &mut Tower) -> Result<i64, DbError> {
        tower.normalize();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO towers (name, location, host_address, latitude, longitude, notes) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tower.name,
                tower.location,
                tower.host_address,
                tower.latitude,
                tower.longitude,
                tower.notes,
            ],
        )?;
        let id = conn.last_insert_rowid();
        tower.id = id;
        Ok(id)
    }

    /// Update an existing tower.
    pub fn update_tower(&self, tower: &mut Tower) -> Result<(), DbError> {
        tower.normalize();

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE towers SET name=?1, location=?2, host_address=?3, latitude=?4, longitude=?5, notes=?6 WHERE id=?7",
            params![
                tower.name,
                tower.location,
                tower.host_address,
                tower.latitude,
                tower.longitude,
                tower.notes,
                tower.id,
            ],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Get all towers, ordered by ID.
    pub fn get_towers(&self) -> Result<Vec<Tower>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM towers ORDER BY id", TOWER_COLUMNS))?;

        let towers = stmt
            .query_map([], tower_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(towers)
    }

    /// Get a tower by ID.
    pub fn get_tower(&self, id: i64) -> Result<Tower, DbError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM towers WHERE id = ?1", TOWER_COLUMNS),
            params![id],
            tower_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Delete a tower.
    pub fn delete_tower(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM towers WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn tower_from_row(row: &Row<'_>) -> SqlResult<Tower> {
    Ok(Tower {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        host_address: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        notes: row.get(6)?,
    })
}

#[async_trait]
impl TargetRegistry for Store {
    async fn list_targets(&self) -> Result<Vec<RegistryTarget>, RegistryError> {
        let towers = self.get_towers()?;
        Ok(towers.iter().map(RegistryTarget::from).collect())
    }

    async fn get_target(&self, id: i64) -> Result<Option<RegistryTarget>, RegistryError> {
        match self.get_tower(id) {
            Ok(tower) => Ok(Some(RegistryTarget::from(&tower))),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
