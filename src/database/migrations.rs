// Schema migration system for database versioning

use super::IndexStore;
use crate::error::{Error, Result};
use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info};

/// Current schema version - increment when adding migrations.
pub const LATEST_SCHEMA_VERSION: i32 = 1;

impl IndexStore {
    /// Run all pending schema migrations. Foreign keys are off for the whole
    /// window; the caller verifies integrity before re-enabling them.
    pub(super) fn run_migrations(&mut self) -> Result<()> {
        self.create_schema_version_table()?;

        let current_version = self.get_schema_version()?;
        let target_version = LATEST_SCHEMA_VERSION;

        if current_version >= target_version {
            debug!(
                "Database schema is up-to-date at version {}",
                current_version
            );
            return Ok(());
        }

        info!(
            "Running schema migrations: version {} -> {}",
            current_version, target_version
        );

        for version in (current_version + 1)..=target_version {
            self.apply_migration(version)?;
            self.record_migration(version)?;
            info!("Migration to version {} completed", version);
        }

        Ok(())
    }

    fn create_schema_version_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL,
                description TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn get_schema_version(&self) -> Result<i32> {
        let table_exists: bool = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table' AND name='schema_version'",
            [],
            |row| {
                let count: i32 = row.get(0)?;
                Ok(count > 0)
            },
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: i32 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

        Ok(version)
    }

    fn apply_migration(&mut self, version: i32) -> Result<()> {
        match version {
            1 => self.migration_001_initial_schema()?,
            _ => {
                return Err(Error::StoreIntegrity(format!(
                    "unknown migration version: {version}"
                )));
            }
        }
        Ok(())
    }

    fn record_migration(&self, version: i32) -> Result<()> {
        let description = match version {
            1 => "Initial schema",
            _ => "Unknown migration",
        };

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at, description)
             VALUES (?1, ?2, ?3)",
            params![version, Utc::now().to_rfc3339(), description],
        )?;

        Ok(())
    }

    /// Migration 001: Initial schema (for tracking purposes)
    /// Note: This is a no-op as the schema is created by initialize_schema
    fn migration_001_initial_schema(&self) -> Result<()> {
        Ok(())
    }
}
