// File row operations

use super::{FileRecord, IndexStore};
use crate::error::Result;
use rusqlite::{params, Row};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const FILE_COLUMNS: &str =
    "project, file_path, mtime_ms, size, content_hash, updated_at, line_count";

impl IndexStore {
    /// Insert or update one file row. A plain upsert, never REPLACE: the
    /// implicit delete of REPLACE would cascade into symbol and relation rows.
    pub fn upsert_file(&self, record: &FileRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO files (project, file_path, mtime_ms, size, content_hash, updated_at, line_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(project, file_path) DO UPDATE SET
                 mtime_ms = excluded.mtime_ms,
                 size = excluded.size,
                 content_hash = excluded.content_hash,
                 updated_at = excluded.updated_at,
                 line_count = excluded.line_count",
            params![
                record.project,
                record.file_path,
                record.mtime_ms,
                record.size,
                record.content_hash,
                record.updated_at,
                record.line_count,
            ],
        )?;

        debug!("Upserted file row for {}::{}", record.project, record.file_path);
        Ok(())
    }

    pub fn get_file(&self, project: &str, file_path: &str) -> Result<Option<FileRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE project = ?1 AND file_path = ?2"
        ))?;

        match stmt.query_row(params![project, file_path], row_to_file) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_files(&self, project: &str) -> Result<Vec<FileRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE project = ?1 ORDER BY file_path"
        ))?;

        let rows = stmt.query_map(params![project], row_to_file)?;
        let mut files = Vec::new();
        for row in rows {
            files.push(row?);
        }
        Ok(files)
    }

    /// Current file rows of a project keyed by path.
    pub fn file_map(&self, project: &str) -> Result<HashMap<String, FileRecord>> {
        let mut map = HashMap::new();
        for record in self.list_files(project)? {
            map.insert(record.file_path.clone(), record);
        }
        Ok(map)
    }

    /// Delete one file row; cascading FKs purge its symbols and relations.
    pub fn delete_file(&self, project: &str, file_path: &str) -> Result<bool> {
        let count = self.conn.execute(
            "DELETE FROM files WHERE project = ?1 AND file_path = ?2",
            params![project, file_path],
        )?;

        debug!(
            "Deleted file row for {}::{} ({} rows affected)",
            project, file_path, count
        );
        Ok(count > 0)
    }

    /// All current file rows across projects, keyed `"<project>::<path>"`.
    /// The relation indexer checks resolver candidates against this set so
    /// dangling destinations never reach the store.
    pub fn known_files(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT project, file_path FROM files")?;
        let rows = stmt.query_map([], |row| {
            Ok(format!(
                "{}::{}",
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?
            ))
        })?;

        let mut keys = HashSet::new();
        for row in rows {
            keys.insert(row?);
        }
        Ok(keys)
    }

    /// Distinct project names present in the store.
    pub fn projects(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT project FROM files ORDER BY project")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }
}

fn row_to_file(row: &Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        project: row.get("project")?,
        file_path: row.get("file_path")?,
        mtime_ms: row.get("mtime_ms")?,
        size: row.get("size")?,
        content_hash: row.get("content_hash")?,
        updated_at: row.get("updated_at")?,
        line_count: row.get("line_count")?,
    })
}
