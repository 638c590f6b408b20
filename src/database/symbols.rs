// Symbol row operations and name search

use super::{IndexStore, SymbolQuery, SymbolRecord};
use crate::error::Result;
use crate::extractors::SymbolKind;
use rusqlite::{params, Row};
use tracing::debug;

/// Standard SELECT column list for symbol queries. Keep in sync with
/// `row_to_symbol`.
const SYMBOL_COLUMNS: &str = "id, project, file_path, name, kind, span_start, span_end, \
     is_exported, signature, fingerprint, detail_json, content_hash";

impl IndexStore {
    /// Replace all symbol rows of one file as a unit, keyed by the file's
    /// content hash. When the stored hash already matches, the replacement is
    /// elided and existing rows (and their ids) survive untouched.
    ///
    /// Returns true when rows were written.
    pub fn replace_file_symbols(
        &self,
        project: &str,
        file_path: &str,
        content_hash: &str,
        rows: &[SymbolRecord],
    ) -> Result<bool> {
        self.transaction(|s| {
            let stored: Option<String> = match s.conn.query_row(
                "SELECT content_hash FROM symbols WHERE project = ?1 AND file_path = ?2 LIMIT 1",
                params![project, file_path],
                |row| row.get(0),
            ) {
                Ok(hash) => Some(hash),
                Err(rusqlite::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(e.into()),
            };

            if stored.as_deref() == Some(content_hash) {
                debug!(
                    "Symbols for {}::{} already at hash {}, skipping",
                    project, file_path, content_hash
                );
                return Ok(false);
            }

            s.conn.execute(
                "DELETE FROM symbols WHERE project = ?1 AND file_path = ?2",
                params![project, file_path],
            )?;

            let mut stmt = s.conn.prepare(
                "INSERT INTO symbols
                 (project, file_path, name, kind, span_start, span_end,
                  is_exported, signature, fingerprint, detail_json, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for record in rows {
                stmt.execute(params![
                    record.project,
                    record.file_path,
                    record.name,
                    record.kind.as_str(),
                    record.span_start,
                    record.span_end,
                    record.is_exported,
                    record.signature,
                    record.fingerprint,
                    serde_json::to_string(&record.detail)?,
                    record.content_hash,
                ])?;
            }

            debug!(
                "Replaced {} symbol rows for {}::{}",
                rows.len(),
                project,
                file_path
            );
            Ok(true)
        })
    }

    pub fn get_file_symbols(&self, project: &str, file_path: &str) -> Result<Vec<SymbolRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols
             WHERE project = ?1 AND file_path = ?2
             ORDER BY span_start"
        ))?;

        let rows = stmt.query_map(params![project, file_path], row_to_symbol)?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Prefix search over symbol names through the FTS5 companion index.
    pub fn search_symbols(&self, query: &SymbolQuery) -> Result<Vec<SymbolRecord>> {
        if query.text.is_empty() {
            return Ok(Vec::new());
        }

        // Quoted prefix query; doubled quotes escape any embedded ones.
        let match_expr = format!("name:\"{}\"*", query.text.replace('"', "\"\""));

        let mut sql = format!(
            "SELECT {} FROM symbols_fts JOIN symbols s ON s.id = symbols_fts.rowid
             WHERE symbols_fts MATCH ?1",
            SYMBOL_COLUMNS
                .split(", ")
                .map(|c| format!("s.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];

        if let Some(kind) = query.kind {
            params_vec.push(Box::new(kind.as_str().to_string()));
            sql.push_str(&format!(" AND s.kind = ?{}", params_vec.len()));
        }
        if let Some(project) = &query.project {
            params_vec.push(Box::new(project.clone()));
            sql.push_str(&format!(" AND s.project = ?{}", params_vec.len()));
        }
        params_vec.push(Box::new(query.limit as i64));
        sql.push_str(&format!(" ORDER BY rank LIMIT ?{}", params_vec.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_ref[..], row_to_symbol)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    /// Exact-name lookup, optionally narrowed by kind and project.
    pub fn search_exact(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
        project: Option<&str>,
    ) -> Result<Vec<SymbolRecord>> {
        let mut sql = format!("SELECT {SYMBOL_COLUMNS} FROM symbols WHERE name = ?1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(name.to_string())];

        if let Some(kind) = kind {
            params_vec.push(Box::new(kind.as_str().to_string()));
            sql.push_str(&format!(" AND kind = ?{}", params_vec.len()));
        }
        if let Some(project) = project {
            params_vec.push(Box::new(project.to_string()));
            sql.push_str(&format!(" AND project = ?{}", params_vec.len()));
        }
        sql.push_str(" ORDER BY project, file_path, span_start");

        let mut stmt = self.conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_ref[..], row_to_symbol)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }
}

fn row_to_symbol(row: &Row) -> rusqlite::Result<SymbolRecord> {
    let kind_str: String = row.get("kind")?;
    let kind = SymbolKind::from_str(&kind_str).unwrap_or(SymbolKind::Variable);

    let detail_json: Option<String> = row.get("detail_json")?;
    let detail = detail_json
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or(serde_json::Value::Null);

    Ok(SymbolRecord {
        id: row.get("id")?,
        project: row.get("project")?,
        file_path: row.get("file_path")?,
        name: row.get("name")?,
        kind,
        span_start: row.get("span_start")?,
        span_end: row.get("span_end")?,
        is_exported: row.get("is_exported")?,
        signature: row.get("signature")?,
        fingerprint: row.get("fingerprint")?,
        detail,
        content_hash: row.get("content_hash")?,
    })
}
