// Relation row operations

use super::{IndexStore, RelationFilter, RelationRecord};
use crate::error::Result;
use crate::extractors::RelationKind;
use rusqlite::{params, Row};
use tracing::debug;

const RELATION_COLUMNS: &str = "id, project, type, src_file_path, src_symbol_name, \
     dst_project, dst_file_path, dst_symbol_name, meta_json";

impl IndexStore {
    /// Atomically replace all relation rows originating from one file:
    /// DELETE then INSERT inside a transaction (a no-op join when the caller
    /// already holds one).
    pub fn replace_file_relations(
        &self,
        project: &str,
        src_file_path: &str,
        rows: &[RelationRecord],
    ) -> Result<()> {
        self.transaction(|s| {
            s.conn.execute(
                "DELETE FROM relations WHERE project = ?1 AND src_file_path = ?2",
                params![project, src_file_path],
            )?;

            let mut stmt = s.conn.prepare(
                "INSERT INTO relations
                 (project, type, src_file_path, src_symbol_name,
                  dst_project, dst_file_path, dst_symbol_name, meta_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in rows {
                stmt.execute(params![
                    record.project,
                    record.kind.as_str(),
                    record.src_file_path,
                    record.src_symbol_name,
                    record.dst_project,
                    record.dst_file_path,
                    record.dst_symbol_name,
                    serde_json::to_string(&record.meta)?,
                ])?;
            }

            debug!(
                "Replaced {} relation rows for {}::{}",
                rows.len(),
                project,
                src_file_path
            );
            Ok(())
        })
    }

    /// Relations whose source is the given file.
    pub fn get_outgoing(&self, project: &str, src_file_path: &str) -> Result<Vec<RelationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RELATION_COLUMNS} FROM relations
             WHERE project = ?1 AND src_file_path = ?2"
        ))?;

        let rows = stmt.query_map(params![project, src_file_path], row_to_relation)?;
        collect_rows(rows)
    }

    /// Relations whose destination is the given file.
    pub fn get_incoming(
        &self,
        dst_project: &str,
        dst_file_path: &str,
    ) -> Result<Vec<RelationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RELATION_COLUMNS} FROM relations
             WHERE dst_project = ?1 AND dst_file_path = ?2"
        ))?;

        let rows = stmt.query_map(params![dst_project, dst_file_path], row_to_relation)?;
        collect_rows(rows)
    }

    pub fn get_by_type(&self, project: &str, kind: RelationKind) -> Result<Vec<RelationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RELATION_COLUMNS} FROM relations
             WHERE project = ?1 AND type = ?2"
        ))?;

        let rows = stmt.query_map(params![project, kind.as_str()], row_to_relation)?;
        collect_rows(rows)
    }

    /// Filtered relation search with dynamically assembled predicates.
    pub fn search_relations(&self, filter: &RelationFilter) -> Result<Vec<RelationRecord>> {
        let mut sql = format!("SELECT {RELATION_COLUMNS} FROM relations WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        let mut push = |sql: &mut String, clause: &str, value: Box<dyn rusqlite::ToSql>| {
            params_vec.push(value);
            sql.push_str(&format!(" AND {} = ?{}", clause, params_vec.len()));
        };

        if let Some(project) = &filter.project {
            push(&mut sql, "project", Box::new(project.clone()));
        }
        if let Some(kind) = filter.kind {
            push(&mut sql, "type", Box::new(kind.as_str().to_string()));
        }
        if let Some(src) = &filter.src_file_path {
            push(&mut sql, "src_file_path", Box::new(src.clone()));
        }
        if let Some(dst) = &filter.dst_file_path {
            push(&mut sql, "dst_file_path", Box::new(dst.clone()));
        }
        if let Some(src_symbol) = &filter.src_symbol_name {
            push(&mut sql, "src_symbol_name", Box::new(src_symbol.clone()));
        }
        if let Some(dst_symbol) = &filter.dst_symbol_name {
            push(&mut sql, "dst_symbol_name", Box::new(dst_symbol.clone()));
        }
        if let Some(limit) = filter.limit {
            params_vec.push(Box::new(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", params_vec.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_ref[..], row_to_relation)?;
        collect_rows(rows)
    }

    /// Point relations at a new destination, e.g. after a symbol rename.
    /// With `old_symbol` unset, every relation into the old file moves.
    pub fn retarget_relations(
        &self,
        dst_project: &str,
        old_file: &str,
        old_symbol: Option<&str>,
        new_file: &str,
        new_symbol: Option<&str>,
        new_dst_project: Option<&str>,
    ) -> Result<usize> {
        let new_project = new_dst_project.unwrap_or(dst_project);
        let count = match old_symbol {
            Some(old_symbol) => self.conn.execute(
                "UPDATE relations
                 SET dst_project = ?1, dst_file_path = ?2, dst_symbol_name = ?3
                 WHERE dst_project = ?4 AND dst_file_path = ?5 AND dst_symbol_name = ?6",
                params![
                    new_project,
                    new_file,
                    new_symbol,
                    dst_project,
                    old_file,
                    old_symbol
                ],
            )?,
            None => self.conn.execute(
                "UPDATE relations
                 SET dst_project = ?1, dst_file_path = ?2
                 WHERE dst_project = ?3 AND dst_file_path = ?4",
                params![new_project, new_file, dst_project, old_file],
            )?,
        };

        debug!(
            "Retargeted {} relations from {}::{} to {}::{}",
            count, dst_project, old_file, new_project, new_file
        );
        Ok(count)
    }

    /// Dependency edges for graph construction: imports, type references,
    /// and re-exports, optionally narrowed to a set of projects. Rows are
    /// `(project, src_file, dst_project, dst_file)`.
    pub fn load_graph_edges(
        &self,
        projects: Option<&[String]>,
    ) -> Result<Vec<(String, String, String, String)>> {
        let mut sql = String::from(
            "SELECT project, src_file_path, dst_project, dst_file_path FROM relations
             WHERE type IN ('imports', 'type-references', 're-exports')",
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(projects) = projects {
            if projects.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> = (1..=projects.len()).map(|i| format!("?{i}")).collect();
            sql.push_str(&format!(" AND project IN ({})", placeholders.join(", ")));
            for project in projects {
                params_vec.push(Box::new(project.clone()));
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(&params_ref[..], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<RelationRecord>>,
) -> Result<Vec<RelationRecord>> {
    let mut relations = Vec::new();
    for row in rows {
        relations.push(row?);
    }
    Ok(relations)
}

fn row_to_relation(row: &Row) -> rusqlite::Result<RelationRecord> {
    let kind_str: String = row.get("type")?;
    let kind = RelationKind::from_str(&kind_str).unwrap_or(RelationKind::Imports);

    let meta_json: Option<String> = row.get("meta_json")?;
    let meta = meta_json
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or(serde_json::Value::Null);

    Ok(RelationRecord {
        id: row.get("id")?,
        project: row.get("project")?,
        kind,
        src_file_path: row.get("src_file_path")?,
        src_symbol_name: row.get("src_symbol_name")?,
        dst_project: row.get("dst_project")?,
        dst_file_path: row.get("dst_file_path")?,
        dst_symbol_name: row.get("dst_symbol_name")?,
        meta,
    })
}
