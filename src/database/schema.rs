// Database schema initialization and table creation

use super::IndexStore;
use crate::error::Result;
use tracing::debug;

impl IndexStore {
    /// Initialize the complete database schema.
    pub(super) fn initialize_schema(&mut self) -> Result<()> {
        debug!("Creating database schema");

        // Create tables in dependency order
        self.create_meta_table()?;
        self.create_files_table()?;
        self.create_symbols_table()?;
        self.create_relations_table()?;
        self.create_watcher_owner_table()?;

        debug!("Database schema created successfully");
        Ok(())
    }

    fn create_meta_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Create the files table for tracking source files.
    fn create_files_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS files (
                project TEXT NOT NULL,
                file_path TEXT NOT NULL,
                mtime_ms INTEGER NOT NULL,
                size INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                line_count INTEGER,

                PRIMARY KEY (project, file_path)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_files_project ON files(project)",
            [],
        )?;

        debug!("Created files table and indexes");
        Ok(())
    }

    /// Create the symbols table with its FTS5 companion index.
    fn create_symbols_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                span_start INTEGER NOT NULL,
                span_end INTEGER NOT NULL,
                is_exported INTEGER NOT NULL DEFAULT 0,
                signature TEXT,
                fingerprint TEXT NOT NULL,
                detail_json TEXT,

                -- Replacement key: hash of the file state these rows mirror
                content_hash TEXT NOT NULL,

                FOREIGN KEY (project, file_path)
                    REFERENCES files(project, file_path) ON DELETE CASCADE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(project, file_path)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind)",
            [],
        )?;

        debug!("Created symbols table and indexes");

        self.create_symbols_fts_table()?;
        self.create_symbols_fts_triggers()?;

        Ok(())
    }

    /// FTS5 virtual table over symbol names for prefix search.
    fn create_symbols_fts_table(&self) -> Result<()> {
        self.conn.execute(
            r#"CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
                name,
                file_path,
                kind,
                tokenize = "unicode61 separators '_.'",
                prefix='2 3 4 5',
                content='symbols',
                content_rowid='id'
            )"#,
            [],
        )?;
        debug!("Created symbols_fts virtual table");
        Ok(())
    }

    /// Triggers keeping symbols_fts in sync with the symbols table.
    fn create_symbols_fts_triggers(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TRIGGER IF NOT EXISTS symbols_ai AFTER INSERT ON symbols BEGIN
                INSERT INTO symbols_fts(rowid, name, file_path, kind)
                VALUES (new.id, new.name, new.file_path, new.kind);
            END",
            [],
        )?;

        self.conn.execute(
            "CREATE TRIGGER IF NOT EXISTS symbols_ad AFTER DELETE ON symbols BEGIN
                INSERT INTO symbols_fts(symbols_fts, rowid, name, file_path, kind)
                VALUES('delete', old.id, old.name, old.file_path, old.kind);
            END",
            [],
        )?;

        self.conn.execute(
            "CREATE TRIGGER IF NOT EXISTS symbols_au AFTER UPDATE ON symbols BEGIN
                INSERT INTO symbols_fts(symbols_fts, rowid, name, file_path, kind)
                VALUES('delete', old.id, old.name, old.file_path, old.kind);
                INSERT INTO symbols_fts(rowid, name, file_path, kind)
                VALUES (new.id, new.name, new.file_path, new.kind);
            END",
            [],
        )?;

        debug!("Created symbols_fts synchronization triggers");
        Ok(())
    }

    /// Create the relations table with both composite FKs back to files.
    fn create_relations_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS relations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project TEXT NOT NULL,
                type TEXT NOT NULL,
                src_file_path TEXT NOT NULL,
                src_symbol_name TEXT,
                dst_project TEXT NOT NULL,
                dst_file_path TEXT NOT NULL,
                dst_symbol_name TEXT,
                meta_json TEXT,

                FOREIGN KEY (project, src_file_path)
                    REFERENCES files(project, file_path) ON DELETE CASCADE,
                FOREIGN KEY (dst_project, dst_file_path)
                    REFERENCES files(project, file_path) ON DELETE CASCADE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_relations_src ON relations(project, src_file_path)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_relations_dst ON relations(dst_project, dst_file_path)",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_relations_type ON relations(project, type)",
            [],
        )?;

        debug!("Created relations table and indexes");
        Ok(())
    }

    /// Singleton coordination row; the CHECK pins it to one row at most.
    fn create_watcher_owner_table(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS watcher_owner (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                pid INTEGER NOT NULL,
                heartbeat_at TEXT NOT NULL,
                instance_id TEXT
            )",
            [],
        )?;

        debug!("Created watcher_owner table");
        Ok(())
    }
}
