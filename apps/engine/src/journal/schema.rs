//! SQLite schema for the import journal.

pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- One row per import call
CREATE TABLE IF NOT EXISTS import_sessions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_count INTEGER NOT NULL DEFAULT 0,
    skipped_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    rolled_back_at TEXT
);

-- What happened to each segment of a session
CREATE TABLE IF NOT EXISTS import_items (
    session_id TEXT NOT NULL REFERENCES import_sessions(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    line INTEGER NOT NULL,
    fingerprint TEXT NOT NULL,
    action TEXT NOT NULL,
    note_id INTEGER,
    error TEXT,
    PRIMARY KEY (session_id, position)
);

CREATE INDEX IF NOT EXISTS idx_import_items_note ON import_items(note_id);
"#;
