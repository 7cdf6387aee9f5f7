//! SQLite-backed session store.

use super::error::JournalError;
use super::{ImportSession, RollbackFailure, RollbackResult, SessionAction, SessionItem};
use crate::collection::{Collection, CollectionError, NoteId};
use crate::config::JournalConfig;
use crate::import::{ImportOutcome, ImportResult};
use chrono::{DateTime, SecondsFormat, Utc};
use quiz_core::DuplicateKey;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use uuid::Uuid;

type Result<T> = std::result::Result<T, JournalError>;

const SESSION_COLUMNS: &str = "id, source, created_at, created_count, skipped_count, failed_count, rolled_back_at";

/// Session columns as stored, before timestamps are parsed.
struct SessionRow {
    id: String,
    source: String,
    created_at: String,
    created: i64,
    skipped: i64,
    failed: i64,
    rolled_back_at: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source: row.get(1)?,
            created_at: row.get(2)?,
            created: row.get(3)?,
            skipped: row.get(4)?,
            failed: row.get(5)?,
            rolled_back_at: row.get(6)?,
        })
    }
}

/// Journal of import sessions.
pub struct SessionStore {
    conn: Connection,
    keep_limit: usize,
}

impl SessionStore {
    /// Open the journal at path, creating it if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn,
            keep_limit: 0,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open an in-memory journal (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn,
            keep_limit: 0,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open the journal named by `config`, pruning to its keep limit on
    /// every recorded session.
    pub fn from_config(config: &JournalConfig) -> Result<Self> {
        let path = match &config.path {
            Some(path) => path.clone(),
            None => Self::default_path().ok_or(JournalError::NoDataDir)?,
        };
        Ok(Self::open(path)?.with_keep_limit(config.keep_limit))
    }

    /// `<data dir>/quizdeck/journal.db` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("quizdeck").join("journal.db"))
    }

    /// Sessions kept after each [`record`](Self::record); `0` keeps all.
    pub fn with_keep_limit(mut self, keep_limit: usize) -> Self {
        self.keep_limit = keep_limit;
        self
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(super::schema::SCHEMA)?;
        Ok(())
    }

    /// Store the outcome of one import call.
    pub fn record(&self, source: &str, result: &ImportResult) -> Result<ImportSession> {
        let session = ImportSession {
            id: Uuid::new_v4().to_string(),
            source: source.to_string(),
            created_at: Utc::now(),
            created: result.created,
            skipped: result.skipped.len(),
            failed: result.errors.len(),
            rolled_back_at: None,
            items: items_from_result(result),
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO import_sessions (id, source, created_at, created_count, skipped_count, failed_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.source,
                format_timestamp(session.created_at),
                session.created as i64,
                session.skipped as i64,
                session.failed as i64,
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO import_items (session_id, position, line, fingerprint, action, note_id, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, item) in session.items.iter().enumerate() {
                stmt.execute(params![
                    session.id,
                    position as i64,
                    item.line as i64,
                    item.fingerprint.as_str(),
                    item.action.as_str(),
                    item.note_id.map(|id| id.0),
                    item.error,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(
            session_id = %session.id,
            source = %session.source,
            created = session.created,
            "Import session recorded"
        );

        if self.keep_limit > 0 {
            self.prune(self.keep_limit)?;
        }

        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Result<Option<ImportSession>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM import_sessions WHERE id = ?1"),
                params![session_id],
                SessionRow::from_row,
            )
            .optional()?;

        row.map(|row| self.load(row)).transpose()
    }

    /// The most recently recorded session.
    pub fn latest(&self) -> Result<Option<ImportSession>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM import_sessions ORDER BY seq DESC LIMIT 1"),
                [],
                SessionRow::from_row,
            )
            .optional()?;

        row.map(|row| self.load(row)).transpose()
    }

    /// All sessions, newest first.
    pub fn list(&self) -> Result<Vec<ImportSession>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SESSION_COLUMNS} FROM import_sessions ORDER BY seq DESC"))?;
        let rows = stmt
            .query_map([], SessionRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(|row| self.load(row)).collect()
    }

    /// Forget a session. Its notes are left alone.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM import_items WHERE session_id = ?1", params![session_id])?;
        let removed = tx.execute("DELETE FROM import_sessions WHERE id = ?1", params![session_id])?;
        if removed == 0 {
            return Err(JournalError::SessionNotFound(session_id.to_string()));
        }
        tx.commit()?;
        Ok(())
    }

    /// Keep the newest `keep_limit` sessions; `0` keeps everything.
    /// Returns the number of sessions removed.
    pub fn prune(&self, keep_limit: usize) -> Result<usize> {
        if keep_limit == 0 {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let stale = "SELECT id FROM import_sessions ORDER BY seq DESC LIMIT -1 OFFSET ?1";
        tx.execute(
            &format!("DELETE FROM import_items WHERE session_id IN ({stale})"),
            params![keep_limit as i64],
        )?;
        let removed = tx.execute(
            &format!("DELETE FROM import_sessions WHERE id IN ({stale})"),
            params![keep_limit as i64],
        )?;
        tx.commit()?;

        if removed > 0 {
            tracing::debug!(removed, keep_limit, "Pruned import sessions");
        }
        Ok(removed)
    }

    /// Delete the notes a session created.
    ///
    /// Notes already gone from the collection are reported as missing.
    /// Other failures are collected and the remaining notes are still
    /// attempted. The session is only marked rolled back once every note is
    /// gone, so a partial rollback can be run again; after that a second
    /// rollback deletes nothing.
    pub fn rollback<C>(&self, session_id: &str, collection: &mut C) -> Result<RollbackResult>
    where
        C: Collection + ?Sized,
    {
        let session = self
            .get(session_id)?
            .ok_or_else(|| JournalError::SessionNotFound(session_id.to_string()))?;

        if session.rolled_back_at.is_some() {
            tracing::info!(session_id, "Session already rolled back");
            return Ok(RollbackResult {
                already_rolled_back: true,
                ..RollbackResult::default()
            });
        }

        let mut result = RollbackResult::default();
        for note_id in session.created_note_ids() {
            match collection.delete_note(note_id) {
                Ok(()) => result.deleted.push(note_id),
                Err(CollectionError::NotFound { .. }) => result.missing.push(note_id),
                Err(error) => {
                    tracing::warn!(session_id, note_id = %note_id, error = %error, "Rollback delete failed");
                    result.errors.push(RollbackFailure { note_id, error });
                }
            }
        }

        if !result.errors.is_empty() {
            tracing::warn!(
                session_id,
                deleted = result.deleted.len(),
                errors = result.errors.len(),
                "Rollback incomplete, session left open"
            );
            return Ok(result);
        }

        self.conn.execute(
            "UPDATE import_sessions SET rolled_back_at = ?1 WHERE id = ?2",
            params![format_timestamp(Utc::now()), session_id],
        )?;

        tracing::info!(
            session_id,
            deleted = result.deleted.len(),
            missing = result.missing.len(),
            errors = result.errors.len(),
            "Session rolled back"
        );

        Ok(result)
    }

    fn load(&self, row: SessionRow) -> Result<ImportSession> {
        let items = self.load_items(&row.id)?;
        Ok(ImportSession {
            created_at: parse_timestamp(&row.created_at)?,
            rolled_back_at: row.rolled_back_at.as_deref().map(parse_timestamp).transpose()?,
            id: row.id,
            source: row.source,
            created: to_count(row.created)?,
            skipped: to_count(row.skipped)?,
            failed: to_count(row.failed)?,
            items,
        })
    }

    fn load_items(&self, session_id: &str) -> Result<Vec<SessionItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT line, fingerprint, action, note_id, error
             FROM import_items WHERE session_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(line, fingerprint, action, note_id, error)| {
                Ok(SessionItem {
                    line: to_count(line)?,
                    fingerprint: DuplicateKey::from_hex(fingerprint),
                    action: SessionAction::parse(&action)
                        .ok_or_else(|| JournalError::InvalidData(format!("unknown action {action}")))?,
                    note_id: note_id.map(NoteId),
                    error,
                })
            })
            .collect()
    }
}

fn items_from_result(result: &ImportResult) -> Vec<SessionItem> {
    let mut errors = result.errors.iter();
    result
        .items
        .iter()
        .map(|item| {
            let (action, note_id, error) = match &item.outcome {
                ImportOutcome::Created { note_id } => (SessionAction::Created, Some(*note_id), None),
                ImportOutcome::Skipped { .. } => (SessionAction::Skipped, None, None),
                ImportOutcome::Failed => (
                    SessionAction::Failed,
                    None,
                    errors.next().map(|e| e.error.to_string()),
                ),
            };
            SessionItem {
                line: item.line,
                fingerprint: item.fingerprint.clone(),
                action,
                note_id,
                error,
            }
        })
        .collect()
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| JournalError::InvalidData(format!("bad timestamp {raw}: {e}")))
}

fn to_count(value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| JournalError::InvalidData(format!("negative count {value}")))
}
