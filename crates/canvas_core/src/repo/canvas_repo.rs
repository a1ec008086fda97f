//! Canvas repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist sealed canvas payloads per owner.
//! - Serve the canonical section list in display order.
//! - Back the store's persistence, loader and section-source seams.
//!
//! # Invariants
//! - A canvas row is only readable and writable by its `owner_id`.
//! - Blank owners are treated as unauthenticated.
//! - Timestamps are stored as epoch milliseconds.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::section::CanonicalSection;
use crate::sync::{
    CanonicalSectionSource, CanvasLoader, CanvasPersistence, LoadedRecord, PersistenceError,
    PersistenceResult, SaveRequest, SavedRecord, SealedPayload,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Result type used by canvas repository operations.
pub type CanvasRepoResult<T> = Result<T, CanvasRepoError>;

/// Errors from canvas repository operations.
#[derive(Debug)]
pub enum CanvasRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Owner is blank or does not own the addressed canvas.
    Unauthorized,
    /// Addressed canvas does not exist.
    NotFound(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for CanvasRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unauthorized => write!(f, "canvas access is not authorized"),
            Self::NotFound(id) => write!(f, "canvas not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "canvas repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "canvas repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "canvas repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid canvas data: {message}"),
        }
    }
}

impl Error for CanvasRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for CanvasRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CanvasRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CanvasRepoError> for PersistenceError {
    fn from(value: CanvasRepoError) -> Self {
        match value {
            CanvasRepoError::Unauthorized => Self::Unauthorized,
            CanvasRepoError::NotFound(_) => Self::NotFound,
            CanvasRepoError::InvalidData(message) => Self::InvalidPayload(message),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Stored canvas read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub payload: SealedPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed canvas repository scoped to one owner.
pub struct SqliteCanvasRepository<'conn> {
    conn: &'conn Connection,
    owner_id: String,
}

impl<'conn> SqliteCanvasRepository<'conn> {
    /// Creates repository from migrated connection for `owner_id`.
    ///
    /// A blank owner is accepted here; canvas reads and writes then fail
    /// with `Unauthorized` while the section list stays readable.
    pub fn try_new(conn: &'conn Connection, owner_id: impl Into<String>) -> CanvasRepoResult<Self> {
        ensure_canvas_connection_ready(conn)?;
        Ok(Self {
            conn,
            owner_id: owner_id.into(),
        })
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Inserts or replaces one canvas payload.
    ///
    /// # Contract
    /// - `canvas_id = None` creates a new row with a fresh v4 id.
    /// - An id owned by someone else is `Unauthorized`, never overwritten.
    /// - An unknown explicit id is created under that id.
    pub fn upsert_canvas(
        &self,
        canvas_id: Option<&str>,
        title: &str,
        payload: &SealedPayload,
    ) -> CanvasRepoResult<CanvasRow> {
        let owner = self.require_owner()?;
        let now_ms = Utc::now().timestamp_millis();

        let existing_owner = match canvas_id {
            Some(id) => self
                .conn
                .query_row(
                    "SELECT owner_id FROM canvases WHERE id = ?1;",
                    [id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?,
            None => None,
        };

        let id = match (canvas_id, existing_owner) {
            (Some(id), Some(stored_owner)) => {
                if stored_owner != owner {
                    warn!(
                        "event=canvas_save module=repo status=rejected canvas_id={id} error_code=owner_mismatch"
                    );
                    return Err(CanvasRepoError::Unauthorized);
                }
                self.conn.execute(
                    "UPDATE canvases
                     SET title = ?2,
                         data = ?3,
                         iv = ?4,
                         salt = ?5,
                         updated_at = ?6
                     WHERE id = ?1;",
                    params![id, title, payload.data, payload.iv, payload.salt, now_ms],
                )?;
                id.to_string()
            }
            (explicit, _) => {
                let id = explicit
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                self.conn.execute(
                    "INSERT INTO canvases (
                        id,
                        owner_id,
                        title,
                        data,
                        iv,
                        salt,
                        created_at,
                        updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7);",
                    params![id, owner, title, payload.data, payload.iv, payload.salt, now_ms],
                )?;
                id
            }
        };

        debug!("event=canvas_save module=repo status=ok canvas_id={id}");
        self.get_canvas(&id)?
            .ok_or_else(|| CanvasRepoError::NotFound(id.clone()))
    }

    /// Loads one canvas by id; another owner's canvas is `Unauthorized`.
    pub fn get_canvas(&self, canvas_id: &str) -> CanvasRepoResult<Option<CanvasRow>> {
        let owner = self.require_owner()?;
        let row = self
            .conn
            .query_row(
                "SELECT id, owner_id, title, data, iv, salt, created_at, updated_at
                 FROM canvases
                 WHERE id = ?1;",
                [canvas_id],
                parse_canvas_row,
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some(row) => {
                let row = row?;
                if row.owner_id != owner {
                    return Err(CanvasRepoError::Unauthorized);
                }
                Ok(Some(row))
            }
        }
    }

    /// Loads the owner's most recently updated canvas.
    pub fn latest_canvas(&self) -> CanvasRepoResult<Option<CanvasRow>> {
        let owner = self.require_owner()?;
        let row = self
            .conn
            .query_row(
                "SELECT id, owner_id, title, data, iv, salt, created_at, updated_at
                 FROM canvases
                 WHERE owner_id = ?1
                 ORDER BY updated_at DESC, rowid DESC
                 LIMIT 1;",
                [owner],
                parse_canvas_row,
            )
            .optional()?;
        row.transpose()
    }

    /// Lists the owner's canvases, newest first.
    pub fn list_canvases(&self) -> CanvasRepoResult<Vec<CanvasRow>> {
        let owner = self.require_owner()?;
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, title, data, iv, salt, created_at, updated_at
             FROM canvases
             WHERE owner_id = ?1
             ORDER BY updated_at DESC, rowid DESC;",
        )?;
        let mut rows = stmt.query([owner])?;
        let mut canvases = Vec::new();
        while let Some(row) = rows.next()? {
            canvases.push(parse_canvas_row(row)??);
        }
        Ok(canvases)
    }

    /// Lists canonical sections ordered by `order_index`.
    pub fn list_sections(&self) -> CanvasRepoResult<Vec<CanonicalSection>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title
             FROM sections
             ORDER BY order_index ASC, id ASC;",
        )?;
        let sections = stmt
            .query_map([], |row| {
                Ok(CanonicalSection {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sections)
    }

    fn require_owner(&self) -> CanvasRepoResult<&str> {
        if self.owner_id.trim().is_empty() {
            return Err(CanvasRepoError::Unauthorized);
        }
        Ok(self.owner_id.as_str())
    }
}

impl CanvasPersistence for SqliteCanvasRepository<'_> {
    fn save(&self, request: &SaveRequest) -> PersistenceResult<SavedRecord> {
        let row = self.upsert_canvas(
            request.document_id.as_deref(),
            request.title.as_str(),
            &request.payload,
        )?;
        Ok(SavedRecord {
            id: row.id,
            updated_at: row.updated_at,
        })
    }
}

impl CanvasLoader for SqliteCanvasRepository<'_> {
    fn load(&self, document_id: Option<&str>) -> PersistenceResult<Option<LoadedRecord>> {
        let row = match document_id {
            Some(id) => Some(
                self.get_canvas(id)?
                    .ok_or_else(|| CanvasRepoError::NotFound(id.to_string()))?,
            ),
            None => self.latest_canvas()?,
        };
        Ok(row.map(|row| LoadedRecord {
            id: row.id,
            payload: row.payload,
            updated_at: row.updated_at,
        }))
    }
}

impl CanonicalSectionSource for SqliteCanvasRepository<'_> {
    fn canonical_sections(&self) -> PersistenceResult<Vec<CanonicalSection>> {
        Ok(self.list_sections()?)
    }
}

fn parse_canvas_row(row: &Row<'_>) -> rusqlite::Result<CanvasRepoResult<CanvasRow>> {
    let created_at: i64 = row.get(6)?;
    let updated_at: i64 = row.get(7)?;
    let id: String = row.get(0)?;

    let created_at = match millis_to_datetime(created_at) {
        Ok(value) => value,
        Err(err) => return Ok(Err(err)),
    };
    let updated_at = match millis_to_datetime(updated_at) {
        Ok(value) => value,
        Err(err) => return Ok(Err(err)),
    };

    Ok(Ok(CanvasRow {
        id,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        payload: SealedPayload {
            data: row.get(3)?,
            iv: row.get(4)?,
            salt: row.get(5)?,
        },
        created_at,
        updated_at,
    }))
}

fn millis_to_datetime(value: i64) -> CanvasRepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value)
        .ok_or_else(|| CanvasRepoError::InvalidData(format!("timestamp out of range: {value}")))
}

fn ensure_canvas_connection_ready(conn: &Connection) -> CanvasRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(CanvasRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in [
        ("sections", &["id", "title", "order_index"][..]),
        (
            "canvases",
            &[
                "id",
                "owner_id",
                "title",
                "data",
                "iv",
                "salt",
                "created_at",
                "updated_at",
            ][..],
        ),
    ] {
        if !table_exists(conn, table)? {
            return Err(CanvasRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(CanvasRepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> CanvasRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> CanvasRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
