//! Collaborator contracts for persistence and canonical sections.
//!
//! # Responsibility
//! - Define the traits the document store calls across its async boundary.
//! - Define sealed payload shape and the persistence error taxonomy.
//!
//! # Invariants
//! - Implementations never see unsealed document JSON except through
//!   `PayloadSealer`.
//! - `PersistenceError::Unauthorized` is the only error that changes the
//!   store's authentication state.

pub mod status;

use crate::model::section::CanonicalSection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use status::SyncStatus;

/// Failures reported by persistence collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Caller is not authenticated or does not own the record.
    Unauthorized,
    /// Requested record does not exist.
    NotFound,
    /// Payload could not be sealed, opened or decoded.
    InvalidPayload(String),
    /// Backend storage failure.
    Storage(String),
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "canvas not found"),
            Self::InvalidPayload(message) => write!(f, "invalid canvas payload: {message}"),
            Self::Storage(message) => write!(f, "storage failure: {message}"),
        }
    }
}

impl Error for PersistenceError {}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidPayload(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Document payload as stored at rest, with optional integrity material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

/// At-rest payload transform.
pub trait PayloadSealer {
    fn seal(&self, plaintext: &str) -> PersistenceResult<SealedPayload>;
    fn open(&self, payload: &SealedPayload) -> PersistenceResult<String>;
}

/// Identity sealer: stores plaintext JSON without integrity material.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextSealer;

impl PayloadSealer for PlaintextSealer {
    fn seal(&self, plaintext: &str) -> PersistenceResult<SealedPayload> {
        Ok(SealedPayload {
            data: plaintext.to_string(),
            iv: None,
            salt: None,
        })
    }

    fn open(&self, payload: &SealedPayload) -> PersistenceResult<String> {
        if payload.iv.is_some() || payload.salt.is_some() {
            return Err(PersistenceError::InvalidPayload(
                "payload carries encryption material".to_string(),
            ));
        }
        Ok(payload.data.clone())
    }
}

/// Outbound save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    /// Canonical id adopted from an earlier save; `None` creates a record.
    pub document_id: Option<String>,
    pub title: String,
    pub payload: SealedPayload,
}

/// Persisted record identity returned by a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecord {
    pub id: String,
    pub updated_at: DateTime<Utc>,
}

/// Stored document returned by a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRecord {
    pub id: String,
    pub payload: SealedPayload,
    pub updated_at: DateTime<Utc>,
}

/// Saves sealed documents.
pub trait CanvasPersistence {
    fn save(&self, request: &SaveRequest) -> PersistenceResult<SavedRecord>;
}

/// Loads one document by id, or the latest one when `document_id` is `None`.
///
/// `Ok(None)` means "no document" and is not an error.
pub trait CanvasLoader {
    fn load(&self, document_id: Option<&str>) -> PersistenceResult<Option<LoadedRecord>>;
}

/// Serves the ordered authoritative section list.
pub trait CanonicalSectionSource {
    fn canonical_sections(&self) -> PersistenceResult<Vec<CanonicalSection>>;
}
