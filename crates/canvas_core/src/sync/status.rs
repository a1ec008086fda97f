//! Sync status flags shown by the UI.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Transient persistence state; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Sticky until the next successful save or load.
    pub sync_error: Option<String>,
    pub is_authenticated: bool,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            is_syncing: false,
            last_synced_at: None,
            sync_error: None,
            is_authenticated: true,
        }
    }
}

impl SyncStatus {
    /// Human-readable status label.
    pub fn label(&self) -> &'static str {
        if self.is_syncing {
            "Syncing..."
        } else if self.sync_error.is_some() {
            "Sync Error"
        } else if self.last_synced_at.is_some() {
            "Saved"
        } else {
            "Local"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SyncStatus;
    use chrono::Utc;

    #[test]
    fn label_prefers_in_flight_then_error_then_saved() {
        let mut status = SyncStatus::default();
        assert_eq!(status.label(), "Local");
        status.last_synced_at = Some(Utc::now());
        assert_eq!(status.label(), "Saved");
        status.sync_error = Some("storage failure".to_string());
        assert_eq!(status.label(), "Sync Error");
        status.is_syncing = true;
        assert_eq!(status.label(), "Syncing...");
    }
}
