//! Document store configuration.

use crate::drag::CancelPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_HEADER_ROWS: usize = 1;

/// Tunables for one `DocumentStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Quiet period before a scheduled save fires.
    pub save_debounce_ms: u64,
    /// Leading table rows treated as headers by chart projection.
    pub header_rows: usize,
    pub cancel_policy: CancelPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
            header_rows: DEFAULT_HEADER_ROWS,
            cancel_policy: CancelPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;
    use crate::drag::CancelPolicy;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"cancel_policy":"restore_snapshot"}"#).unwrap();
        assert_eq!(config.cancel_policy, CancelPolicy::RestoreSnapshot);
        assert_eq!(config.save_debounce_ms, 1000);
        assert_eq!(config.header_rows, 1);
    }
}
