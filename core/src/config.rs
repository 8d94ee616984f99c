//! Runtime configuration for `RecordSync`.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_RECORD_TYPE: &str = "Fruits";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root URL of the record service.
    pub base_url: String,
    /// The one record type this client lists and writes.
    pub record_type: String,
    /// Upper bound on each network call issued by the actor.
    pub call_timeout: Duration,
    /// Capacity of the command channel between handles and the actor.
    pub command_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            record_type: DEFAULT_RECORD_TYPE.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl SyncConfig {
    /// Read `RECORD_SYNC_BASE_URL`, `RECORD_SYNC_RECORD_TYPE` and
    /// `RECORD_SYNC_TIMEOUT_MS`, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("RECORD_SYNC_BASE_URL").filter(|v| !v.is_empty()) {
            config.base_url = url;
        }
        if let Some(record_type) = lookup("RECORD_SYNC_RECORD_TYPE").filter(|v| !v.is_empty()) {
            config.record_type = record_type;
        }
        if let Some(raw) = lookup("RECORD_SYNC_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => config.call_timeout = Duration::from_millis(ms),
                _ => warn!(value = %raw, "ignoring invalid RECORD_SYNC_TIMEOUT_MS"),
            }
        }
        config
    }

    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = record_type.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}
