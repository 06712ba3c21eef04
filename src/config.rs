use std::{env, path::PathBuf, time::Duration};

use tracing::{debug, error, info, warn};

/// Configuration of the body ingestion core.
///
/// Covers buffer sizing, timeouts, the spill directory and the per request
/// staging policy switches. Constructed with [BodyConfig::new] and adjusted
/// with the `*_` builder methods.
#[derive(Clone, Debug)]
pub struct BodyConfig {
    pub(crate) client_body_buffer_size: usize,
    pub(crate) client_body_timeout: Duration,
    pub(crate) client_body_temp_path: PathBuf,
    pub(crate) lingering_time: Duration,
    pub(crate) lingering_timeout: Duration,
    pub(crate) body_in_file_only: bool,
    pub(crate) body_in_single_buf: bool,
    pub(crate) body_in_persistent_file: bool,
    pub(crate) body_in_clean_file: bool,
    pub(crate) body_file_group_access: bool,
    pub(crate) body_file_log_level: SpillLogLevel,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyConfig {
    pub fn new() -> Self {
        Self {
            client_body_buffer_size: 16 * 1024,
            client_body_timeout: Duration::from_secs(60),
            client_body_temp_path: env::temp_dir(),
            lingering_time: Duration::from_secs(30),
            lingering_timeout: Duration::from_secs(5),
            body_in_file_only: false,
            body_in_single_buf: false,
            body_in_persistent_file: false,
            body_in_clean_file: false,
            body_file_group_access: false,
            body_file_log_level: SpillLogLevel::Warn,
        }
    }

    /// Nominal capacity of a fresh memory buffer. The actual allocation for a
    /// short remainder is sized to the remainder itself.
    pub fn client_body_buffer_size(mut self, size: usize) -> Self {
        self.client_body_buffer_size = size;
        self
    }

    /// Deadline armed for every read event while body bytes are still owed.
    pub fn client_body_timeout(mut self, dur: Duration) -> Self {
        self.client_body_timeout = dur;
        self
    }

    /// Directory spill files are created under.
    pub fn client_body_temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_body_temp_path = path.into();
        self
    }

    /// Total wall clock budget granted to a lingering discard.
    pub fn lingering_time(mut self, dur: Duration) -> Self {
        self.lingering_time = dur;
        self
    }

    /// Upper bound for a single discard timer when a lingering deadline is set.
    pub fn lingering_timeout(mut self, dur: Duration) -> Self {
        self.lingering_timeout = dur;
        self
    }

    /// Spill every body to a file and expose the chain as one file segment.
    pub fn body_in_file_only(mut self, on: bool) -> Self {
        self.body_in_file_only = on;
        self
    }

    /// Expose the chain as one contiguous memory segment, copying any preread.
    pub fn body_in_single_buf(mut self, on: bool) -> Self {
        self.body_in_single_buf = on;
        self
    }

    /// Keep the spill file on disk after the request is torn down.
    pub fn body_in_persistent_file(mut self, on: bool) -> Self {
        self.body_in_persistent_file = on;
        self
    }

    /// Unlink the spill file right after creation so it lives only through
    /// the open descriptor.
    pub fn body_in_clean_file(mut self, on: bool) -> Self {
        self.body_in_clean_file = on;
        self
    }

    /// Create the spill file with mode 0660 instead of the process default.
    pub fn body_file_group_access(mut self, on: bool) -> Self {
        self.body_file_group_access = on;
        self
    }

    /// Level of the log line emitted when a body is buffered to disk.
    pub fn body_file_log_level(mut self, level: SpillLogLevel) -> Self {
        self.body_file_log_level = level;
        self
    }
}

/// Log level of the "buffered to a temporary file" notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpillLogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl SpillLogLevel {
    pub(crate) fn emit(self, msg: &str) {
        match self {
            Self::Error => error!(target: "h1_body", "{}", msg),
            Self::Warn => warn!(target: "h1_body", "{}", msg),
            Self::Info => info!(target: "h1_body", "{}", msg),
            Self::Debug => debug!(target: "h1_body", "{}", msg),
        }
    }
}
