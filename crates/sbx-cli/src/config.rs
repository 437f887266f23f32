//! Centralized configuration for the CLI layer
//!
//! Bus names, guest paths, the completion sentinel and the fixed delays live
//! here so they can be audited (and overridden from the web app) in one place.
//!
//! ## Serial Port Conventions
//!
//! - `serial0`: the interactive shell shown in the terminal
//! - `serial1`: side channel for command output captured by the dispatcher

use std::time::Duration;

use serde::Deserialize;

// =============================================================================
// Emulator bus names
// =============================================================================

/// Bus event carrying terminal keystrokes into the guest.
pub const BUS_INPUT: &str = "serial0-input";

/// Bus event carrying terminal output bytes out of the guest.
pub const BUS_OUTPUT: &str = "serial0-output-byte";

/// Bus event carrying captured command output (second serial port).
pub const BUS_OUTPUT_CHECK: &str = "serial1-output-byte";

// =============================================================================
// Guest paths
// =============================================================================

/// Guest device the dispatcher redirects captured output to.
pub const FILE_CHECK: &str = "/dev/ttyS1";

/// Guest directory tutorials stage their files under.
pub const DIR_TUTORIAL: &str = "/root/tutorial";

/// Shell command that flushes the guest page cache.
pub const CMD_DROP_CACHES: &str = "sync; echo 3 >/proc/sys/vm/drop_caches";

// =============================================================================
// Completion detection & delays
// =============================================================================

/// Marker echoed after a captured command finishes.
pub const SENTINEL: &str = "__sandbox__";

/// How long terminal output stays muted in hidden mode.
pub const HIDDEN_RESTORE_MS: u64 = 500;

/// Settle time after a cache drop.
pub const CACHE_SETTLE_MS: u64 = 200;

/// Give up on a captured command after this long.
pub const COMPLETION_TIMEOUT_MS: u64 = 30_000;

/// Runtime configuration, deserialized from the web app's JSON.
///
/// Every field is optional on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub bus_input: String,
    pub bus_output: String,
    pub bus_output_check: String,
    pub check_file: String,
    pub tutorial_dir: String,
    pub sentinel: String,
    pub hidden_restore_ms: u64,
    pub cache_settle_ms: u64,
    /// 0 waits for the sentinel forever
    pub completion_timeout_ms: u64,
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            bus_input: String::from(BUS_INPUT),
            bus_output: String::from(BUS_OUTPUT),
            bus_output_check: String::from(BUS_OUTPUT_CHECK),
            check_file: String::from(FILE_CHECK),
            tutorial_dir: String::from(DIR_TUTORIAL),
            sentinel: String::from(SENTINEL),
            hidden_restore_ms: HIDDEN_RESTORE_MS,
            cache_settle_ms: CACHE_SETTLE_MS,
            completion_timeout_ms: COMPLETION_TIMEOUT_MS,
            log_level: String::from("info"),
        }
    }
}

impl CliConfig {
    /// Parse a JSON config, falling back to defaults for missing fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn hidden_restore_delay(&self) -> Duration {
        Duration::from_millis(self.hidden_restore_ms)
    }

    pub fn cache_settle_delay(&self) -> Duration {
        Duration::from_millis(self.cache_settle_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}
