use std::time::Duration;

use sbx_state::StateError;
use sbx_vfs::VfsError;

/// Errors from file staging and snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Vfs(#[from] VfsError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to read local file {name}: {reason}")]
    SourceRead { name: String, reason: String },
}

impl StageError {
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Failure delivered to a completion callback instead of output.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("command did not finish within {waited:?}")]
    TimedOut { waited: Duration },
    /// The command ran to completion with a nonzero exit status.
    #[error("command exited with status {status}")]
    Failed { status: i32, output: String },
}

impl ExecError {
    /// Output captured before the failure, if the command finished.
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecError::Failed { output, .. } => Some(output),
            ExecError::TimedOut { .. } => None,
        }
    }
}
