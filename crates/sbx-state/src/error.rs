pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The filesystem snapshot was saved with no tutorial to file it under.
    ///
    /// This is a caller bug, not a runtime condition: the terminal was left
    /// (or never entered) before the save was issued.
    #[error("stopped saving FS state because moved away from terminal")]
    NoActiveTutorial,
    #[error("browser storage is not available in this context")]
    Unavailable,
    #[error("quota exceeded while writing to browser storage")]
    QuotaExceeded,
    #[error("stored value could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage operation failed: {0}")]
    Js(String),
}

impl StateError {
    /// Check if this error is a caller precondition violation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StateError::NoActiveTutorial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StateError::NoActiveTutorial.is_fatal());
        assert!(!StateError::Unavailable.is_fatal());
        assert!(!StateError::Js(String::from("SecurityError")).is_fatal());
    }

    #[test]
    fn test_serde_error_converts() {
        let err: StateError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, StateError::Serde(_)));
    }
}
