//! Storage key construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key prefix for state that belongs to the (anonymous) local user.
pub const GUEST_PREFIX: &str = "guest";

/// Logical context a persisted value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Filesystem snapshot of a tutorial
    Fs,
    /// Free-form sandbox session
    Sandbox,
    /// Tutorial studio (authoring) session
    Studio,
    /// Quiz answers
    Quiz,
    /// IDE editor buffers
    Ide,
}

impl Namespace {
    /// Every namespace, in key order.
    pub const ALL: [Namespace; 5] = [
        Namespace::Fs,
        Namespace::Sandbox,
        Namespace::Studio,
        Namespace::Quiz,
        Namespace::Ide,
    ];

    /// Name used in storage keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Fs => "fs",
            Namespace::Sandbox => "sandbox",
            Namespace::Studio => "studio",
            Namespace::Quiz => "quiz",
            Namespace::Ide => "ide",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| format!("unknown state namespace: {}", s))
    }
}

/// Build the storage key for `(namespace, identifier)` under `prefix`.
pub fn state_key(prefix: &str, namespace: Namespace, identifier: Option<&str>) -> String {
    format!("{}:{}:{}", prefix, namespace, identifier.unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_key() {
        assert_eq!(state_key(GUEST_PREFIX, Namespace::Sandbox, None), "guest:sandbox:");
        assert_eq!(
            state_key(GUEST_PREFIX, Namespace::Ide, Some("main.py")),
            "guest:ide:main.py"
        );
        assert_eq!(
            state_key("user-42", Namespace::Fs, Some("bedtools-intro")),
            "user-42:fs:bedtools-intro"
        );
    }

    #[test]
    fn test_namespace_round_trip() {
        for ns in Namespace::ALL {
            assert_eq!(ns.as_str().parse::<Namespace>().unwrap(), ns);
        }
        assert!("playground".parse::<Namespace>().is_err());
    }
}
