//! Browser-local persistence for the sandbox CLI.
//!
//! JSON values are stored under deterministic, namespaced keys:
//!
//! ```text
//! guest:<namespace>:<identifier>
//! ```
//!
//! Namespaces separate the general session (`sandbox`, `studio`, `quiz`), IDE
//! buffers (`ide`, keyed by file name) and the per-tutorial filesystem
//! snapshot (`fs`, keyed by tutorial id). Saves overwrite wholesale; there is
//! no versioning, merging or conflict resolution.

mod error;
mod key;
mod local_state;
mod memory;
mod store;

#[cfg(target_arch = "wasm32")]
mod browser;

pub use error::StateError;
pub use key::{state_key, Namespace, GUEST_PREFIX};
pub use local_state::{FsSnapshot, LocalState};
pub use memory::MemoryStore;
pub use store::KvStore;

#[cfg(target_arch = "wasm32")]
pub use browser::{IdbStore, DEFAULT_DB_NAME};
