//! Sandbox CLI control layer
//!
//! Drives the emulated Linux machine behind the sandbox's terminal:
//!
//! - **Dispatch**: type shell commands on the serial terminal or the emulated
//!   keyboard, optionally hidden, optionally capturing their output
//! - **Staging**: list, read and write guest files, mount local or remote
//!   files into the tutorial directory, flush the guest page cache
//! - **Snapshots**: save and restore the tutorial directory through
//!   `sbx-state`
//!
//! The machine and the host page are reached through the [`Machine`] and
//! [`Platform`] traits. On wasm32 they are bound to v86 and `window`
//! (`web` module, exported to JavaScript as `Cli`); tests use the doubles in
//! [`testing`].
//!
//! ## Module Structure
//!
//! - `config` - bus names, guest paths, delays, runtime `CliConfig`
//! - `command` - command text rewriting and sentinel detection
//! - `session` - the per-page session handle
//! - `dispatch` - `Session::execute`
//! - `staging` - file staging operations
//! - `snapshot` - tutorial filesystem save/restore
//! - `logging` - `tracing` subscriber setup

// =============================================================================
// Module declarations
// =============================================================================

pub mod command;
pub mod config;
mod dispatch;
mod error;
pub mod logging;
mod machine;
mod platform;
mod session;
mod snapshot;
mod staging;
pub mod testing;

#[cfg(target_arch = "wasm32")]
pub mod web;

// =============================================================================
// Public re-exports
// =============================================================================

pub use config::CliConfig;
pub use dispatch::{CompletionCallback, ExecMode, ExecOptions};
pub use error::{ExecError, StageError};
pub use logging::init_logging;
pub use machine::{ListenerId, Machine, OutputListener};
pub use platform::{Platform, TimerTask};
pub use session::Session;
pub use staging::{infer_name, MountSource};

pub use sbx_state::{LocalState, MemoryStore, Namespace, StateError};
pub use sbx_vfs::{FileContents, FileInfo, GuestFs, VfsError};

#[cfg(target_arch = "wasm32")]
pub use web::Cli;
