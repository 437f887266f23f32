//! Browser bindings (wasm32 only).
//!
//! - `v86` - the emulator as a [`crate::Machine`] and guest filesystem
//! - `platform` - timers and fetch on `window`
//! - `handle` - the `Cli` class exported to JavaScript

mod handle;
mod platform;
mod v86;

pub use handle::Cli;
pub use platform::WebPlatform;
pub use v86::{V86Machine, V86};
