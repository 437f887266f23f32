//! Emulated machine interface
//!
//! The CLI layer never touches the emulator directly; it goes through this
//! trait so that the browser build can bind it to v86 while tests use
//! [`crate::testing::MockMachine`].

use std::rc::Rc;

use sbx_vfs::GuestFs;

/// Callback receiving one output byte from a bus event.
pub type OutputListener = Rc<dyn Fn(u8)>;

/// Handle returned by [`Machine::add_listener`], used to remove the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// A running emulated machine.
///
/// Implementations provide:
/// - keystroke delivery (serial input bus, synthetic keyboard)
/// - named output listeners (serial output buses)
/// - the guest filesystem handle
pub trait Machine {
    /// Guest filesystem handle
    type Fs: GuestFs;

    // === Input ===

    /// Send one character code on an input bus.
    fn send_input(&self, bus: &str, code: u8);

    /// Type text on the emulated keyboard, bypassing the serial terminal.
    fn keyboard_send_text(&self, text: &str);

    // === Output ===

    /// Register a listener for a named output event.
    fn add_listener(&self, event: &str, listener: OutputListener) -> ListenerId;

    /// Remove a listener registered with [`Machine::add_listener`].
    ///
    /// May be called from inside the listener itself.
    fn remove_listener(&self, event: &str, id: ListenerId);

    /// Replace the full listener set of an output bus.
    ///
    /// An empty slice mutes the bus.
    fn set_bus_listeners(&self, bus: &str, listeners: &[OutputListener]);

    // === Filesystem ===

    /// Guest filesystem.
    fn fs(&self) -> &Self::Fs;
}
