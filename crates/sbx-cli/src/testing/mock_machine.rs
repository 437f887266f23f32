//! Mock machine for testing the CLI layer
//!
//! Records what the dispatcher types, keeps named listener lists the way the
//! emulator's bus does, and lets a test play guest output back through them.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use sbx_vfs::MemoryFs;

use crate::machine::{ListenerId, Machine, OutputListener};

/// Mock machine for unit and integration tests
///
/// Listeners added with `add_listener` and lists installed with
/// `set_bus_listeners` share one table per event name, so replacing a bus's
/// listeners also drops anything added to it individually.
pub struct MockMachine {
    fs: MemoryFs,
    /// Input bus traffic, in order (bus name, character code)
    input: RefCell<Vec<(String, u8)>>,
    /// Text typed on the emulated keyboard
    keyboard: RefCell<Vec<String>>,
    listeners: RefCell<BTreeMap<String, Vec<(ListenerId, OutputListener)>>>,
    next_id: Cell<u64>,
}

impl Default for MockMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMachine {
    /// Create a machine with an empty filesystem
    pub fn new() -> Self {
        Self::with_fs(MemoryFs::new())
    }

    /// Create a machine around a prepared filesystem
    pub fn with_fs(fs: MemoryFs) -> Self {
        Self {
            fs,
            input: RefCell::new(Vec::new()),
            keyboard: RefCell::new(Vec::new()),
            listeners: RefCell::new(BTreeMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Everything sent on `bus`, decoded as text
    pub fn typed(&self, bus: &str) -> String {
        let bytes: Vec<u8> = self
            .input
            .borrow()
            .iter()
            .filter(|(b, _)| b == bus)
            .map(|(_, code)| *code)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of character codes sent on any bus
    pub fn input_count(&self) -> usize {
        self.input.borrow().len()
    }

    /// Keyboard writes, one entry per call
    pub fn keyboard_text(&self) -> Vec<String> {
        self.keyboard.borrow().clone()
    }

    /// Forget recorded input
    pub fn clear_input(&self) {
        self.input.borrow_mut().clear();
        self.keyboard.borrow_mut().clear();
    }

    /// Number of listeners currently attached to `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    /// Simulate the guest writing `bytes` to `event`, one byte at a time
    ///
    /// Listeners may add or remove listeners while being called; each byte
    /// goes to the listeners attached when that byte is emitted.
    pub fn emit(&self, event: &str, bytes: &[u8]) {
        for &byte in bytes {
            let snapshot: Vec<OutputListener> = self
                .listeners
                .borrow()
                .get(event)
                .map(|list| list.iter().map(|(_, l)| Rc::clone(l)).collect())
                .unwrap_or_default();
            for listener in snapshot {
                listener(byte);
            }
        }
    }

    fn allocate_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }
}

impl Machine for MockMachine {
    type Fs = MemoryFs;

    fn send_input(&self, bus: &str, code: u8) {
        self.input.borrow_mut().push((String::from(bus), code));
    }

    fn keyboard_send_text(&self, text: &str) {
        self.keyboard.borrow_mut().push(String::from(text));
    }

    fn add_listener(&self, event: &str, listener: OutputListener) -> ListenerId {
        let id = self.allocate_id();
        self.listeners
            .borrow_mut()
            .entry(String::from(event))
            .or_default()
            .push((id, listener));
        id
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        if let Some(list) = self.listeners.borrow_mut().get_mut(event) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    fn set_bus_listeners(&self, bus: &str, listeners: &[OutputListener]) {
        let list = listeners
            .iter()
            .map(|l| (self.allocate_id(), Rc::clone(l)))
            .collect();
        self.listeners.borrow_mut().insert(String::from(bus), list);
    }

    fn fs(&self) -> &MemoryFs {
        &self.fs
    }
}
