//! Session handle
//!
//! One `Session` exists per page. It starts empty, receives the machine once
//! the emulator finishes booting (`attach`), and is cleared when the user
//! navigates away (`detach`). Every operation that needs the machine checks
//! for it first and degrades to a logged no-op when it is absent.
//!
//! The session also owns the list of terminal output listeners. That list is
//! the source of truth the dispatcher restores after muting the terminal.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{error, info};

use crate::config::CliConfig;
use crate::machine::{Machine, OutputListener};
use crate::platform::Platform;

pub struct Session<M, P> {
    pub(crate) config: CliConfig,
    pub(crate) platform: Rc<P>,
    machine: RefCell<Option<Rc<M>>>,
    pub(crate) listeners: Rc<RefCell<Vec<OutputListener>>>,
}

impl<M, P> Session<M, P>
where
    M: Machine + 'static,
    P: Platform + 'static,
{
    /// Create an empty session (no machine yet).
    pub fn new(config: CliConfig, platform: Rc<P>) -> Self {
        Self {
            config,
            platform,
            machine: RefCell::new(None),
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }

    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Hand the booted machine to the session.
    ///
    /// Listeners registered before boot are installed on the terminal bus.
    pub fn attach(&self, machine: Rc<M>) {
        info!(target: "sbx::cli", "machine attached");
        let listeners = self.listeners.borrow().clone();
        if !listeners.is_empty() {
            machine.set_bus_listeners(&self.config.bus_output, &listeners);
        }
        *self.machine.borrow_mut() = Some(machine);
    }

    /// Tear the session down, returning the machine it held.
    ///
    /// Registered output listeners stay with the session and are installed
    /// again by the next `attach`.
    pub fn detach(&self) -> Option<Rc<M>> {
        let machine = self.machine.borrow_mut().take();
        if machine.is_some() {
            info!(target: "sbx::cli", "machine detached");
        }
        machine
    }

    /// Check if a machine is attached.
    pub fn is_ready(&self) -> bool {
        self.machine.borrow().is_some()
    }

    /// The attached machine, if any.
    pub fn machine(&self) -> Option<Rc<M>> {
        self.machine.borrow().clone()
    }

    /// The attached machine, logging on behalf of `op` when there is none.
    pub(crate) fn active_machine(&self, op: &str) -> Option<Rc<M>> {
        let machine = self.machine();
        if machine.is_none() {
            error!(target: "sbx::cli", op, "Emulator not ready");
        }
        machine
    }

    // -------------------------------------------------------------------------
    // Terminal output listeners
    // -------------------------------------------------------------------------

    /// Register a terminal output listener (e.g. the terminal renderer).
    pub fn register_output_listener(&self, listener: OutputListener) {
        self.listeners.borrow_mut().push(listener);
        if let Some(machine) = self.machine() {
            let listeners = self.listeners.borrow().clone();
            machine.set_bus_listeners(&self.config.bus_output, &listeners);
        }
    }

    /// Registered terminal output listeners.
    pub fn output_listeners(&self) -> Vec<OutputListener> {
        self.listeners.borrow().clone()
    }
}
