//! Command dispatcher
//!
//! Types a shell command into the guest in one of three delivery modes and,
//! when the caller asks for it, captures the command's output:
//!
//! ```text
//!   execute("ls", on_complete)
//!      │
//!      ├─ rewrite:  (ls; echo '__san''dbox__'$?) > /dev/ttyS1
//!      ├─ listen:   serial1-output-byte ──► CompletionWatcher
//!      │                                        │ sentinel + status seen
//!      │                                        ▼
//!      │                  remove listener, on_complete(Ok(out) | Err(Failed))
//!      ├─ timer:    completion timeout ──► on_complete(Err(TimedOut))
//!      │
//!      └─ deliver:  Terminal        → serial0-input, one code per byte
//!                   TerminalHidden  → mute serial0 output, type, restore later
//!                   Bus             → emulated keyboard
//! ```
//!
//! The callback runs at most once, whichever of the two paths gets there first.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::command::{char_codes, strip_continuations, CompletionWatcher, Sentinel};
use crate::error::ExecError;
use crate::machine::{ListenerId, Machine, OutputListener};
use crate::platform::Platform;
use crate::session::Session;

/// Called once with the captured output, or with the reason there is none.
pub type CompletionCallback = Box<dyn FnOnce(Result<String, ExecError>)>;

/// How a command reaches the guest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecMode {
    /// Typed on the serial terminal; the user sees it.
    #[default]
    Terminal,
    /// Typed on the serial terminal while terminal output is muted.
    TerminalHidden,
    /// Typed on the emulated keyboard, bypassing the serial terminal.
    Bus,
}

impl ExecMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecMode::Terminal => "terminal",
            ExecMode::TerminalHidden => "terminal-hidden",
            ExecMode::Bus => "bus",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terminal" => Ok(ExecMode::Terminal),
            "terminal-hidden" => Ok(ExecMode::TerminalHidden),
            "bus" => Ok(ExecMode::Bus),
            other => Err(format!("unknown exec mode: {}", other)),
        }
    }
}

/// Options for [`Session::execute`].
#[derive(Default)]
pub struct ExecOptions {
    pub mode: ExecMode,
    pub on_complete: Option<CompletionCallback>,
}

impl ExecOptions {
    pub fn mode(mode: ExecMode) -> Self {
        Self {
            mode,
            on_complete: None,
        }
    }

    /// Capture the command's output and hand it to `callback`.
    pub fn on_complete(mut self, callback: impl FnOnce(Result<String, ExecError>) + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("mode", &self.mode)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl<M, P> Session<M, P>
where
    M: Machine + 'static,
    P: Platform + 'static,
{
    /// Send a shell command to the guest.
    ///
    /// Without a session this logs and returns; the callback is dropped
    /// without being called.
    pub fn execute(&self, cmd: &str, options: ExecOptions) {
        let Some(machine) = self.active_machine("execute") else {
            return;
        };

        let cmd = strip_continuations(cmd);
        let command = match options.on_complete {
            Some(callback) => {
                let sentinel = Sentinel::new(self.config.sentinel.as_str());
                self.watch_completion(&machine, &sentinel, callback);
                sentinel.wrap(&cmd, &self.config.check_file)
            }
            None => format!("{}\n", cmd),
        };

        debug!(target: "sbx::exec", mode = %options.mode, command = %command.trim_end(), "dispatch");

        match options.mode {
            ExecMode::Terminal => self.type_on_terminal(&machine, &command),
            ExecMode::Bus => machine.keyboard_send_text(&command),
            ExecMode::TerminalHidden => {
                machine.set_bus_listeners(&self.config.bus_output, &[]);
                self.type_on_terminal(&machine, &command);
                self.schedule_listener_restore(&machine);
            }
        }
    }

    fn type_on_terminal(&self, machine: &M, command: &str) {
        for code in char_codes(command) {
            machine.send_input(&self.config.bus_input, code);
        }
    }

    /// Reinstall the session's terminal listeners after the hidden window.
    ///
    /// Uses the listener list as it is when the timer fires, so listeners
    /// registered in the meantime are not lost.
    fn schedule_listener_restore(&self, machine: &Rc<M>) {
        let machine = Rc::downgrade(machine);
        let listeners = Rc::clone(&self.listeners);
        let bus = self.config.bus_output.clone();

        self.platform.set_timeout(
            self.config.hidden_restore_delay(),
            Box::new(move || {
                let Some(machine) = machine.upgrade() else {
                    return;
                };
                let current = listeners.borrow().clone();
                machine.set_bus_listeners(&bus, &current);
                debug!(target: "sbx::exec", count = current.len(), "terminal output restored");
            }),
        );
    }

    /// Watch the capture bus for the sentinel and arm the timeout.
    fn watch_completion(&self, machine: &Rc<M>, sentinel: &Sentinel, callback: CompletionCallback) {
        let event = self.config.bus_output_check.clone();
        let pending: Rc<RefCell<Option<CompletionCallback>>> = Rc::new(RefCell::new(Some(callback)));
        let listener_id: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));

        let listener: OutputListener = {
            let watcher = RefCell::new(CompletionWatcher::new(sentinel));
            let pending = Rc::clone(&pending);
            let listener_id = Rc::clone(&listener_id);
            let machine = Rc::downgrade(machine);
            let event = event.clone();
            Rc::new(move |byte| {
                let result = watcher.borrow_mut().feed(byte);
                let Some(result) = result else {
                    return;
                };
                if let (Some(machine), Some(id)) = (machine.upgrade(), listener_id.take()) {
                    machine.remove_listener(&event, id);
                }
                let callback = pending.borrow_mut().take();
                if let Some(callback) = callback {
                    match &result {
                        Ok(output) => {
                            debug!(target: "sbx::exec", bytes = output.len(), "command finished")
                        }
                        Err(e) => debug!(target: "sbx::exec", error = %e, "command failed"),
                    }
                    callback(result);
                }
            })
        };
        listener_id.set(Some(machine.add_listener(&event, listener)));

        let timeout = self.config.completion_timeout();
        if timeout.is_zero() {
            return;
        }
        let machine = Rc::downgrade(machine);
        self.platform.set_timeout(
            timeout,
            Box::new(move || {
                let callback = pending.borrow_mut().take();
                let Some(callback) = callback else {
                    return;
                };
                if let (Some(machine), Some(id)) = (machine.upgrade(), listener_id.take()) {
                    machine.remove_listener(&event, id);
                }
                warn!(target: "sbx::exec", ?timeout, "no completion marker; giving up");
                callback(Err(ExecError::TimedOut { waited: timeout }));
            }),
        );
    }
}
