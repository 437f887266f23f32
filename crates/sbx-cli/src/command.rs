//! Command text formatting and completion detection.
//!
//! The guest gives no job-completion signal. A captured command is therefore
//! rewritten to send its output to the second serial port followed by a
//! sentinel and the command's exit status, and [`CompletionWatcher`] scans
//! that port's bytes for them:
//!
//! ```text
//!   (grep x f; echo '__san''dbox__'$?) > /dev/ttyS1
//!   ──► "<output>__sandbox__1\n"
//! ```

use crate::error::ExecError;

/// Marker tutorials use to wrap long commands over several display lines.
pub const LINE_CONTINUATION: &str = " \\ ";

/// Remove display line-continuation markers from a command.
///
/// The marker is replaced by one space, not removed, so the words on either
/// side stay separate arguments.
pub fn strip_continuations(cmd: &str) -> String {
    cmd.replace(LINE_CONTINUATION, " ")
}

/// Command text as typed: continuations stripped, newline appended.
pub fn format_command(cmd: &str) -> String {
    format!("{}\n", strip_continuations(cmd))
}

/// Character codes sent to the input bus for `command`.
pub fn char_codes(command: &str) -> Vec<u8> {
    command.as_bytes().to_vec()
}

/// Quote `s` as a single shell word.
fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Completion marker echoed after a captured command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sentinel {
    marker: String,
}

impl Sentinel {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Shell word that prints as the marker without spelling it out.
    ///
    /// The marker is split into two adjacent quoted halves, so the typed
    /// command (and its echo) never contains the marker itself.
    pub fn shell_word(&self) -> String {
        let chars: Vec<char> = self.marker.chars().collect();
        if chars.len() < 2 {
            return single_quote(&self.marker);
        }
        let (head, tail) = chars.split_at(chars.len() / 2);
        let head: String = head.iter().collect();
        let tail: String = tail.iter().collect();
        format!("{}{}", single_quote(&head), single_quote(&tail))
    }

    /// Rewrite `cmd` so its stdout, the marker and the exit status go to
    /// `check_file`.
    pub fn wrap(&self, cmd: &str, check_file: &str) -> String {
        format!("({}; echo {}$?) > {}\n", cmd, self.shell_word(), check_file)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WatchState {
    /// Looking for the marker
    Scanning,
    /// Marker seen at `output_end`; reading the status digits
    Status { output_end: usize },
    Done,
}

/// Accumulates output bytes until the sentinel and exit status show up.
pub struct CompletionWatcher {
    marker: Vec<u8>,
    buffer: Vec<u8>,
    status: Vec<u8>,
    state: WatchState,
}

impl CompletionWatcher {
    pub fn new(sentinel: &Sentinel) -> Self {
        Self {
            marker: sentinel.marker().as_bytes().to_vec(),
            buffer: Vec::new(),
            status: Vec::new(),
            state: WatchState::Scanning,
        }
    }

    /// Feed one byte.
    ///
    /// Once the marker and the status line after it are complete, returns
    /// everything before the marker: `Ok` for exit status 0,
    /// [`ExecError::Failed`] otherwise. The status line ends at a newline
    /// (carriage returns are skipped) or at the first other non-digit byte.
    /// After that the watcher ignores input.
    pub fn feed(&mut self, byte: u8) -> Option<Result<String, ExecError>> {
        match self.state {
            WatchState::Done => None,
            WatchState::Scanning => {
                self.buffer.push(byte);
                if !self.marker.is_empty() && self.buffer.ends_with(&self.marker) {
                    let output_end = self.buffer.len() - self.marker.len();
                    self.state = WatchState::Status { output_end };
                }
                None
            }
            WatchState::Status { output_end } => match byte {
                b'0'..=b'9' => {
                    self.status.push(byte);
                    None
                }
                b'\r' => None,
                _ => {
                    self.state = WatchState::Done;
                    Some(self.finish(output_end))
                }
            },
        }
    }

    fn finish(&self, output_end: usize) -> Result<String, ExecError> {
        let output = String::from_utf8_lossy(&self.buffer[..output_end]).into_owned();
        // No digits means the shell printed no status; treat as success.
        let status = std::str::from_utf8(&self.status)
            .ok()
            .filter(|digits| !digits.is_empty())
            .map(|digits| digits.parse::<i32>().unwrap_or(i32::MAX))
            .unwrap_or(0);
        if status == 0 {
            Ok(output)
        } else {
            Err(ExecError::Failed { status, output })
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == WatchState::Done
    }
}
