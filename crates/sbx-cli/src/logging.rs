//! Logging setup
//!
//! Library code logs through `tracing` with `sbx::*` targets. In the browser
//! each formatted event goes to the devtools console at a matching severity;
//! natively (tests, tooling) it goes to stderr.

use std::str::FromStr;

use tracing_subscriber::filter::LevelFilter;

/// Parse a level name, falling back to `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_target(true)
        .without_time()
        .with_writer(writer())
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(not(target_arch = "wasm32"))]
fn writer() -> fn() -> std::io::Stderr {
    std::io::stderr
}

#[cfg(target_arch = "wasm32")]
fn writer() -> console::ConsoleMakeWriter {
    console::ConsoleMakeWriter
}

#[cfg(target_arch = "wasm32")]
mod console {
    use std::io;

    use tracing::{Level, Metadata};
    use tracing_subscriber::fmt::MakeWriter;
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen]
    extern "C" {
        #[wasm_bindgen(js_namespace = console)]
        fn log(s: &str);
        #[wasm_bindgen(js_namespace = console)]
        fn warn(s: &str);
        #[wasm_bindgen(js_namespace = console)]
        fn error(s: &str);
    }

    pub struct ConsoleMakeWriter;

    /// Buffers one formatted event and emits it on drop.
    pub struct ConsoleWriter {
        level: Level,
        buf: Vec<u8>,
    }

    impl io::Write for ConsoleWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ConsoleWriter {
        fn drop(&mut self) {
            if self.buf.is_empty() {
                return;
            }
            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim_end();
            match self.level {
                Level::ERROR => error(line),
                Level::WARN => warn(line),
                _ => log(line),
            }
        }
    }

    impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
        type Writer = ConsoleWriter;

        fn make_writer(&'a self) -> Self::Writer {
            ConsoleWriter {
                level: Level::INFO,
                buf: Vec::new(),
            }
        }

        fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
            ConsoleWriter {
                level: *meta.level(),
                buf: Vec::new(),
            }
        }
    }
}
