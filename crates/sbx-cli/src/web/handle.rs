//! JavaScript entry point
//!
//! `Cli` is what the web app holds: one per page, attached to the emulator
//! when it boots and detached when the page goes away. Async operations
//! return Promises; structured results cross as plain JS objects.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Promise, Uint8Array, JSON};
use sbx_state::{IdbStore, LocalState, Namespace, DEFAULT_DB_NAME};
use sbx_vfs::FileContents;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use crate::config::CliConfig;
use crate::dispatch::{ExecMode, ExecOptions};
use crate::error::{ExecError, StageError};
use crate::logging::init_logging;
use crate::machine::OutputListener;
use crate::session::Session;
use crate::staging::MountSource;

use super::platform::WebPlatform;
use super::v86::{V86Machine, V86};

type WebSession = Session<V86Machine, WebPlatform>;
type WebState = LocalState<IdbStore>;

fn js_error(err: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(js_error)?;
    JSON::parse(&json)
}

fn from_js(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let json: String = JSON::stringify(value)?.into();
    serde_json::from_str(&json).map_err(js_error)
}

fn contents_from_js(value: &JsValue) -> Result<FileContents, JsValue> {
    if let Some(text) = value.as_string() {
        return Ok(FileContents::Text(text));
    }
    if value.is_instance_of::<Uint8Array>() {
        return Ok(FileContents::Bytes(Uint8Array::new(value).to_vec()));
    }
    Err(js_error("file contents must be a string or a Uint8Array"))
}

fn parse_namespace(name: &str) -> Result<Namespace, JsValue> {
    name.parse().map_err(|e: String| js_error(e))
}

fn completion_callback(callback: Function) -> impl FnOnce(Result<String, ExecError>) + 'static {
    move |result| {
        let (output, error) = match result {
            Ok(output) => (JsValue::from_str(&output), JsValue::UNDEFINED),
            // A failed command still hands back what it printed.
            Err(e) => (
                e.output().map(JsValue::from_str).unwrap_or(JsValue::UNDEFINED),
                js_error(&e),
            ),
        };
        if let Err(e) = callback.call2(&JsValue::NULL, &output, &error) {
            warn!(target: "sbx::exec", error = ?e, "completion callback threw");
        }
    }
}

/// Persistent state, opened on first use.
#[derive(Clone, Default)]
struct StateSlot(Rc<RefCell<Option<Rc<WebState>>>>);

impl StateSlot {
    async fn get(&self) -> Result<Rc<WebState>, JsValue> {
        if let Some(state) = self.0.borrow().clone() {
            return Ok(state);
        }
        let store = IdbStore::open(DEFAULT_DB_NAME).await.map_err(|e| {
            warn!(target: "sbx::state", error = %e, "persistent state unavailable");
            js_error(e)
        })?;
        // Two first calls racing both open; the later handle wins.
        let state = Rc::new(LocalState::new(store));
        *self.0.borrow_mut() = Some(Rc::clone(&state));
        Ok(state)
    }
}

/// Control handle for the emulated machine.
#[wasm_bindgen]
pub struct Cli {
    session: Rc<WebSession>,
    state: StateSlot,
    /// Terminal renderer and its add-ons, held for the page
    terminal: RefCell<Option<JsValue>>,
}

#[wasm_bindgen]
impl Cli {
    /// Create a handle. `config` is optional JSON overriding defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<Cli, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let config = match config {
            Some(json) => CliConfig::from_json(&json).map_err(js_error)?,
            None => CliConfig::default(),
        };
        init_logging(&config.log_level);

        Ok(Cli {
            session: Rc::new(Session::new(config, Rc::new(WebPlatform))),
            state: StateSlot::default(),
            terminal: RefCell::new(None),
        })
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Hand over the booted emulator.
    pub fn attach(&self, emulator: V86) {
        self.session.attach(Rc::new(V86Machine::new(emulator)));
    }

    /// Forget the emulator and terminal (page teardown).
    pub fn detach(&self) {
        self.session.detach();
        self.terminal.borrow_mut().take();
    }

    /// Keep the terminal renderer (`{ xterm, addons }`) with the session.
    #[wasm_bindgen(js_name = setTerminal)]
    pub fn set_terminal(&self, terminal: JsValue) {
        *self.terminal.borrow_mut() = Some(terminal);
    }

    #[wasm_bindgen(getter)]
    pub fn terminal(&self) -> JsValue {
        self.terminal.borrow().clone().unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(getter, js_name = isReady)]
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    /// Register a terminal output listener `(byte: number) => void`.
    #[wasm_bindgen(js_name = registerOutputListener)]
    pub fn register_output_listener(&self, listener: Function) {
        let listener: OutputListener = Rc::new(move |byte| {
            if let Err(e) = listener.call1(&JsValue::NULL, &JsValue::from(byte)) {
                warn!(target: "sbx::cli", error = ?e, "output listener threw");
            }
        });
        self.session.register_output_listener(listener);
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Run a command. `mode` is `terminal` (default), `terminal-hidden` or
    /// `bus`. `callback(output, error)` receives the captured output; `error`
    /// is set when the command exits nonzero or never finishes.
    pub fn exec(
        &self,
        cmd: &str,
        mode: Option<String>,
        callback: Option<Function>,
    ) -> Result<(), JsValue> {
        let mode = match mode.as_deref() {
            Some(mode) => mode.parse::<ExecMode>().map_err(js_error)?,
            None => ExecMode::default(),
        };
        let mut options = ExecOptions::mode(mode);
        if let Some(callback) = callback {
            options = options.on_complete(completion_callback(callback));
        }
        self.session.execute(cmd, options);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Files
    // -------------------------------------------------------------------------

    /// Recursive listing of `path` as `{ path, isDir }[]`.
    pub fn ls(&self, path: &str) -> Result<JsValue, JsValue> {
        to_js(&self.session.list(path))
    }

    /// Resolves to a `Uint8Array`, or `null` if the file is missing.
    #[wasm_bindgen(js_name = readFile)]
    pub fn read_file(&self, path: String) -> Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            Ok(match session.read(&path).await {
                Some(bytes) => Uint8Array::from(bytes.as_slice()).into(),
                None => JsValue::NULL,
            })
        })
    }

    /// Write a string or `Uint8Array` to `path`.
    #[wasm_bindgen(js_name = createFile)]
    pub fn create_file(&self, path: String, contents: JsValue) -> Result<Promise, JsValue> {
        let contents = contents_from_js(&contents)?;
        let session = Rc::clone(&self.session);
        Ok(future_to_promise(async move {
            session.write(&path, contents).await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        }))
    }

    #[wasm_bindgen(js_name = createFolder)]
    pub fn create_folder(&self, path: String) -> Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            session.make_directory(&path).await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Mount a user-picked file; resolves to the path relative to the
    /// tutorial directory.
    #[wasm_bindgen(js_name = mountFile)]
    pub fn mount_file(&self, path: String, file: web_sys::File) -> Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let name = file.name();
            let buffer = JsFuture::from(file.array_buffer()).await.map_err(|e| {
                js_error(StageError::SourceRead {
                    name: name.clone(),
                    reason: format!("{:?}", e),
                })
            })?;
            let data = Uint8Array::new(&buffer).to_vec();
            let mounted = session
                .mount(&path, MountSource::File { name, data })
                .await
                .map_err(js_error)?;
            Ok(JsValue::from_str(&mounted))
        })
    }

    /// Download `url` into the tutorial directory.
    #[wasm_bindgen(js_name = mountUrl)]
    pub fn mount_url(&self, path: String, url: String) -> Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let mounted = session
                .mount(&path, MountSource::Url(url))
                .await
                .map_err(js_error)?;
            Ok(JsValue::from_str(&mounted))
        })
    }

    #[wasm_bindgen(js_name = clearCache)]
    pub fn clear_cache(&self) -> Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            session.drop_caches().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    // -------------------------------------------------------------------------
    // Persistent state
    // -------------------------------------------------------------------------

    /// Resolves to the stored value, or `null`.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self, namespace: &str, id: Option<String>) -> Result<Promise, JsValue> {
        let namespace = parse_namespace(namespace)?;
        let state = self.state.clone();
        Ok(future_to_promise(async move {
            let state = state.get().await?;
            let value: Option<Value> = state
                .get(namespace, id.as_deref())
                .await
                .map_err(js_error)?;
            to_js(&value.unwrap_or(Value::Null))
        }))
    }

    /// Resolves to the value that was stored.
    #[wasm_bindgen(js_name = setState)]
    pub fn set_state(
        &self,
        namespace: &str,
        id: Option<String>,
        value: JsValue,
    ) -> Result<Promise, JsValue> {
        let namespace = parse_namespace(namespace)?;
        let value = from_js(&value)?;
        let state = self.state.clone();
        Ok(future_to_promise(async move {
            let state = state.get().await?;
            let saved = state
                .set(namespace, id.as_deref(), value)
                .await
                .map_err(js_error)?;
            to_js(&saved)
        }))
    }

    /// Snapshot the tutorial directory; resolves to the entry count.
    #[wasm_bindgen(js_name = saveFsState)]
    pub fn save_fs_state(&self, tutorial: String) -> Promise {
        let state = self.state.clone();
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let state = state.get().await?;
            let count = session
                .save_fs_state(&*state, &tutorial)
                .await
                .map_err(js_error)?;
            Ok(JsValue::from(count as u32))
        })
    }

    /// Replay a saved snapshot; resolves to the entry count.
    #[wasm_bindgen(js_name = restoreFsState)]
    pub fn restore_fs_state(&self, tutorial: String) -> Promise {
        let state = self.state.clone();
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let state = state.get().await?;
            let count = session
                .restore_fs_state(&*state, &tutorial)
                .await
                .map_err(js_error)?;
            Ok(JsValue::from(count as u32))
        })
    }
}
