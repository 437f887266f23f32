//! v86 bindings
//!
//! Binds the [`Machine`] and [`GuestFs`] traits to a live `V86` emulator
//! object. Rust listeners are wrapped in JS closures that this type keeps
//! alive for as long as the emulator may call them; dropping the machine
//! unregisters every one of them first.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

use js_sys::{Array, Object, Promise, Reflect, Uint8Array};
use sbx_vfs::{GuestFs, InodeId, PathLookup, VfsError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::machine::{ListenerId, Machine, OutputListener};

#[wasm_bindgen]
extern "C" {
    /// The emulator object created by `new V86({...})`.
    #[derive(Clone)]
    pub type V86;

    #[wasm_bindgen(method)]
    fn add_listener(this: &V86, event: &str, listener: &JsValue);

    #[wasm_bindgen(method)]
    fn remove_listener(this: &V86, event: &str, listener: &JsValue);

    #[wasm_bindgen(method)]
    fn keyboard_send_text(this: &V86, text: &str);

    #[wasm_bindgen(method, catch)]
    fn read_file(this: &V86, path: &str) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn create_file(this: &V86, path: &str, data: &Uint8Array) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, getter)]
    fn bus(this: &V86) -> Bus;

    #[wasm_bindgen(method, getter)]
    fn fs9p(this: &V86) -> Fs9p;

    type Bus;

    #[wasm_bindgen(method)]
    fn send(this: &Bus, name: &str, value: u32);

    #[wasm_bindgen(method, getter)]
    fn listeners(this: &Bus) -> Object;

    type Fs9p;

    #[wasm_bindgen(method, js_name = SearchPath)]
    fn search_path(this: &Fs9p, path: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = IsDirectory)]
    fn is_directory(this: &Fs9p, id: u32) -> bool;

    #[wasm_bindgen(method)]
    fn read_dir(this: &Fs9p, path: &str) -> JsValue;

    #[wasm_bindgen(method, js_name = CreateDirectory)]
    fn create_directory(this: &Fs9p, name: &str, parent_id: u32) -> u32;
}

type JsListener = Closure<dyn FnMut(JsValue)>;

/// Wrap a listener; `running` counts wrapped listeners currently on the stack.
fn wrap_listener(listener: OutputListener, running: Rc<Cell<u32>>) -> JsListener {
    Closure::wrap(Box::new(move |value: JsValue| {
        if let Some(code) = value.as_f64() {
            running.set(running.get() + 1);
            listener(code as u8);
            running.set(running.get() - 1);
        }
    }) as Box<dyn FnMut(JsValue)>)
}

/// Read an inode field of a `SearchPath` result (`-1` means none).
fn inode_field(lookup: &JsValue, field: &str) -> Option<InodeId> {
    Reflect::get(lookup, &field.into())
        .ok()
        .and_then(|v| v.as_f64())
        .filter(|v| *v >= 0.0)
        .map(|v| v as InodeId)
}

fn error_message(err: &JsValue) -> String {
    Reflect::get(err, &"message".into())
        .ok()
        .and_then(|v| v.as_string())
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{:?}", err))
}

/// A booted v86 emulator.
pub struct V86Machine {
    emulator: V86,
    /// Closures registered with `add_listener`, by id
    listeners: RefCell<BTreeMap<ListenerId, (String, JsListener)>>,
    /// Closures installed with `set_bus_listeners`, by bus
    bus_closures: RefCell<BTreeMap<String, Vec<JsListener>>>,
    /// Closures no longer registered; one may still be on the JS stack
    retired: RefCell<Vec<JsListener>>,
    running: Rc<Cell<u32>>,
    next_id: Cell<u64>,
}

impl V86Machine {
    pub fn new(emulator: V86) -> Self {
        Self {
            emulator,
            listeners: RefCell::new(BTreeMap::new()),
            bus_closures: RefCell::new(BTreeMap::new()),
            retired: RefCell::new(Vec::new()),
            running: Rc::new(Cell::new(0)),
            next_id: Cell::new(1),
        }
    }

    pub fn emulator(&self) -> &V86 {
        &self.emulator
    }

    fn wrap(&self, listener: OutputListener) -> JsListener {
        wrap_listener(listener, Rc::clone(&self.running))
    }

    fn retire(&self, closures: impl IntoIterator<Item = JsListener>) {
        self.retired.borrow_mut().extend(closures);
    }

    /// Free retired closures once none of ours is executing.
    fn collect_retired(&self) {
        if self.running.get() == 0 {
            self.retired.borrow_mut().clear();
        }
    }
}

impl Drop for V86Machine {
    fn drop(&mut self) {
        let mut released: Vec<JsListener> = Vec::new();
        for (_, (event, closure)) in std::mem::take(self.listeners.get_mut()) {
            self.emulator.remove_listener(&event, closure.as_ref());
            released.push(closure);
        }
        // Installed entries share the `add_listener` table, so this removes
        // ours and leaves entries the page added.
        for (bus, closures) in std::mem::take(self.bus_closures.get_mut()) {
            for closure in closures {
                self.emulator.remove_listener(&bus, closure.as_ref());
                released.push(closure);
            }
        }
        released.append(self.retired.get_mut());

        // Dropped from inside one of our own listeners: that closure is
        // still executing and must outlive this frame.
        if self.running.get() > 0 {
            released.into_iter().for_each(Closure::forget);
        }
    }
}

impl Machine for V86Machine {
    type Fs = Self;

    fn send_input(&self, bus: &str, code: u8) {
        self.emulator.bus().send(bus, u32::from(code));
    }

    fn keyboard_send_text(&self, text: &str) {
        self.emulator.keyboard_send_text(text);
    }

    fn add_listener(&self, event: &str, listener: OutputListener) -> ListenerId {
        self.collect_retired();

        let closure = self.wrap(listener);
        self.emulator.add_listener(event, closure.as_ref());

        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .insert(id, (String::from(event), closure));
        id
    }

    fn remove_listener(&self, event: &str, id: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&id);
        if let Some((registered, closure)) = removed {
            debug_assert_eq!(registered, event);
            self.emulator.remove_listener(event, closure.as_ref());
            self.retire([closure]);
        }
    }

    fn set_bus_listeners(&self, bus: &str, listeners: &[OutputListener]) {
        self.collect_retired();

        let entries = Array::new();
        let closures: Vec<JsListener> = listeners.iter().cloned().map(|l| self.wrap(l)).collect();
        for closure in &closures {
            let entry = Object::new();
            let _ = Reflect::set(&entry, &"fn".into(), closure.as_ref());
            let _ = Reflect::set(&entry, &"this_value".into(), &JsValue::UNDEFINED);
            entries.push(&entry);
        }
        let _ = Reflect::set(&self.emulator.bus().listeners(), &bus.into(), &entries);

        let previous = self
            .bus_closures
            .borrow_mut()
            .insert(String::from(bus), closures);
        if let Some(previous) = previous {
            self.retire(previous);
        }
    }

    fn fs(&self) -> &Self {
        self
    }
}

impl GuestFs for V86Machine {
    fn search_path(&self, path: &str) -> PathLookup {
        let lookup = self.emulator.fs9p().search_path(path);
        let parent_id = inode_field(&lookup, "parentid");
        match inode_field(&lookup, "id") {
            Some(id) => PathLookup::found(id, parent_id),
            None => PathLookup::missing(parent_id),
        }
    }

    fn is_directory(&self, id: InodeId) -> bool {
        self.emulator.fs9p().is_directory(id)
    }

    fn read_dir(&self, path: &str) -> Vec<String> {
        let names = self.emulator.fs9p().read_dir(path);
        if !Array::is_array(&names) {
            return Vec::new();
        }
        Array::from(&names)
            .iter()
            .filter_map(|name| name.as_string())
            .collect()
    }

    fn create_directory(&self, name: &str, parent_id: InodeId) -> InodeId {
        self.emulator.fs9p().create_directory(name, parent_id)
    }

    fn read_file<'a>(&'a self, path: &'a str) -> impl Future<Output = Result<Vec<u8>, VfsError>> + 'a {
        async move {
            let promise = self
                .emulator
                .read_file(path)
                .map_err(|e| VfsError::io(error_message(&e)))?;
            match JsFuture::from(promise).await {
                Ok(value) => Ok(value.unchecked_into::<Uint8Array>().to_vec()),
                Err(e) => {
                    let message = error_message(&e);
                    if message.contains("File not found") {
                        Err(VfsError::not_found(path))
                    } else {
                        Err(VfsError::io(message))
                    }
                }
            }
        }
    }

    fn create_file<'a>(
        &'a self,
        path: &'a str,
        data: &'a [u8],
    ) -> impl Future<Output = Result<(), VfsError>> + 'a {
        async move {
            let bytes = Uint8Array::from(data);
            let promise = self
                .emulator
                .create_file(path, &bytes)
                .map_err(|e| VfsError::io(error_message(&e)))?;
            JsFuture::from(promise)
                .await
                .map_err(|e| VfsError::io(error_message(&e)))?;
            Ok(())
        }
    }
}
