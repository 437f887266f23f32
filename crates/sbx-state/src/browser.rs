//! IndexedDB backend.
//!
//! One object store holds every key; values are stored as JSON text. Unlike
//! `localStorage` there is no fixed per-origin cap of a few megabytes, so
//! filesystem snapshots with real data files fit.
//!
//! IndexedDB requests report through `onsuccess`/`onerror` events. Each one is
//! bridged to a Promise and awaited with [`JsFuture`].

use std::future::Future;

use js_sys::Promise;
use serde_json::Value;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{IdbDatabase, IdbFactory, IdbRequest, IdbTransaction, IdbTransactionMode};

use crate::error::{Result, StateError};
use crate::store::KvStore;

/// Database the web app keeps its state in.
pub const DEFAULT_DB_NAME: &str = "sbx-state";

const STORE_NAME: &str = "kv";
const DB_VERSION: u32 = 1;

pub struct IdbStore {
    db: IdbDatabase,
}

impl IdbStore {
    /// Open (creating on first use) the database `name`.
    pub async fn open(name: &str) -> Result<Self> {
        let request = factory()?.open_with_u32(name, DB_VERSION).map_err(js_error)?;

        let upgrade = {
            let request = request.clone();
            Closure::wrap(Box::new(move |_event: web_sys::Event| {
                let db: IdbDatabase = match request.result() {
                    Ok(db) => db.unchecked_into(),
                    Err(e) => {
                        warn!(target: "sbx::state", error = ?e, "upgrade without a database");
                        return;
                    }
                };
                if let Err(e) = db.create_object_store(STORE_NAME) {
                    warn!(target: "sbx::state", error = ?e, "failed to create object store");
                }
            }) as Box<dyn FnMut(web_sys::Event)>)
        };
        request.set_onupgradeneeded(Some(upgrade.as_ref().unchecked_ref()));
        let opened = settle(&request).await;
        request.set_onupgradeneeded(None);

        let db: IdbDatabase = opened?.unchecked_into();
        debug!(target: "sbx::state", name, "indexeddb opened");
        Ok(Self { db })
    }

    /// Delete the database `name`. Open handles must be dropped first.
    pub async fn delete_database(name: &str) -> Result<()> {
        let request = factory()?.delete_database(name).map_err(js_error)?;
        settle(&request).await.map(|_| ())
    }
}

impl Drop for IdbStore {
    fn drop(&mut self) {
        self.db.close();
    }
}

impl KvStore for IdbStore {
    fn get_item<'a>(&'a self, key: &'a str) -> impl Future<Output = Result<Option<Value>>> + 'a {
        async move {
            let tx = self.db.transaction_with_str(STORE_NAME).map_err(js_error)?;
            let store = tx.object_store(STORE_NAME).map_err(js_error)?;
            let request = store.get(&JsValue::from_str(key)).map_err(js_error)?;
            match settle(&request).await?.as_string() {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        }
    }

    fn set_item<'a>(&'a self, key: &'a str, value: Value) -> impl Future<Output = Result<()>> + 'a {
        async move {
            let text = serde_json::to_string(&value)?;
            let tx = self
                .db
                .transaction_with_str_and_mode(STORE_NAME, IdbTransactionMode::Readwrite)
                .map_err(js_error)?;
            let store = tx.object_store(STORE_NAME).map_err(js_error)?;
            store
                .put_with_key(&JsValue::from_str(&text), &JsValue::from_str(key))
                .map_err(js_error)?;
            // Quota failures surface on the transaction, not the request.
            committed(&tx).await
        }
    }
}

fn factory() -> Result<IdbFactory> {
    let global = js_sys::global();
    let factory = if let Some(window) = global.dyn_ref::<web_sys::Window>() {
        window.indexed_db()
    } else if let Some(worker) = global.dyn_ref::<web_sys::WorkerGlobalScope>() {
        worker.indexed_db()
    } else {
        return Err(StateError::Unavailable);
    };
    factory.map_err(js_error)?.ok_or(StateError::Unavailable)
}

/// Wait for `request` to fire `success` or `error`.
async fn settle(request: &IdbRequest) -> Result<JsValue> {
    let promise = Promise::new(&mut |resolve, reject| {
        request.set_onsuccess(Some(&resolve));
        request.set_onerror(Some(&reject));
    });
    let outcome = JsFuture::from(promise).await;
    request.set_onsuccess(None);
    request.set_onerror(None);

    match outcome {
        Ok(_) => request.result().map_err(js_error),
        Err(event) => match request.error() {
            Ok(Some(ex)) => Err(dom_error(&ex)),
            _ => Err(js_error(event)),
        },
    }
}

/// Wait for `tx` to commit.
async fn committed(tx: &IdbTransaction) -> Result<()> {
    let promise = Promise::new(&mut |resolve, reject| {
        tx.set_oncomplete(Some(&resolve));
        tx.set_onerror(Some(&reject));
        tx.set_onabort(Some(&reject));
    });
    let outcome = JsFuture::from(promise).await;
    tx.set_oncomplete(None);
    tx.set_onerror(None);
    tx.set_onabort(None);

    match outcome {
        Ok(_) => Ok(()),
        Err(event) => match tx.error() {
            Some(ex) => Err(dom_error(&ex)),
            None => Err(js_error(event)),
        },
    }
}

fn dom_error(ex: &web_sys::DomException) -> StateError {
    // https://webidl.spec.whatwg.org/#idl-DOMException-error-names
    match ex.name().as_str() {
        "QuotaExceededError" => StateError::QuotaExceeded,
        "SecurityError" | "InvalidStateError" => StateError::Unavailable,
        _ => StateError::Js(ex.message()),
    }
}

fn js_error(value: JsValue) -> StateError {
    match value.dyn_ref::<web_sys::DomException>() {
        Some(ex) => dom_error(ex),
        None => StateError::Js(format!("{:?}", value)),
    }
}
