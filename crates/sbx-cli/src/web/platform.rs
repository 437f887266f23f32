//! Browser platform: `setTimeout` and `fetch`.

use std::future::Future;
use std::time::Duration;

use js_sys::{Promise, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::StageError;
use crate::platform::{Platform, TimerTask};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = setTimeout)]
    fn set_timeout_js(handler: &JsValue, millis: f64) -> JsValue;
}

fn millis(delay: Duration) -> f64 {
    delay.as_secs_f64() * 1000.0
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WebPlatform;

impl Platform for WebPlatform {
    fn set_timeout(&self, delay: Duration, task: TimerTask) {
        let handler = Closure::once_into_js(task);
        set_timeout_js(&handler, millis(delay));
    }

    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + '_ {
        let promise = Promise::new(&mut |resolve, _reject| {
            set_timeout_js(&resolve, millis(delay));
        });
        async move {
            let _ = JsFuture::from(promise).await;
        }
    }

    fn fetch<'a>(&'a self, url: &'a str) -> impl Future<Output = Result<Vec<u8>, StageError>> + 'a {
        async move {
            let window = web_sys::window().ok_or_else(|| StageError::fetch(url, "no window"))?;
            let response = JsFuture::from(window.fetch_with_str(url))
                .await
                .map_err(|e| StageError::fetch(url, format!("{:?}", e)))?;
            let response: web_sys::Response = response
                .dyn_into()
                .map_err(|_| StageError::fetch(url, "not a Response"))?;
            if !response.ok() {
                return Err(StageError::fetch(
                    url,
                    format!("{} {}", response.status(), response.status_text()),
                ));
            }

            let buffer = response
                .array_buffer()
                .map_err(|e| StageError::fetch(url, format!("{:?}", e)))?;
            let buffer = JsFuture::from(buffer)
                .await
                .map_err(|e| StageError::fetch(url, format!("{:?}", e)))?;
            Ok(Uint8Array::new(&buffer).to_vec())
        }
    }
}
