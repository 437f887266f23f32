#![cfg(target_arch = "wasm32")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use js_sys::{Function, Reflect};
use sbx_cli::web::{Cli, V86Machine, WebPlatform, V86};
use sbx_cli::{CliConfig, ExecOptions, Machine, OutputListener, Platform, Session};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::wasm_bindgen_test;

wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

/// Just enough of the v86 object for listener bookkeeping.
const FAKE_EMULATOR: &str = r#"
    const listeners = {};
    const dispatch = (name, value) => {
        for (const l of (listeners[name] || []).slice()) l.fn.call(l.this_value, value);
    };
    return {
        bus: { listeners, send: dispatch },
        add_listener(name, fn) {
            (listeners[name] = listeners[name] || []).push({ fn, this_value: undefined });
        },
        remove_listener(name, fn) {
            listeners[name] = (listeners[name] || []).filter((l) => l.fn !== fn);
        },
        keyboard_send_text(text) {},
        emit(name, bytes) { for (const b of bytes) dispatch(name, b); },
        count(name) { return (listeners[name] || []).length; },
    };
"#;

struct FakeEmulator(JsValue);

impl FakeEmulator {
    fn new() -> Self {
        let make = Function::new_no_args(FAKE_EMULATOR);
        FakeEmulator(make.call0(&JsValue::NULL).unwrap())
    }

    fn v86(&self) -> V86 {
        self.0.clone().unchecked_into()
    }

    fn method(&self, name: &str) -> Function {
        Reflect::get(&self.0, &name.into()).unwrap().unchecked_into()
    }

    fn emit(&self, event: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let bytes = js_sys::Uint8Array::from(bytes);
        self.method("emit").call2(&self.0, &event.into(), &bytes)
    }

    fn count(&self, event: &str) -> u32 {
        let n = self.method("count").call1(&self.0, &event.into()).unwrap();
        n.as_f64().unwrap() as u32
    }
}

#[wasm_bindgen_test(async)]
async fn timeout_fires_before_longer_sleep() {
    let platform = WebPlatform;
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();

    platform.set_timeout(Duration::from_millis(5), Box::new(move || flag.set(true)));
    assert!(!fired.get());

    platform.sleep(Duration::from_millis(50)).await;
    assert!(fired.get());
}

#[wasm_bindgen_test(async)]
async fn fetch_missing_url_is_an_error() {
    let err = WebPlatform
        .fetch("/definitely-not-here.bin")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("/definitely-not-here.bin"));
}

#[wasm_bindgen_test]
fn cli_without_emulator_is_inert() {
    let cli = Cli::new(Some(String::from(r#"{"log_level": "warn"}"#))).unwrap();
    assert!(!cli.is_ready());

    cli.exec("ls", None, None).unwrap();
    let listing = cli.ls("/root").unwrap();
    assert_eq!(js_sys::Array::from(&listing).length(), 0);
}

#[wasm_bindgen_test]
fn cli_rejects_unknown_mode() {
    let cli = Cli::new(None).unwrap();
    assert!(cli.exec("ls", Some(String::from("serial")), None).is_err());
}

#[wasm_bindgen_test]
fn dropped_machine_leaves_no_listeners_behind() {
    let fake = FakeEmulator::new();
    let seen = Rc::new(Cell::new(0u32));

    let machine = V86Machine::new(fake.v86());
    let counter = seen.clone();
    machine.add_listener(
        "serial1-output-byte",
        Rc::new(move |_: u8| counter.set(counter.get() + 1)),
    );
    let counter = seen.clone();
    let shown: OutputListener = Rc::new(move |_| counter.set(counter.get() + 1));
    machine.set_bus_listeners("serial0-output-byte", &[shown]);
    fake.emit("serial0-output-byte", b"a").unwrap();
    assert_eq!(seen.get(), 1);

    drop(machine);

    assert_eq!(fake.count("serial1-output-byte"), 0);
    assert_eq!(fake.count("serial0-output-byte"), 0);
    fake.emit("serial1-output-byte", b"late").unwrap();
    fake.emit("serial0-output-byte", b"late").unwrap();
    assert_eq!(seen.get(), 1);
}

#[wasm_bindgen_test]
fn drop_keeps_listeners_the_page_added() {
    let fake = FakeEmulator::new();
    let page_listener = Function::new_no_args("");
    fake.method("add_listener")
        .call2(&fake.0, &"serial0-output-byte".into(), &page_listener)
        .unwrap();

    let machine = V86Machine::new(fake.v86());
    machine.add_listener("serial0-output-byte", Rc::new(|_: u8| {}));
    assert_eq!(fake.count("serial0-output-byte"), 2);

    drop(machine);
    assert_eq!(fake.count("serial0-output-byte"), 1);
}

#[wasm_bindgen_test]
fn detach_from_completion_callback_is_safe() {
    let fake = FakeEmulator::new();
    let session = Rc::new(Session::new(CliConfig::default(), Rc::new(WebPlatform)));
    session.attach(Rc::new(V86Machine::new(fake.v86())));

    let results = Rc::new(RefCell::new(Vec::new()));
    let options = {
        let session = session.clone();
        let results = results.clone();
        ExecOptions::default().on_complete(move |r| {
            results.borrow_mut().push(r);
            // Drops the last handle on the machine while its listener runs.
            session.detach();
        })
    };
    session.execute("echo hi", options);

    fake.emit("serial1-output-byte", b"hi\n__sandbox__0\n").unwrap();
    assert_eq!(*results.borrow(), vec![Ok(String::from("hi\n"))]);
    assert!(!session.is_ready());

    fake.emit("serial1-output-byte", b"__sandbox__0\n").unwrap();
    assert_eq!(fake.count("serial1-output-byte"), 0);
}

#[wasm_bindgen_test]
fn throwing_output_listener_does_not_stop_the_next() {
    let fake = FakeEmulator::new();
    let cli = Cli::new(None).unwrap();
    let seen = Rc::new(Cell::new(0u32));

    cli.register_output_listener(Function::new_no_args("throw new Error('renderer gone')"));
    let counter = seen.clone();
    let counting = wasm_bindgen::closure::Closure::wrap(Box::new(move |_byte: JsValue| {
        counter.set(counter.get() + 1);
    }) as Box<dyn FnMut(JsValue)>);
    cli.register_output_listener(counting.as_ref().unchecked_ref::<Function>().clone());
    cli.attach(fake.v86());

    fake.emit("serial0-output-byte", b"ok").unwrap();
    assert_eq!(seen.get(), 2);

    cli.detach();
}
