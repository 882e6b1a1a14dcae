//! Asynchronous results returned by live objects
//!
//! The harness never awaits these. It registers callbacks and returns; the
//! owner of the promise settles it later from the event loop.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use crate::exception::Exception;
use crate::live::{EventTarget, Listener, ListenerId, LiveObject};
use crate::value::Value;

// ─────────────────────────────────────────────────────────────────
// Promise
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

impl PromiseState {
    pub fn as_str(self) -> &'static str {
        match self {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled => "fulfilled",
            PromiseState::Rejected => "rejected",
        }
    }
}

type Reaction = (Box<dyn FnOnce(&Value)>, Box<dyn FnOnce(&Value)>);

/// A one-shot asynchronous result.
///
/// As a live object it exposes a `state` attribute and fires `resolved` or
/// `rejected` with the outcome as the event object.
pub struct Promise {
    state: Cell<PromiseState>,
    outcome: RefCell<Value>,
    reactions: RefCell<Vec<Reaction>>,
    events: EventTarget,
}

impl Promise {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: Cell::new(PromiseState::Pending),
            outcome: RefCell::new(Value::Undefined),
            reactions: RefCell::new(Vec::new()),
            events: EventTarget::new(),
        })
    }

    pub fn state(&self) -> PromiseState {
        self.state.get()
    }

    /// Fulfillment value or rejection reason; `undefined` while pending.
    pub fn outcome(&self) -> Value {
        self.outcome.borrow().clone()
    }

    /// Returns false if the promise had already settled.
    pub fn resolve(&self, value: Value) -> bool {
        self.settle(PromiseState::Fulfilled, value)
    }

    pub fn reject(&self, reason: Value) -> bool {
        self.settle(PromiseState::Rejected, reason)
    }

    /// Register settlement callbacks. On an already settled promise the
    /// matching callback runs immediately.
    pub fn then(
        &self,
        on_fulfilled: impl FnOnce(&Value) + 'static,
        on_rejected: impl FnOnce(&Value) + 'static,
    ) {
        match self.state.get() {
            PromiseState::Pending => self
                .reactions
                .borrow_mut()
                .push((Box::new(on_fulfilled), Box::new(on_rejected))),
            PromiseState::Fulfilled => on_fulfilled(&self.outcome()),
            PromiseState::Rejected => on_rejected(&self.outcome()),
        }
    }

    fn settle(&self, state: PromiseState, value: Value) -> bool {
        if self.state.get() != PromiseState::Pending {
            return false;
        }
        self.state.set(state);
        *self.outcome.borrow_mut() = value.clone();

        let reactions = std::mem::take(&mut *self.reactions.borrow_mut());
        for (on_fulfilled, on_rejected) in reactions {
            match state {
                PromiseState::Fulfilled => on_fulfilled(&value),
                _ => on_rejected(&value),
            }
        }

        let event = match state {
            PromiseState::Fulfilled => "resolved",
            _ => "rejected",
        };
        self.events.dispatch(event, &value);
        true
    }
}

impl LiveObject for Promise {
    fn class_name(&self) -> &str {
        "Promise"
    }

    fn attribute_names(&self) -> Vec<String> {
        vec!["state".to_string()]
    }

    fn get(&self, name: &str) -> Value {
        match name {
            "state" => Value::from(self.state().as_str()),
            _ => Value::Undefined,
        }
    }

    fn set(&self, name: &str, _value: Value) -> Result<(), Exception> {
        Err(Exception::type_error(format!(
            "setting getter-only property \"{}\"",
            name
        )))
    }

    fn call(&self, name: &str, _args: &[Value]) -> Result<Value, Exception> {
        Err(Exception::type_error(format!(
            "Promise.{} is not callable from the harness",
            name
        )))
    }

    fn add_event_listener(&self, event: &str, listener: Listener) -> ListenerId {
        self.events.add(event, listener)
    }

    fn remove_event_listener(&self, event: &str, id: ListenerId) {
        self.events.remove(event, id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// AsyncRequest
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Pending,
    Done,
}

impl ReadyState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadyState::Pending => "pending",
            ReadyState::Done => "done",
        }
    }
}

const REQUEST_ATTRIBUTES: [&str; 3] = ["readyState", "result", "error"];

/// Request handle with `readyState`, `result` and `error` attributes and
/// `success` / `error` events.
pub struct AsyncRequest {
    ready_state: Cell<ReadyState>,
    result: RefCell<Value>,
    error: RefCell<Value>,
    events: EventTarget,
}

impl AsyncRequest {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            ready_state: Cell::new(ReadyState::Pending),
            result: RefCell::new(Value::Undefined),
            error: RefCell::new(Value::Null),
            events: EventTarget::new(),
        })
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state.get()
    }

    pub fn fire_success(&self, result: Value) -> bool {
        if self.ready_state.get() == ReadyState::Done {
            return false;
        }
        *self.result.borrow_mut() = result.clone();
        self.ready_state.set(ReadyState::Done);
        self.events.dispatch("success", &result);
        true
    }

    pub fn fire_error(&self, error: Value) -> bool {
        if self.ready_state.get() == ReadyState::Done {
            return false;
        }
        *self.error.borrow_mut() = error.clone();
        self.ready_state.set(ReadyState::Done);
        self.events.dispatch("error", &error);
        true
    }
}

impl LiveObject for AsyncRequest {
    fn class_name(&self) -> &str {
        "DOMRequest"
    }

    fn attribute_names(&self) -> Vec<String> {
        REQUEST_ATTRIBUTES.iter().map(|s| s.to_string()).collect()
    }

    fn get(&self, name: &str) -> Value {
        match name {
            "readyState" => Value::from(self.ready_state().as_str()),
            "result" => self.result.borrow().clone(),
            "error" => self.error.borrow().clone(),
            _ => Value::Undefined,
        }
    }

    fn set(&self, name: &str, _value: Value) -> Result<(), Exception> {
        Err(Exception::type_error(format!(
            "setting getter-only property \"{}\"",
            name
        )))
    }

    fn call(&self, name: &str, _args: &[Value]) -> Result<Value, Exception> {
        Err(Exception::type_error(format!(
            "DOMRequest.{} is not a function",
            name
        )))
    }

    fn add_event_listener(&self, event: &str, listener: Listener) -> ListenerId {
        self.events.add(event, listener)
    }

    fn remove_event_listener(&self, event: &str, id: ListenerId) {
        self.events.remove(event, id)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
