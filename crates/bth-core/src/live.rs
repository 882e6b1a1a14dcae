//! Live objects: the opaque capability boundary of the object under test
//!
//! The harness assumes nothing about an object under test beyond property
//! get/set, method invocation and DOM-style event listeners.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::exception::{ErrorRecord, Exception};
use crate::value::{ObjectRef, Value};

/// Event callback; receives the event object.
pub type Listener = Rc<dyn Fn(&Value)>;

/// Identifies one listener registration on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The capability surface of an object under test.
pub trait LiveObject {
    /// Interface name, e.g. `BluetoothAdapter`.
    fn class_name(&self) -> &str;

    /// Every attribute and method name, in declaration order.
    fn attribute_names(&self) -> Vec<String>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute_names().iter().any(|n| n == name)
    }

    /// Read an attribute; methods read as bound functions.
    fn get(&self, name: &str) -> Value;

    fn set(&self, name: &str, value: Value) -> Result<(), Exception>;

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, Exception>;

    /// Delete an attribute. Most objects refuse.
    fn remove(&self, _name: &str) -> bool {
        false
    }

    fn add_event_listener(&self, event: &str, listener: Listener) -> ListenerId;

    fn remove_event_listener(&self, event: &str, id: ListenerId);

    fn as_any(&self) -> &dyn Any;
}

// ─────────────────────────────────────────────────────────────────
// Event dispatch
// ─────────────────────────────────────────────────────────────────

/// Listener bookkeeping shared by the live objects in this crate.
#[derive(Default)]
pub struct EventTarget {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(String, ListenerId, Listener)>>,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .push((event.to_string(), id, listener));
        id
    }

    pub fn remove(&self, event: &str, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(name, lid, _)| !(name == event && *lid == id));
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(name, _, _)| name == event)
            .count()
    }

    /// Deliver `payload` to every listener of `event`. Listeners removed
    /// while dispatching are skipped.
    pub fn dispatch(&self, event: &str, payload: &Value) {
        let snapshot: Vec<(ListenerId, Listener)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _, _)| name == event)
            .map(|(_, id, listener)| (*id, listener.clone()))
            .collect();

        for (id, listener) in snapshot {
            let still_registered = self
                .listeners
                .borrow()
                .iter()
                .any(|(name, lid, _)| name == event && *lid == id);
            if still_registered {
                listener(payload);
            }
        }
    }
}

/// Scoped listener registration; the listener is removed on drop.
pub struct ListenerGuard {
    target: ObjectRef,
    event: String,
    id: ListenerId,
}

impl ListenerGuard {
    pub fn new(target: &ObjectRef, event: &str, listener: Listener) -> Self {
        let id = target.add_event_listener(event, listener);
        Self {
            target: target.clone(),
            event: event.to_string(),
            id,
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.target.remove_event_listener(&self.event, self.id);
    }
}

// ─────────────────────────────────────────────────────────────────
// DynamicObject
// ─────────────────────────────────────────────────────────────────

/// Native method body; receives the object it is called on.
pub type Method = Rc<dyn Fn(&DynamicObject, &[Value]) -> Result<Value, Exception>>;

struct AttributeSlot {
    value: Value,
    writable: bool,
}

/// A generic live object assembled from attributes and native methods.
pub struct DynamicObject {
    class_name: String,
    attributes: RefCell<IndexMap<String, AttributeSlot>>,
    methods: IndexMap<String, (Method, Value)>,
    events: EventTarget,
}

/// Builder for [`DynamicObject`].
pub struct DynamicObjectBuilder {
    class_name: String,
    attributes: IndexMap<String, AttributeSlot>,
    methods: IndexMap<String, Method>,
}

impl DynamicObjectBuilder {
    /// Read-only attribute.
    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(
            name.to_string(),
            AttributeSlot {
                value: value.into(),
                writable: false,
            },
        );
        self
    }

    pub fn writable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(
            name.to_string(),
            AttributeSlot {
                value: value.into(),
                writable: true,
            },
        );
        self
    }

    pub fn method(
        mut self,
        name: &str,
        body: impl Fn(&DynamicObject, &[Value]) -> Result<Value, Exception> + 'static,
    ) -> Self {
        self.methods.insert(name.to_string(), Rc::new(body));
        self
    }

    pub fn build(self) -> Rc<DynamicObject> {
        Rc::new_cyclic(|weak: &Weak<DynamicObject>| {
            let methods = self
                .methods
                .into_iter()
                .map(|(name, body)| {
                    let bound = bind_method(weak.clone(), &name, body.clone());
                    (name, (body, bound))
                })
                .collect();
            DynamicObject {
                class_name: self.class_name,
                attributes: RefCell::new(self.attributes),
                methods,
                events: EventTarget::new(),
            }
        })
    }
}

fn bind_method(this: Weak<DynamicObject>, name: &str, body: Method) -> Value {
    let method_name = name.to_string();
    Value::function(name, move |args| match this.upgrade() {
        Some(object) => body(&object, args),
        None => Err(Exception::type_error(format!(
            "{} called on a released object",
            method_name
        ))),
    })
}

impl DynamicObject {
    pub fn builder(class_name: impl Into<String>) -> DynamicObjectBuilder {
        DynamicObjectBuilder {
            class_name: class_name.into(),
            attributes: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Current attribute value, bypassing writability.
    pub fn value(&self, name: &str) -> Value {
        self.attributes
            .borrow()
            .get(name)
            .map(|slot| slot.value.clone())
            .unwrap_or_default()
    }

    /// Change an attribute from the object's own side (no writability check).
    pub fn update(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut attributes = self.attributes.borrow_mut();
        match attributes.get_mut(name) {
            Some(slot) => slot.value = value,
            None => {
                attributes.insert(
                    name.to_string(),
                    AttributeSlot {
                        value,
                        writable: false,
                    },
                );
            }
        }
    }

    /// Dispatch an event to the registered listeners.
    pub fn fire(&self, event: &str, payload: &Value) {
        self.events.dispatch(event, payload);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.listener_count(event)
    }
}

impl LiveObject for DynamicObject {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes
            .borrow()
            .keys()
            .chain(self.methods.keys())
            .cloned()
            .collect()
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes.borrow().contains_key(name) || self.methods.contains_key(name)
    }

    fn get(&self, name: &str) -> Value {
        if let Some((_, bound)) = self.methods.get(name) {
            return bound.clone();
        }
        self.value(name)
    }

    fn set(&self, name: &str, value: Value) -> Result<(), Exception> {
        let mut attributes = self.attributes.borrow_mut();
        match attributes.get_mut(name) {
            Some(slot) if slot.writable => {
                slot.value = value;
                Ok(())
            }
            Some(_) => Err(Exception::type_error(format!(
                "setting getter-only property \"{}\"",
                name
            ))),
            None => Err(Exception::type_error(format!(
                "{} has no attribute \"{}\"",
                self.class_name, name
            ))),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, Exception> {
        let body = self
            .methods
            .get(name)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| {
                Exception::type_error(format!("{}.{} is not a function", self.class_name, name))
            })?;
        body(self, args)
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
// ErrorObject
// ─────────────────────────────────────────────────────────────────

const ERROR_ATTRIBUTES: [&str; 6] = [
    "name",
    "message",
    "fileName",
    "lineNumber",
    "columnNumber",
    "stack",
];
const ERROR_METHODS: [&str; 2] = ["toSource", "toString"];

/// Live view of an [`ErrorRecord`]; read-only.
pub struct ErrorObject {
    record: ErrorRecord,
    events: EventTarget,
}

impl ErrorObject {
    pub fn new(record: ErrorRecord) -> Self {
        Self {
            record,
            events: EventTarget::new(),
        }
    }

    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }
}

impl LiveObject for ErrorObject {
    fn class_name(&self) -> &str {
        "Error"
    }

    fn attribute_names(&self) -> Vec<String> {
        ERROR_ATTRIBUTES
            .iter()
            .chain(ERROR_METHODS.iter())
            .map(|s| s.to_string())
            .collect()
    }

    fn get(&self, name: &str) -> Value {
        let plain = self.record.to_value();
        plain.get_attr(name).unwrap_or_default()
    }

    fn set(&self, name: &str, _value: Value) -> Result<(), Exception> {
        Err(Exception::type_error(format!(
            "setting getter-only property \"{}\"",
            name
        )))
    }

    fn call(&self, name: &str, _args: &[Value]) -> Result<Value, Exception> {
        match name {
            "toString" => Ok(Value::string(format!(
                "{}: {}",
                self.record.name, self.record.message
            ))),
            "toSource" => Ok(Value::string(format!(
                "(new {}(\"{}\", \"{}\", {}))",
                self.record.name,
                self.record.message,
                self.record.file_name.as_deref().unwrap_or_default(),
                self.record.line_number.unwrap_or_default()
            ))),
            other => Err(Exception::type_error(format!(
                "Error.{} is not a function",
                other
            ))),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Rc<DynamicObject> {
        DynamicObject::builder("Counter")
            .writable("count", 0)
            .attribute("label", "counter")
            .method("increment", |this, _args| {
                let next = this.value("count").as_number().unwrap_or(0.0) + 1.0;
                this.update("count", next);
                this.fire("changed", &Value::from(next));
                Ok(Value::from(next))
            })
            .method("fail", |_, _| Err(Exception::error("InvalidStateError", "nope")))
            .build()
    }

    #[test]
    fn test_dynamic_object_attributes() {
        let object = counter();
        assert_eq!(
            object.attribute_names(),
            vec!["count", "label", "increment", "fail"]
        );
        assert!(object.set("count", Value::from(5)).is_ok());
        assert_eq!(object.get("count"), Value::from(5));
        assert!(object.set("label", Value::from("x")).is_err());
        assert!(object.set("missing", Value::Null).is_err());
    }

    #[test]
    fn test_dynamic_object_methods() {
        let object = counter();
        assert_eq!(object.call("increment", &[]).unwrap(), Value::from(1));
        assert!(object.call("fail", &[]).is_err());
        assert!(object.call("nothing", &[]).is_err());

        let bound = object.get("increment");
        assert!(bound.same(&object.get("increment")));
        match bound {
            Value::Function(f) => assert_eq!(f.call(&[]).unwrap(), Value::from(2)),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_listener_guard_removes_on_drop() {
        let object = counter();
        let as_ref: ObjectRef = object.clone();
        let seen = Rc::new(Cell::new(0));
        let seen_in = seen.clone();
        let guard = ListenerGuard::new(
            &as_ref,
            "changed",
            Rc::new(move |_| seen_in.set(seen_in.get() + 1)),
        );
        object.call("increment", &[]).unwrap();
        assert_eq!(seen.get(), 1);
        drop(guard);
        assert_eq!(object.listener_count("changed"), 0);
        object.call("increment", &[]).unwrap();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let target = Rc::new(EventTarget::new());
        let hits = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(None));

        let t = target.clone();
        let s = second.clone();
        target.add(
            "e",
            Rc::new(move |_| {
                if let Some(id) = s.get() {
                    t.remove("e", id);
                }
            }),
        );
        let h = hits.clone();
        second.set(Some(target.add("e", Rc::new(move |_| h.set(h.get() + 1)))));

        target.dispatch("e", &Value::Undefined);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_error_object() {
        let object = ErrorObject::new(ErrorRecord::new("TypeError", "bad"));
        assert_eq!(object.get("message"), Value::from("bad"));
        assert_eq!(
            object.call("toString", &[]).unwrap(),
            Value::from("TypeError: bad")
        );
        assert!(object.set("message", Value::Null).is_err());
    }
}
