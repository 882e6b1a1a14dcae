//! Dynamic values flowing through the harness
//!
//! Everything a test task touches (attribute values, method arguments,
//! return values, event objects, Variable Tree nodes) is a [`Value`]. The
//! shape of a value is decided once, when it is constructed, and every
//! consumer dispatches on the variant.
//!
//! Containers (`List`, `Map`), functions and live objects are shared by
//! reference, so cloning a `Value` never copies the underlying node and
//! identity comparison ([`Value::same`]) is what the Variable Tree relies on
//! for stale-pointer detection.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::exception::Exception;
use crate::live::LiveObject;

/// Shared, mutable sequence.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable, insertion-ordered attribute map.
pub type MapRef = Rc<RefCell<IndexMap<String, Value>>>;

/// Shared handle to a live object under test.
pub type ObjectRef = Rc<dyn LiveObject>;

/// Shared handle to a native function.
pub type FunctionRef = Rc<NativeFunction>;

type NativeBody = dyn Fn(&[Value]) -> Result<Value, Exception>;

/// A callable value.
pub struct NativeFunction {
    name: String,
    body: Box<NativeBody>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&[Value]) -> Result<Value, Exception> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, Exception> {
        (self.body)(args)
    }
}

/// A dynamically shaped value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    List(ListRef),
    Map(MapRef),
    Function(FunctionRef),
    Object(ObjectRef),
}

impl Value {
    // ─────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// A fresh, empty map.
    pub fn map() -> Self {
        Value::Map(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn map_of<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Map(Rc::new(RefCell::new(map)))
    }

    pub fn function(
        name: impl Into<String>,
        body: impl Fn(&[Value]) -> Result<Value, Exception> + 'static,
    ) -> Self {
        Value::Function(Rc::new(NativeFunction::new(name, body)))
    }

    pub fn object(object: impl LiveObject + 'static) -> Self {
        Value::Object(Rc::new(object))
    }

    // ─────────────────────────────────────────────────────────
    // Classification
    // ─────────────────────────────────────────────────────────

    /// Type name used for classification and display.
    pub fn type_string(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "sequence",
            Value::Map(_) | Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Whether attributes can be navigated into.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::Object(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Downcast a live object value to its concrete type.
    pub fn downcast_object<T: 'static>(&self) -> Option<&T> {
        self.as_object()
            .and_then(|object| object.as_any().downcast_ref::<T>())
    }

    /// Strict identity: primitives compare by value (`NaN` never equals
    /// itself), everything else by reference.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => {
                Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
            }
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────
    // Attribute access
    // ─────────────────────────────────────────────────────────

    pub fn has_attr(&self, name: &str) -> bool {
        match self {
            Value::List(items) => {
                name == "length" || parse_index(name).is_some_and(|i| i < items.borrow().len())
            }
            Value::Map(map) => map.borrow().contains_key(name),
            Value::Object(object) => object.has_attribute(name),
            _ => false,
        }
    }

    /// Read an attribute, `None` when it does not exist.
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Value::List(items) => {
                let items = items.borrow();
                if name == "length" {
                    return Some(Value::Number(items.len() as f64));
                }
                parse_index(name).and_then(|i| items.get(i).cloned())
            }
            Value::Map(map) => map.borrow().get(name).cloned(),
            Value::Object(object) if object.has_attribute(name) => Some(object.get(name)),
            _ => None,
        }
    }

    /// Assign an attribute. Maps accept any name, lists accept indices
    /// (growing with `undefined` holes) and `length`, live objects decide
    /// for themselves.
    pub fn set_attr(&self, name: &str, value: Value) -> Result<(), Exception> {
        match self {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                if name == "length" {
                    let len = value
                        .as_number()
                        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_LIST_LENGTH as f64)
                        .ok_or_else(|| Exception::range_error("Invalid array length"))?;
                    grow_list(&mut items, len as usize)?;
                    items.truncate(len as usize);
                    return Ok(());
                }
                let index = parse_index(name).ok_or_else(|| {
                    Exception::type_error(format!("\"{}\" is not a sequence index", name))
                })?;
                if index >= MAX_LIST_LENGTH {
                    return Err(Exception::range_error("Invalid array length"));
                }
                grow_list(&mut items, index + 1)?;
                items[index] = value;
                Ok(())
            }
            Value::Map(map) => {
                map.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Object(object) => object.set(name, value),
            other => Err(Exception::type_error(format!(
                "cannot assign attribute \"{}\" on {}",
                name,
                other.type_string()
            ))),
        }
    }

    /// Delete an attribute. Returns false when nothing was removed.
    pub fn remove_attr(&self, name: &str) -> bool {
        match self {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                match parse_index(name) {
                    Some(i) if i < items.len() => {
                        items.remove(i);
                        true
                    }
                    _ => false,
                }
            }
            Value::Map(map) => map.borrow_mut().shift_remove(name).is_some(),
            Value::Object(object) => object.remove(name),
            _ => false,
        }
    }

    /// Navigable attribute names, in order.
    pub fn attr_names(&self) -> Vec<String> {
        match self {
            Value::List(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            Value::Map(map) => map.borrow().keys().cloned().collect(),
            Value::Object(object) => object.attribute_names(),
            _ => Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Invocation
    // ─────────────────────────────────────────────────────────

    /// Call this value as a function.
    pub fn call(&self, args: &[Value]) -> Result<Value, Exception> {
        match self {
            Value::Function(function) => function.call(args),
            other => Err(Exception::type_error(format!(
                "{} is not a function",
                other.to_simple_string()
            ))),
        }
    }

    /// Invoke method `name`: a live-object method, or a function stored
    /// under `name` in a map.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, Exception> {
        match self {
            Value::Object(object) => object.call(name, args),
            other => match other.get_attr(name) {
                Some(function @ Value::Function(_)) => function.call(args),
                _ => Err(Exception::type_error(format!("{} is not a function", name))),
            },
        }
    }

    // ─────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────

    /// Full rendering; strings are quoted and never shortened.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),
            other => other.render_non_string(),
        }
    }

    /// Short rendering for list rows: strings longer than 10 characters
    /// keep their first 7 characters followed by `...`.
    pub fn to_simple_string(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", shorten(s, 10)),
            other => other.render_non_string(),
        }
    }

    fn render_non_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Function(_) => "function() { ... }".to_string(),
            Value::List(_) => "[...]".to_string(),
            Value::Map(_) | Value::Object(_) => "{...}".to_string(),
            Value::String(s) => s.to_string(),
        }
    }

    // ─────────────────────────────────────────────────────────
    // JSON bridging
    // ─────────────────────────────────────────────────────────

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Value::map_of(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))))
            }
        }
    }

    /// JSON rendering, containers nested deeper than `depth` collapse to
    /// their simple form so cyclic structures terminate.
    pub fn to_json(&self, depth: usize) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(format_number(*n))),
            Value::String(s) => Json::String(s.to_string()),
            Value::List(_) | Value::Map(_) if depth == 0 => Json::String(self.to_simple_string()),
            Value::List(items) => Json::Array(
                items
                    .borrow()
                    .iter()
                    .map(|item| item.to_json(depth - 1))
                    .collect(),
            ),
            Value::Map(map) => Json::Object(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json(depth - 1)))
                    .collect(),
            ),
            Value::Function(_) => Json::String(self.to_simple_string()),
            Value::Object(object) => Json::String(format!("[object {}]", object.class_name())),
        }
    }
}

/// Shorten to `max` characters: longer strings keep `max - 3` characters
/// followed by `...`.
pub fn shorten(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

/// Largest list length a write may produce (2^32 - 1).
pub const MAX_LIST_LENGTH: usize = u32::MAX as usize;

/// Pad `items` with `undefined` up to `len`; never shrinks.
fn grow_list(items: &mut Vec<Value>, len: usize) -> Result<(), Exception> {
    if len <= items.len() {
        return Ok(());
    }
    items
        .try_reserve_exact(len - items.len())
        .map_err(|_| Exception::range_error("Invalid array length"))?;
    items.resize(len, Value::Undefined);
    Ok(())
}

fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse().ok()
}

/// Number rendering matching the way the harness has always shown numbers:
/// integral values without a fraction, `NaN`, `Infinity`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(object) => write!(f, "Object({})", object.class_name()),
            other => write!(f, "{}({})", other.type_string(), other.to_display_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_string() {
        assert_eq!(Value::Undefined.type_string(), "undefined");
        assert_eq!(Value::Null.type_string(), "null");
        assert_eq!(Value::from(true).type_string(), "boolean");
        assert_eq!(Value::from(1).type_string(), "number");
        assert_eq!(Value::from("x").type_string(), "string");
        assert_eq!(Value::list(vec![]).type_string(), "sequence");
        assert_eq!(Value::map().type_string(), "object");
        assert_eq!(
            Value::function("f", |_| Ok(Value::Undefined)).type_string(),
            "function"
        );
    }

    #[test]
    fn test_same_is_identity_for_containers() {
        let a = Value::map();
        let b = Value::map();
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert!(Value::from("hi").same(&Value::from("hi")));
        assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
        assert!(!Value::Null.same(&Value::Undefined));
    }

    #[test]
    fn test_simple_string_shortens_long_strings() {
        assert_eq!(Value::from("short").to_simple_string(), "\"short\"");
        assert_eq!(
            Value::from("0123456789abc").to_simple_string(),
            "\"0123456...\""
        );
        assert_eq!(
            Value::from("0123456789abc").to_display_string(),
            "\"0123456789abc\""
        );
        assert_eq!(Value::list(vec![]).to_simple_string(), "[...]");
        assert_eq!(Value::map().to_simple_string(), "{...}");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(-0.0), "0");
    }

    #[test]
    fn test_list_attributes() {
        let list = Value::list(vec![Value::from(1), Value::from(2)]);
        assert!(list.has_attr("length"));
        assert!(list.has_attr("1"));
        assert!(!list.has_attr("2"));
        assert!(!list.has_attr("01"));
        assert_eq!(list.get_attr("length"), Some(Value::Number(2.0)));

        list.set_attr("3", Value::from(4)).unwrap();
        assert_eq!(list.get_attr("length"), Some(Value::Number(4.0)));
        assert!(list.get_attr("2").unwrap().is_undefined());

        assert!(list.set_attr("name", Value::Null).is_err());
        assert!(list.remove_attr("0"));
        assert_eq!(list.get_attr("0"), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_list_writes_stop_at_array_limit() {
        let list = Value::list(vec![Value::from(1)]);
        for index in ["18446744073709551615", "4294967296", "4294967295"] {
            let err = list.set_attr(index, Value::from(2)).unwrap_err();
            assert_eq!(err.record().unwrap().name, "RangeError");
        }
        for len in [1e300, 4294967296.0, -1.0, 1.5] {
            let err = list.set_attr("length", Value::Number(len)).unwrap_err();
            assert_eq!(err.record().unwrap().message, "Invalid array length");
        }
        assert_eq!(list.get_attr("length"), Some(Value::Number(1.0)));

        list.set_attr("length", Value::from(3)).unwrap();
        assert!(list.get_attr("2").unwrap().is_undefined());
        list.set_attr("length", Value::from(0)).unwrap();
        assert!(list.attr_names().is_empty());
    }

    #[test]
    fn test_map_attributes_keep_order() {
        let map = Value::map();
        map.set_attr("b", Value::from(1)).unwrap();
        map.set_attr("a", Value::from(2)).unwrap();
        assert_eq!(map.attr_names(), vec!["b".to_string(), "a".to_string()]);
        assert!(map.remove_attr("b"));
        assert!(!map.remove_attr("b"));
        assert_eq!(map.attr_names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_primitive_attributes_rejected() {
        assert!(Value::from(1).set_attr("x", Value::Null).is_err());
        assert!(!Value::from("s").has_attr("length"));
        assert!(Value::Null.get_attr("x").is_none());
    }

    #[test]
    fn test_call_method_on_map_function() {
        let object = Value::map_of([(
            "double",
            Value::function("double", |args| {
                Ok(Value::from(args[0].as_number().unwrap_or(0.0) * 2.0))
            }),
        )]);
        let result = object.call_method("double", &[Value::from(4)]).unwrap();
        assert_eq!(result.as_number(), Some(8.0));
        assert!(object.call_method("missing", &[]).is_err());
        assert!(Value::from(1).call(&[]).is_err());
    }

    #[test]
    fn test_json_bridge() {
        let json = serde_json::json!({"a": [1, "two", null], "b": {"c": true}});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(8), json);
    }

    #[test]
    fn test_json_depth_limits_cycles() {
        let map = Value::map();
        map.set_attr("self", map.clone()).unwrap();
        let json = map.to_json(2);
        assert_eq!(json["self"]["self"], serde_json::json!("{...}"));
    }
}
