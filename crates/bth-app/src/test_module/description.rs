//! Description maintainers
//!
//! A maintainer keeps the one-line description of a value current. It calls
//! its setter at least once while being constructed and stops calling it
//! once disposed.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use bth_core::{ListenerGuard, Promise, PromiseState, Value};

use crate::test_task::{ElementId, ModelCore};

/// Receives new descriptions.
pub type DescriptionSetter = Rc<dyn Fn(String)>;

pub trait DescriptionMaintainer {
    /// Stop updating. Called once, before the element goes away.
    fn dispose(&mut self) {}
}

/// Setter writing into element `id` of `core`; silent once the model is gone.
pub fn description_setter(core: &Rc<ModelCore>, id: ElementId) -> DescriptionSetter {
    let core: Weak<ModelCore> = Rc::downgrade(core);
    Rc::new(move |description| {
        if let Some(core) = core.upgrade() {
            core.set_description(id, description);
        }
    })
}

/// Sets the description once.
pub struct ConstantDescription;

impl ConstantDescription {
    pub fn new(description: String, setter: DescriptionSetter) -> Box<dyn DescriptionMaintainer> {
        setter(description);
        Box::new(ConstantDescription)
    }
}

impl DescriptionMaintainer for ConstantDescription {}

/// Recomputes the description whenever the value fires one of `events`.
pub struct EventDescription {
    guards: Vec<ListenerGuard>,
}

impl EventDescription {
    /// Values that are not live objects get a single, constant description.
    pub fn new(
        value: &Value,
        events: &[&str],
        render: impl Fn(&Value) -> String + 'static,
        setter: DescriptionSetter,
    ) -> Box<dyn DescriptionMaintainer> {
        let render = Rc::new(render);
        setter(render(value));

        let Some(object) = value.as_object() else {
            return Box::new(Self { guards: Vec::new() });
        };
        let guards = events
            .iter()
            .map(|event| {
                let target = value.clone();
                let render = Rc::clone(&render);
                let setter = Rc::clone(&setter);
                ListenerGuard::new(
                    object,
                    event,
                    Rc::new(move |_event_object: &Value| setter(render(&target))),
                )
            })
            .collect();
        Box::new(Self { guards })
    }
}

impl DescriptionMaintainer for EventDescription {
    fn dispose(&mut self) {
        self.guards.clear();
    }
}

/// `state=<state>` of a promise, updated when it settles.
pub struct PromiseDescription {
    alive: Rc<Cell<bool>>,
}

impl PromiseDescription {
    pub fn new(value: &Value, setter: DescriptionSetter) -> Box<dyn DescriptionMaintainer> {
        let alive = Rc::new(Cell::new(true));
        let Some(promise) = value.downcast_object::<Promise>() else {
            setter(format!("state={}", PromiseState::Pending.as_str()));
            return Box::new(Self { alive });
        };

        setter(format!("state={}", PromiseState::Pending.as_str()));
        let (fulfilled_alive, rejected_alive) = (alive.clone(), alive.clone());
        let (on_fulfilled, on_rejected) = (setter.clone(), setter);
        promise.then(
            move |_| {
                if fulfilled_alive.get() {
                    on_fulfilled(format!("state={}", PromiseState::Fulfilled.as_str()));
                }
            },
            move |_| {
                if rejected_alive.get() {
                    on_rejected(format!("state={}", PromiseState::Rejected.as_str()));
                }
            },
        );
        Box::new(Self { alive })
    }
}

impl DescriptionMaintainer for PromiseDescription {
    fn dispose(&mut self) {
        self.alive.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use bth_core::DynamicObject;

    fn recorder() -> (DescriptionSetter, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        (Rc::new(move |d: String| sink.borrow_mut().push(d)), seen)
    }

    #[test]
    fn test_constant_description_sets_once() {
        let (setter, seen) = recorder();
        let _m = ConstantDescription::new("42".into(), setter);
        assert_eq!(*seen.borrow(), vec!["42"]);
    }

    #[test]
    fn test_event_description_follows_events_until_disposed() {
        let object = DynamicObject::builder("Counter").attribute("n", 1).build();
        let value = Value::Object(object.clone());
        let (setter, seen) = recorder();
        let mut maintainer = EventDescription::new(
            &value,
            &["changed"],
            |v| format!("n={}", v.get_attr("n").unwrap_or_default()),
            setter,
        );

        object.update("n", 2);
        object.fire("changed", &Value::Undefined);
        assert_eq!(*seen.borrow(), vec!["n=1", "n=2"]);

        maintainer.dispose();
        assert_eq!(object.listener_count("changed"), 0);
        object.fire("changed", &Value::Undefined);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_promise_description_tracks_settlement() {
        let promise = Promise::new();
        let value = Value::Object(promise.clone());
        let (setter, seen) = recorder();
        let _m = PromiseDescription::new(&value, setter);
        assert_eq!(*seen.borrow(), vec!["state=pending"]);
        promise.resolve(Value::from(1));
        assert_eq!(*seen.borrow(), vec!["state=pending", "state=fulfilled"]);
    }

    #[test]
    fn test_promise_description_silent_after_dispose() {
        let promise = Promise::new();
        let value = Value::Object(promise.clone());
        let (setter, seen) = recorder();
        let mut maintainer = PromiseDescription::new(&value, setter);
        maintainer.dispose();
        promise.reject(Value::from("no"));
        assert_eq!(*seen.borrow(), vec!["state=pending"]);
    }

    #[test]
    fn test_settled_promise_described_immediately() {
        let promise = Promise::new();
        promise.reject(Value::Null);
        let (setter, seen) = recorder();
        let _m = PromiseDescription::new(&Value::Object(promise), setter);
        assert_eq!(*seen.borrow(), vec!["state=pending", "state=rejected"]);
    }
}
