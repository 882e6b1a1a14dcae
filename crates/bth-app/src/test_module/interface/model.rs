//! Model of an interface test task
//!
//! One row per attribute, method and event of every facet, in spec order,
//! followed by a `refresh` row. Attribute values are read on refresh only.
//! Method return values and event objects are inserted as removable rows
//! right below the row that produced them, newest first.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bth_core::{ListRef, Value};
use indexmap::IndexMap;

use super::spec::{ArgSpec, AttributeSpec, InterfaceSpec, MemberSpec};
use crate::test_module::{
    description_setter, get_valid_test_module, ConstantDescription, DescriptionMaintainer,
    TestModuleRef,
};
use crate::test_task::{Element, ElementId, ElementKind, ModelCore, ModelEvent, TestModel};

enum Slot {
    Attribute {
        facet: usize,
        name: String,
        cached: Option<Value>,
        maintainer: Box<dyn DescriptionMaintainer>,
    },
    Method {
        facet: usize,
        name: String,
        args: ListRef,
        args_spec: Vec<ArgSpec>,
        counter: u64,
        children: usize,
    },
    Event {
        facet: usize,
        name: String,
        counter: u64,
        children: usize,
    },
    Removable {
        owner: ElementId,
        maintainer: Box<dyn DescriptionMaintainer>,
    },
    Refresh,
}

/// What a row stands for, detached from the model's internal state.
#[derive(Clone)]
pub enum Row {
    Attribute {
        facet: usize,
        name: String,
        cached: Value,
    },
    Method {
        facet: usize,
        name: String,
        args: ListRef,
        args_spec: Vec<ArgSpec>,
    },
    Event {
        facet: usize,
        name: String,
    },
    Removable {
        owner: ElementId,
    },
    Refresh,
}

fn arguments_description(args: &[Value]) -> String {
    let rendered: Vec<String> = args.iter().map(Value::to_simple_string).collect();
    format!("args: [{}]", rendered.join(", "))
}

pub struct InterfaceModel {
    core: Rc<ModelCore>,
    specs: Rc<Vec<InterfaceSpec>>,
    facets: Vec<Value>,
    slots: RefCell<HashMap<ElementId, Slot>>,
    members: Vec<IndexMap<String, ElementId>>,
    refresh_id: ElementId,
}

impl InterfaceModel {
    pub(crate) fn new(specs: Rc<Vec<InterfaceSpec>>, facets: Vec<Value>) -> Rc<Self> {
        let core = Rc::new(ModelCore::new());
        let mut slots = HashMap::new();
        let mut members = Vec::with_capacity(specs.len());

        for (facet, spec) in specs.iter().enumerate() {
            let mut ids = IndexMap::new();
            for (name, member) in spec.members() {
                let (element, slot) = match member {
                    MemberSpec::Attribute(spec) => attribute_row(facet, name, spec),
                    MemberSpec::Method(spec) => {
                        let args: Vec<Value> = spec
                            .args_spec
                            .iter()
                            .map(|arg| arg.default_value.clone())
                            .collect();
                        let element = Element::new(ElementKind::MethodCall, name.as_str())
                            .with_description(arguments_description(&args));
                        let slot = Slot::Method {
                            facet,
                            name: name.clone(),
                            args: Rc::new(RefCell::new(args)),
                            args_spec: spec.args_spec.clone(),
                            counter: 0,
                            children: 0,
                        };
                        (element, slot)
                    }
                    MemberSpec::Event(_) => (
                        Element::new(ElementKind::EventBucket, format!("{} event objects:", name)),
                        Slot::Event {
                            facet,
                            name: name.clone(),
                            counter: 0,
                            children: 0,
                        },
                    ),
                };
                let id = core.push(element);
                slots.insert(id, slot);
                ids.insert(name.clone(), id);
            }
            members.push(ids);
        }

        let refresh_id = core.push(Element::new(
            ElementKind::Options(vec!["Refresh".to_string()]),
            "refresh",
        ));
        slots.insert(refresh_id, Slot::Refresh);

        let model = Rc::new(Self {
            core,
            specs,
            facets,
            slots: RefCell::new(slots),
            members,
            refresh_id,
        });
        model.refresh_all_attributes();
        model
    }

    pub(crate) fn shared_core(&self) -> &Rc<ModelCore> {
        &self.core
    }

    /// The preprocessed objects the rows read from.
    pub fn facets(&self) -> &[Value] {
        &self.facets
    }

    pub fn refresh_id(&self) -> ElementId {
        self.refresh_id
    }

    /// Row of member `name` of facet `facet`.
    pub fn member_id(&self, facet: usize, name: &str) -> Option<ElementId> {
        self.members.get(facet)?.get(name).copied()
    }

    pub fn row(&self, id: ElementId) -> Option<Row> {
        let slots = self.slots.borrow();
        let row = match slots.get(&id)? {
            Slot::Attribute {
                facet, name, cached, ..
            } => Row::Attribute {
                facet: *facet,
                name: name.clone(),
                cached: cached.clone().unwrap_or_default(),
            },
            Slot::Method {
                facet,
                name,
                args,
                args_spec,
                ..
            } => Row::Method {
                facet: *facet,
                name: name.clone(),
                args: args.clone(),
                args_spec: args_spec.clone(),
            },
            Slot::Event { facet, name, .. } => Row::Event {
                facet: *facet,
                name: name.clone(),
            },
            Slot::Removable { owner, .. } => Row::Removable { owner: *owner },
            Slot::Refresh => Row::Refresh,
        };
        Some(row)
    }

    pub(crate) fn attribute_spec(&self, facet: usize, name: &str) -> Option<&AttributeSpec> {
        match self.specs.get(facet)?.get(name)? {
            MemberSpec::Attribute(spec) => Some(spec),
            _ => None,
        }
    }

    fn member_modules(&self, facet: usize, name: &str) -> &[TestModuleRef] {
        let member = self.specs.get(facet).and_then(|spec| spec.get(name));
        match member {
            Some(MemberSpec::Attribute(spec)) => &spec.test_modules,
            Some(MemberSpec::Method(spec)) => &spec.return_value_test_modules,
            Some(MemberSpec::Event(spec)) => &spec.event_object_test_modules,
            None => &[],
        }
    }

    // ─────────────────────────────────────────────────────────
    // Attributes
    // ─────────────────────────────────────────────────────────

    /// Re-read an attribute. Nothing happens unless the value was replaced.
    pub fn refresh_attribute(&self, id: ElementId) {
        let (facet, name, cached) = match self.slots.borrow().get(&id) {
            Some(Slot::Attribute {
                facet, name, cached, ..
            }) => (*facet, name.clone(), cached.clone()),
            _ => return,
        };
        let current = self.facets[facet].get_attr(&name).unwrap_or_default();
        if cached.is_some_and(|cached| cached.same(&current)) {
            return;
        }

        let module = get_valid_test_module(self.member_modules(facet, &name), &current);
        let old = match self.slots.borrow_mut().get_mut(&id) {
            Some(Slot::Attribute {
                cached, maintainer, ..
            }) => {
                *cached = Some(current.clone());
                Some(std::mem::replace(maintainer, Box::new(ConstantDescription)))
            }
            _ => None,
        };
        if let Some(mut old) = old {
            old.dispose();
        }

        self.core.update(id, |element| {
            element.reference = Some(current.clone());
            element.test_module = Some(module.clone());
            element.child_task = None;
        });
        let fresh = module.description_maintainer(&current, description_setter(&self.core, id));
        if let Some(Slot::Attribute { maintainer, .. }) = self.slots.borrow_mut().get_mut(&id) {
            *maintainer = fresh;
        }
        self.core.emit(ModelEvent::ElementReferenceChanged(id));
    }

    /// Refresh member `name` of facet `facet`, if it is an attribute.
    pub fn refresh_member(&self, facet: usize, name: &str) {
        if let Some(id) = self.member_id(facet, name) {
            self.refresh_attribute(id);
        }
    }

    pub fn refresh_all_attributes(&self) {
        let ids: Vec<ElementId> = self
            .core
            .element_ids()
            .into_iter()
            .filter(|id| matches!(self.slots.borrow().get(id), Some(Slot::Attribute { .. })))
            .collect();
        for id in ids {
            self.refresh_attribute(id);
        }
    }

    // ─────────────────────────────────────────────────────────
    // Methods and events
    // ─────────────────────────────────────────────────────────

    /// Re-render `args: [...]` after the argument list changed.
    pub fn refresh_method_description(&self, id: ElementId) {
        let description = match self.slots.borrow().get(&id) {
            Some(Slot::Method { args, .. }) => arguments_description(&args.borrow()),
            _ => return,
        };
        self.core.set_description(id, description);
    }

    pub fn append_method_return_value(&self, id: ElementId, value: Value) -> Option<ElementId> {
        self.append_removable(id, value)
    }

    pub fn shrink_method_return_values(&self, id: ElementId, keep: usize) {
        self.shrink_removables(id, keep);
    }

    pub fn append_event_object(&self, id: ElementId, value: Value) -> Option<ElementId> {
        self.append_removable(id, value)
    }

    pub fn shrink_event_objects(&self, id: ElementId, keep: usize) {
        self.shrink_removables(id, keep);
    }

    /// Number of removable rows under `owner`.
    pub fn child_count(&self, owner: ElementId) -> usize {
        match self.slots.borrow().get(&owner) {
            Some(Slot::Method { children, .. }) | Some(Slot::Event { children, .. }) => *children,
            _ => 0,
        }
    }

    fn append_removable(&self, owner: ElementId, value: Value) -> Option<ElementId> {
        let (label, facet, name) = match self.slots.borrow_mut().get_mut(&owner)? {
            Slot::Method {
                facet,
                name,
                counter,
                ..
            } => {
                let label = format!("return value {}", counter);
                *counter += 1;
                (label, *facet, name.clone())
            }
            Slot::Event {
                facet,
                name,
                counter,
                ..
            } => {
                let label = format!("event object {}", counter);
                *counter += 1;
                (label, *facet, name.clone())
            }
            _ => return None,
        };
        let module = get_valid_test_module(self.member_modules(facet, &name), &value);
        let index = self.core.element(owner)?.index + 1;

        let id = self.core.insert(
            index,
            Element::new(ElementKind::RemovableValue, label)
                .with_reference(value.clone(), module.clone()),
        );
        {
            let mut slots = self.slots.borrow_mut();
            if let Some(Slot::Method { children, .. }) | Some(Slot::Event { children, .. }) =
                slots.get_mut(&owner)
            {
                *children += 1;
            }
            slots.insert(
                id,
                Slot::Removable {
                    owner,
                    maintainer: Box::new(ConstantDescription),
                },
            );
        }

        let fresh = module.description_maintainer(&value, description_setter(&self.core, id));
        if let Some(Slot::Removable { maintainer, .. }) = self.slots.borrow_mut().get_mut(&id) {
            *maintainer = fresh;
        }
        self.core.emit(ModelEvent::ElementReferenceChanged(id));
        Some(id)
    }

    /// Drop the oldest rows under `owner` until `keep` remain.
    fn shrink_removables(&self, owner: ElementId, keep: usize) {
        loop {
            let children = self.child_count(owner);
            if children <= keep {
                break;
            }
            let Some(index) = self.core.element(owner).map(|e| e.index) else {
                break;
            };
            match self.core.id_at(index + children) {
                Some(oldest) if self.remove_element(oldest) => {}
                _ => break,
            }
        }
    }

    /// Remove a return value or event object row.
    pub fn remove_element(&self, id: ElementId) -> bool {
        let removed = {
            let mut slots = self.slots.borrow_mut();
            match slots.remove(&id) {
                Some(Slot::Removable { owner, maintainer }) => {
                    if let Some(Slot::Method { children, .. }) | Some(Slot::Event { children, .. }) =
                        slots.get_mut(&owner)
                    {
                        *children = children.saturating_sub(1);
                    }
                    Some(maintainer)
                }
                Some(other) => {
                    slots.insert(id, other);
                    None
                }
                None => None,
            }
        };
        let Some(mut maintainer) = removed else {
            return false;
        };
        maintainer.dispose();
        self.core.remove(id);
        true
    }
}

fn attribute_row(facet: usize, name: &str, spec: &AttributeSpec) -> (Element, Slot) {
    let kind = match (&spec.options, spec.switchable) {
        (Some(options), _) => ElementKind::Options(options.keys().cloned().collect()),
        (None, true) => ElementKind::Switch,
        (None, false) => ElementKind::Attribute,
    };
    let slot = Slot::Attribute {
        facet,
        name: name.to_string(),
        cached: None,
        maintainer: Box::new(ConstantDescription),
    };
    (Element::new(kind, name).refreshable(), slot)
}

impl TestModel for InterfaceModel {
    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn destroy(&self) {
        for slot in self.slots.borrow_mut().values_mut() {
            if let Slot::Attribute { maintainer, .. } | Slot::Removable { maintainer, .. } = slot {
                maintainer.dispose();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_core::Promise;

    use crate::test_module::interface::spec::{EventSpec, MethodSpec};
    use crate::test_module::interface::spec::normalize;
    use crate::test_module::BuiltinModules;

    fn model_for(specs: Vec<InterfaceSpec>, facet: Value) -> Rc<InterfaceModel> {
        let b = BuiltinModules::new();
        let mut specs = specs;
        normalize(&mut specs, &b.general());
        InterfaceModel::new(Rc::new(specs), vec![facet])
    }

    fn assert_dense(model: &InterfaceModel) {
        let indices: Vec<usize> = model.elements().iter().map(|e| e.index).collect();
        let expected: Vec<usize> = (0..indices.len()).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_rows_follow_spec_order() {
        let b = BuiltinModules::new();
        let spec = InterfaceSpec::new()
            .attribute("x", AttributeSpec::new().test_module(b.number()))
            .attribute(
                "mode",
                AttributeSpec::new().options([("on", Value::from(1)), ("off", Value::from(0))]),
            )
            .method("go", MethodSpec::new().args([ArgSpec::new("n").default_value(3)]))
            .event("ping", EventSpec::new());
        let value = Value::map_of([("x", Value::from(1)), ("mode", Value::from(0))]);
        let model = model_for(vec![spec], value);

        let rows: Vec<(String, ElementKind, String)> = model
            .elements()
            .into_iter()
            .map(|e| (e.name, e.kind, e.description))
            .collect();
        assert_eq!(rows[0], ("x".into(), ElementKind::Attribute, "1".into()));
        assert_eq!(
            rows[1].1,
            ElementKind::Options(vec!["on".to_string(), "off".to_string()])
        );
        assert_eq!(rows[2], ("go".into(), ElementKind::MethodCall, "args: [3]".into()));
        assert_eq!(rows[3].0, "ping event objects:");
        assert_eq!(rows[4].0, "refresh");
        assert_eq!(model.refresh_id(), model.core.id_at(4).unwrap());
    }

    #[test]
    fn test_refresh_attribute_is_identity_gated() {
        let b = BuiltinModules::new();
        let value = Value::map_of([("x", Value::from(1))]);
        let model = model_for(
            vec![InterfaceSpec::new().attribute("x", AttributeSpec::new().test_module(b.number()))],
            value.clone(),
        );
        let id = model.member_id(0, "x").unwrap();

        let changes = Rc::new(std::cell::Cell::new(0));
        let count = changes.clone();
        let _sub = model.events().subscribe(move |event| {
            if matches!(event, ModelEvent::ElementReferenceChanged(_)) {
                count.set(count.get() + 1);
            }
        });

        model.refresh_attribute(id);
        assert_eq!(changes.get(), 0);

        value.set_attr("x", Value::from(2)).unwrap();
        model.refresh_attribute(id);
        assert_eq!(changes.get(), 1);
        assert_eq!(model.element(id).unwrap().description, "2");
        assert_eq!(model.core.len(), 2);
    }

    #[test]
    fn test_return_values_insert_newest_first_and_shrink_oldest() {
        let model = model_for(
            vec![InterfaceSpec::new()
                .method("go", MethodSpec::new())
                .attribute("after", AttributeSpec::new())],
            Value::map_of([("after", Value::from(0))]),
        );
        let go = model.member_id(0, "go").unwrap();

        let first = model.append_method_return_value(go, Value::from(10)).unwrap();
        let second = model.append_method_return_value(go, Value::from(20)).unwrap();
        let names: Vec<String> = model.elements().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["go", "return value 1", "return value 0", "after", "refresh"]
        );
        assert_dense(&model);

        model.shrink_method_return_values(go, 1);
        assert!(model.element(first).is_none());
        assert!(model.element(second).is_some());
        assert_eq!(model.child_count(go), 1);
        assert_dense(&model);
    }

    #[test]
    fn test_remove_element_only_touches_removable_rows() {
        let model = model_for(
            vec![InterfaceSpec::new().event("ping", EventSpec::new())],
            Value::map(),
        );
        let bucket = model.member_id(0, "ping").unwrap();
        assert!(!model.remove_element(bucket));

        let a = model.append_event_object(bucket, Value::from("a")).unwrap();
        let b = model.append_event_object(bucket, Value::from("b")).unwrap();
        assert!(model.remove_element(a));
        assert!(!model.remove_element(a));
        assert_eq!(model.child_count(bucket), 1);
        assert_eq!(model.element(b).unwrap().name, "event object 1");
        assert_dense(&model);
    }

    #[test]
    fn test_promise_return_value_classified() {
        let b = BuiltinModules::new();
        let model = model_for(
            vec![InterfaceSpec::new().method(
                "fetch",
                MethodSpec::new().return_value_test_module(b.general_promise()),
            )],
            Value::map(),
        );
        let fetch = model.member_id(0, "fetch").unwrap();
        let id = model
            .append_method_return_value(fetch, Value::Object(Promise::new()))
            .unwrap();
        let element = model.element(id).unwrap();
        assert_eq!(element.description, "state=pending");
        assert!(element.removable);
        assert!(element.test_module.unwrap().needs_immediate_handling());
    }
}
