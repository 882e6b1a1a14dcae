//! Meta controllers for interface tasks

use std::rc::{Rc, Weak};

use bth_core::{ListenerGuard, ModeSwitch, SafetyMode};

use super::model::InterfaceModel;
use crate::test_task::MetaController;

/// Refreshes attributes of one facet when it fires one of `events`.
///
/// `attributes: None` refreshes every attribute of the task. The gated
/// variant only acts in NORMAL mode.
pub struct AutoRefreshAttributes {
    guards: Vec<ListenerGuard>,
}

impl AutoRefreshAttributes {
    pub fn new(
        model: &Rc<InterfaceModel>,
        mode: &ModeSwitch,
        facet: usize,
        events: &[&str],
        attributes: Option<Vec<String>>,
    ) -> Box<dyn MetaController> {
        Self::build(model, Some(mode.clone()), facet, events, attributes)
    }

    /// Refresh regardless of the safety mode.
    pub fn always(
        model: &Rc<InterfaceModel>,
        facet: usize,
        events: &[&str],
        attributes: Option<Vec<String>>,
    ) -> Box<dyn MetaController> {
        Self::build(model, None, facet, events, attributes)
    }

    fn build(
        model: &Rc<InterfaceModel>,
        gate: Option<ModeSwitch>,
        facet: usize,
        events: &[&str],
        attributes: Option<Vec<String>>,
    ) -> Box<dyn MetaController> {
        let Some(object) = model.facets().get(facet).and_then(|f| f.as_object()).cloned() else {
            return Box::new(Self { guards: Vec::new() });
        };
        let attributes = Rc::new(attributes);
        let guards = events
            .iter()
            .map(|event| {
                let model: Weak<InterfaceModel> = Rc::downgrade(model);
                let gate = gate.clone();
                let attributes = attributes.clone();
                ListenerGuard::new(
                    &object,
                    event,
                    Rc::new(move |_| {
                        if gate
                            .as_ref()
                            .is_some_and(|mode| mode.mode() != SafetyMode::Normal)
                        {
                            return;
                        }
                        let Some(model) = model.upgrade() else {
                            return;
                        };
                        match attributes.as_ref() {
                            Some(names) => names
                                .iter()
                                .for_each(|name| model.refresh_member(facet, name)),
                            None => model.refresh_all_attributes(),
                        }
                    }),
                )
            })
            .collect();
        Box::new(Self { guards })
    }
}

impl MetaController for AutoRefreshAttributes {
    fn destroy(&mut self) {
        self.guards.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bth_core::{DynamicObject, Value};

    use crate::test_module::interface::spec::{normalize, AttributeSpec, InterfaceSpec};
    use crate::test_module::BuiltinModules;
    use crate::test_task::TestModel;

    fn fixture() -> (Rc<DynamicObject>, Rc<InterfaceModel>) {
        let b = BuiltinModules::new();
        let object = DynamicObject::builder("Thing").attribute("level", 1).build();
        let mut specs = vec![InterfaceSpec::new().attribute("level", AttributeSpec::new())];
        normalize(&mut specs, &b.general());
        let model = InterfaceModel::new(Rc::new(specs), vec![Value::Object(object.clone())]);
        (object, model)
    }

    fn level(model: &InterfaceModel) -> String {
        let id = model.member_id(0, "level").unwrap();
        model.element(id).unwrap().description
    }

    #[test]
    fn test_refreshes_on_event_in_normal_mode_only() {
        let (object, model) = fixture();
        let mode = ModeSwitch::new(SafetyMode::Normal);
        let _meta = AutoRefreshAttributes::new(
            &model,
            &mode,
            0,
            &["attributechanged"],
            Some(vec!["level".to_string()]),
        );

        object.update("level", 2);
        object.fire("attributechanged", &Value::Undefined);
        assert_eq!(level(&model), "2");

        mode.set_mode(SafetyMode::Engineer);
        object.update("level", 3);
        object.fire("attributechanged", &Value::Undefined);
        assert_eq!(level(&model), "2");
    }

    #[test]
    fn test_always_ignores_mode_and_destroy_unsubscribes() {
        let (object, model) = fixture();
        let mut meta = AutoRefreshAttributes::always(&model, 0, &["changed"], None);
        object.update("level", 5);
        object.fire("changed", &Value::Undefined);
        assert_eq!(level(&model), "5");

        meta.destroy();
        assert_eq!(object.listener_count("changed"), 0);
    }
}
