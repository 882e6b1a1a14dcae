//! Controller of an interface test task
//!
//! Failures raised by the object under test stop here: they are logged at
//! ERROR with a plain copy of the error as detail and the task carries on.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bth_core::prelude::*;
use bth_core::{AttrPath, ListenerGuard, Subscription, Value};

use super::model::{InterfaceModel, Row};
use crate::context::HarnessContext;
use crate::task_manager::InterfaceForTask;
use crate::tasks::{
    create_put_value_task, create_save_or_reset_task, create_setup_arguments_task,
    create_task_on_custom_root, ValueSetter,
};
use crate::test_module::{enter_element_task, open_element_task};
use crate::test_task::{Controller, ElementId, ModelEvent, TestModel};

pub struct InterfaceController {
    this: Weak<InterfaceController>,
    tmi: InterfaceForTask,
    ctx: HarnessContext,
    model: Rc<InterfaceModel>,
    test_data: Value,
    default_attrs_path: AttrPath,
    listeners: RefCell<Vec<ListenerGuard>>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl InterfaceController {
    pub(crate) fn new(
        tmi: InterfaceForTask,
        model: Rc<InterfaceModel>,
        test_data: Value,
        default_attrs_path: AttrPath,
    ) -> Rc<Self> {
        let ctx = tmi.context().clone();
        let controller = Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            tmi,
            ctx,
            model,
            test_data,
            default_attrs_path,
            listeners: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
        });
        controller.model.set_editable(controller.ctx.mode().is_engineer());
        controller.subscribe();
        controller.listen_to_events();
        controller
    }

    fn subscribe(&self) {
        let weak = self.this.clone();
        let on_mode = self.ctx.mode().subscribe(move |mode| {
            if let Some(controller) = weak.upgrade() {
                controller.model.set_editable(mode.is_engineer());
            }
        });
        let weak = self.this.clone();
        let on_reference = self.model.events().subscribe(move |event| {
            if let (ModelEvent::ElementReferenceChanged(id), Some(controller)) =
                (event, weak.upgrade())
            {
                controller.on_reference_changed(*id);
            }
        });
        self.subscriptions
            .borrow_mut()
            .extend([on_mode, on_reference]);
    }

    /// Every event row collects the event objects its facet fires.
    fn listen_to_events(&self) {
        let mut guards = Vec::new();
        for element in self.model.elements() {
            let Some(Row::Event { facet, name }) = self.model.row(element.id) else {
                continue;
            };
            let Some(object) = self.model.facets().get(facet).and_then(Value::as_object) else {
                continue;
            };
            let bucket = element.id;
            let model = Rc::downgrade(&self.model);
            guards.push(ListenerGuard::new(
                object,
                &name,
                Rc::new(move |event_object: &Value| {
                    if let Some(model) = model.upgrade() {
                        model.append_event_object(bucket, event_object.clone());
                    }
                }),
            ));
        }
        *self.listeners.borrow_mut() = guards;
    }

    fn on_reference_changed(&self, id: ElementId) {
        let immediate = self
            .model
            .element(id)
            .and_then(|element| element.test_module)
            .is_some_and(|module| module.needs_immediate_handling());
        if immediate {
            open_element_task(&self.tmi, self.model.shared_core(), id);
        }
    }

    fn call_method(&self, id: ElementId, facet: usize, name: &str, args: Vec<Value>) {
        let Some(target) = self.model.facets().get(facet).cloned() else {
            return;
        };
        debug!("calling {} with {} argument(s)", name, args.len());
        match target.call_method(name, &args) {
            Ok(returned) => {
                let Some(row) = self.model.append_method_return_value(id, returned) else {
                    return;
                };
                if !self.ctx.mode().is_engineer() {
                    self.model.shrink_method_return_values(id, 1);
                    self.enter_attribute(row);
                }
            }
            Err(e) => {
                self.ctx
                    .log()
                    .error("exception caught while calling method", e.to_detail());
            }
        }
    }

    fn set_value(&self, facet: usize, name: &str, value: Value) {
        let Some(target) = self.model.facets().get(facet) else {
            return;
        };
        if let Err(e) = target.set_attr(name, value) {
            self.ctx.log().error(
                format!("exception caught while assigning value to attribute \"{}\"", name),
                e.to_detail(),
            );
        }
    }

    fn set_attribute_value(&self, id: ElementId, facet: usize, name: &str, value: Value) {
        self.set_value(facet, name, value);
        self.model.refresh_attribute(id);
    }

    fn setter(&self, id: ElementId, facet: usize, name: String, refresh: bool) -> ValueSetter {
        let weak = self.this.clone();
        Rc::new(move |value: Value| {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            if refresh {
                controller.set_attribute_value(id, facet, &name, value);
            } else {
                controller.set_value(facet, &name, value);
            }
        })
    }

    fn open_save_or_reset(&self, path: AttrPath, value: Value, setter: Option<ValueSetter>) {
        self.tmi
            .create_popup_task(create_save_or_reset_task(path, value, setter), true, None);
    }
}

impl Controller for InterfaceController {
    fn save_to_var_tree(&self) {
        self.tmi.create_popup_task(
            create_put_value_task(self.default_attrs_path.clone(), self.test_data.clone()),
            true,
            None,
        );
    }

    fn edit_by_var_tree(&self) {
        let model = Rc::downgrade(&self.model);
        self.tmi.create_popup_task(
            create_task_on_custom_root(self.test_data.clone(), false, true),
            true,
            Some(Box::new(move |_| {
                if let Some(model) = model.upgrade() {
                    model.refresh_all_attributes();
                }
            })),
        );
    }

    fn choose_option(&self, id: ElementId, option: &str) {
        match self.model.row(id) {
            Some(Row::Refresh) => self.model.refresh_all_attributes(),
            Some(Row::Attribute { facet, name, .. }) => {
                let value = self
                    .model
                    .attribute_spec(facet, &name)
                    .and_then(|spec| spec.options.as_ref())
                    .and_then(|options| options.get(option))
                    .cloned();
                match value {
                    Some(value) => self.set_attribute_value(id, facet, &name, value),
                    None => warn!("{} has no option {}", name, option),
                }
            }
            _ => {}
        }
    }

    fn turn_on(&self, id: ElementId) {
        if let Some(Row::Attribute { facet, name, .. }) = self.model.row(id) {
            self.set_attribute_value(id, facet, &name, Value::Bool(true));
        }
    }

    fn turn_off(&self, id: ElementId) {
        if let Some(Row::Attribute { facet, name, .. }) = self.model.row(id) {
            self.set_attribute_value(id, facet, &name, Value::Bool(false));
        }
    }

    fn remove_attribute(&self, id: ElementId) {
        self.model.remove_element(id);
    }

    fn refresh_attribute(&self, id: ElementId) {
        self.model.refresh_attribute(id);
    }

    fn setup_arguments(&self, id: ElementId) {
        let Some(Row::Method {
            args, args_spec, ..
        }) = self.model.row(id)
        else {
            return;
        };
        let model = Rc::downgrade(&self.model);
        self.tmi.create_popup_task(
            create_setup_arguments_task(args_spec, args),
            true,
            Some(Box::new(move |_| {
                if let Some(model) = model.upgrade() {
                    model.refresh_method_description(id);
                }
            })),
        );
    }

    fn enter_attribute(&self, id: ElementId) {
        match self.model.row(id) {
            Some(Row::Method {
                facet, name, args, ..
            }) => {
                let args = args.borrow().clone();
                self.call_method(id, facet, &name, args);
            }
            Some(_) => enter_element_task(&self.tmi, self.model.shared_core(), id),
            None => {}
        }
    }

    fn select_attribute(&self, id: ElementId) {
        let Some(element) = self.model.element(id) else {
            return;
        };
        match self.model.row(id) {
            Some(Row::Removable { .. }) => {
                if let (Some(module), Some(reference)) = (element.test_module, element.reference) {
                    self.open_save_or_reset(module.default_attrs_path(), reference, None);
                }
            }
            Some(Row::Attribute {
                facet,
                name,
                cached,
            }) => {
                let path = element
                    .test_module
                    .map(|module| module.default_attrs_path())
                    .unwrap_or_default();
                let writable = self
                    .model
                    .attribute_spec(facet, &name)
                    .is_some_and(|spec| spec.writable);
                let setter = (writable || self.ctx.mode().is_engineer())
                    .then(|| self.setter(id, facet, name, true));
                self.open_save_or_reset(path, cached, setter);
            }
            Some(Row::Method { facet, name, .. }) => {
                let value = self
                    .model
                    .facets()
                    .get(facet)
                    .and_then(|target| target.get_attr(&name))
                    .unwrap_or_default();
                let setter = self
                    .ctx
                    .mode()
                    .is_engineer()
                    .then(|| self.setter(id, facet, name, false));
                self.open_save_or_reset(AttrPath::new(), value, setter);
            }
            _ => {}
        }
    }

    fn destroy(&self) {
        self.listeners.borrow_mut().clear();
        self.subscriptions.borrow_mut().clear();
    }
}
