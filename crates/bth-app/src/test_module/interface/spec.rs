//! Declarative interface descriptions
//!
//! An [`InterfaceSpec`] lists the attributes, methods and events of one
//! facet of a value under test, in display order.

use bth_core::{AttrPath, Value};
use indexmap::IndexMap;

use crate::test_module::{check_needs_immediate_handling, TestModuleRef};

/// One argument of a method.
#[derive(Clone)]
pub struct ArgSpec {
    pub name: String,
    pub default_value: Value,
    /// Where to look in the Variable Tree when resetting this argument.
    pub default_attrs_path: AttrPath,
}

impl ArgSpec {
    /// Argument defaulting to `null`, looked up at the tree root.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: Value::Null,
            default_attrs_path: AttrPath::new(),
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn default_attrs_path(mut self, path: AttrPath) -> Self {
        self.default_attrs_path = path;
        self
    }
}

/// Name unnamed arguments `arg<i>` by position.
pub fn args_spec(args: impl IntoIterator<Item = ArgSpec>) -> Vec<ArgSpec> {
    args.into_iter()
        .enumerate()
        .map(|(i, mut arg)| {
            if arg.name.is_empty() {
                arg.name = format!("arg{}", i);
            }
            arg
        })
        .collect()
}

#[derive(Clone, Default)]
pub struct AttributeSpec {
    pub writable: bool,
    pub test_modules: Vec<TestModuleRef>,
    /// Named values the attribute can be set to in one step.
    pub options: Option<IndexMap<String, Value>>,
    /// Boolean attribute rendered as an on/off switch.
    pub switchable: bool,
}

impl AttributeSpec {
    /// Read-only attribute tested with the general module.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn test_module(mut self, module: TestModuleRef) -> Self {
        self.test_modules.insert(0, module);
        self
    }

    pub fn test_modules(mut self, modules: Vec<TestModuleRef>) -> Self {
        self.test_modules.extend(modules);
        self
    }

    pub fn options<K: Into<String>>(mut self, options: impl IntoIterator<Item = (K, Value)>) -> Self {
        self.options = Some(options.into_iter().map(|(k, v)| (k.into(), v)).collect());
        self
    }

    pub fn switchable(mut self) -> Self {
        self.switchable = true;
        self
    }
}

#[derive(Clone, Default)]
pub struct MethodSpec {
    pub args_spec: Vec<ArgSpec>,
    pub return_value_test_modules: Vec<TestModuleRef>,
}

impl MethodSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args(mut self, args: impl IntoIterator<Item = ArgSpec>) -> Self {
        self.args_spec = args_spec(args);
        self
    }

    pub fn return_value_test_module(mut self, module: TestModuleRef) -> Self {
        self.return_value_test_modules.insert(0, module);
        self
    }

    pub fn return_value_test_modules(mut self, modules: Vec<TestModuleRef>) -> Self {
        self.return_value_test_modules.extend(modules);
        self
    }
}

#[derive(Clone, Default)]
pub struct EventSpec {
    pub event_object_test_modules: Vec<TestModuleRef>,
}

impl EventSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_object_test_module(mut self, module: TestModuleRef) -> Self {
        self.event_object_test_modules.insert(0, module);
        self
    }

    pub fn event_object_test_modules(mut self, modules: Vec<TestModuleRef>) -> Self {
        self.event_object_test_modules.extend(modules);
        self
    }
}

#[derive(Clone)]
pub enum MemberSpec {
    Attribute(AttributeSpec),
    Method(MethodSpec),
    Event(EventSpec),
}

impl MemberSpec {
    fn test_modules_mut(&mut self) -> &mut Vec<TestModuleRef> {
        match self {
            MemberSpec::Attribute(spec) => &mut spec.test_modules,
            MemberSpec::Method(spec) => &mut spec.return_value_test_modules,
            MemberSpec::Event(spec) => &mut spec.event_object_test_modules,
        }
    }
}

/// Members of one facet, in display order.
#[derive(Clone, Default)]
pub struct InterfaceSpec {
    members: IndexMap<String, MemberSpec>,
}

impl InterfaceSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, spec: AttributeSpec) -> Self {
        self.members
            .insert(name.to_string(), MemberSpec::Attribute(spec));
        self
    }

    pub fn method(mut self, name: &str, spec: MethodSpec) -> Self {
        self.members.insert(name.to_string(), MemberSpec::Method(spec));
        self
    }

    pub fn event(mut self, name: &str, spec: EventSpec) -> Self {
        self.members.insert(name.to_string(), MemberSpec::Event(spec));
        self
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &MemberSpec)> {
        self.members.iter()
    }

    pub fn get(&self, name: &str) -> Option<&MemberSpec> {
        self.members.get(name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Fill empty module lists with `general`. Returns whether any module
/// named by the specs needs immediate handling.
pub fn normalize(specs: &mut [InterfaceSpec], general: &TestModuleRef) -> bool {
    let mut needs_immediate_handling = false;
    for spec in specs.iter_mut() {
        for member in spec.members.values_mut() {
            let modules = member.test_modules_mut();
            if modules.is_empty() {
                modules.push(general.clone());
            }
            needs_immediate_handling |= check_needs_immediate_handling(modules);
        }
    }
    needs_immediate_handling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_module::BuiltinModules;

    #[test]
    fn test_args_spec_names_by_position() {
        let args = args_spec([ArgSpec::new("uuid"), ArgSpec::new(""), ArgSpec::new("")]);
        let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["uuid", "arg1", "arg2"]);
        assert!(args[1].default_value.same(&Value::Null));
        assert!(args[1].default_attrs_path.is_empty());
    }

    #[test]
    fn test_singular_module_goes_first() {
        let b = BuiltinModules::new();
        let spec = AttributeSpec::new()
            .test_modules(vec![b.string()])
            .test_module(b.number());
        let names: Vec<String> = spec.test_modules.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["number", "string"]);
    }

    #[test]
    fn test_normalize_defaults_to_general() {
        let b = BuiltinModules::new();
        let mut specs = vec![InterfaceSpec::new()
            .attribute("x", AttributeSpec::new())
            .method("go", MethodSpec::new())
            .event("ping", EventSpec::new())];
        assert!(!normalize(&mut specs, &b.general()));
        for (_, member) in specs[0].members() {
            let modules = match member {
                MemberSpec::Attribute(s) => &s.test_modules,
                MemberSpec::Method(s) => &s.return_value_test_modules,
                MemberSpec::Event(s) => &s.event_object_test_modules,
            };
            assert_eq!(modules.len(), 1);
            assert_eq!(modules[0].name(), "general");
        }
    }

    #[test]
    fn test_normalize_propagates_immediate_handling() {
        let b = BuiltinModules::new();
        let mut specs = vec![
            InterfaceSpec::new().attribute("x", AttributeSpec::new().test_module(b.number())),
            InterfaceSpec::new().method(
                "fetch",
                MethodSpec::new().return_value_test_module(b.general_promise()),
            ),
        ];
        assert!(normalize(&mut specs, &b.general()));
    }
}
