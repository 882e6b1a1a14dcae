//! The Variable Tree: a shared, path-addressed scratch namespace
//!
//! One tree lives for the whole process and is handed to every component
//! that needs it. Tasks stash values in it and pick them up again later,
//! with no messaging between them. Nothing stops two tasks from
//! restructuring the same subtree, so a [`VarPointer`] re-validates its
//! whole identity chain ([`VarPointer::before_start_operations_check`])
//! before acting on it.

use crate::exception::Exception;
use crate::value::{MapRef, Value};

/// Attribute path from the tree root.
pub type AttrPath = Vec<String>;

/// Build an [`AttrPath`] from string slices.
pub fn attrs_path(segments: &[&str]) -> AttrPath {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Handle on the shared tree. Clones address the same root.
#[derive(Clone)]
pub struct VarTree {
    root: Value,
}

impl Default for VarTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VarTree {
    pub fn new() -> Self {
        Self { root: Value::map() }
    }

    /// Wrap an existing map as the root.
    pub fn with_root(root: MapRef) -> Self {
        Self {
            root: Value::Map(root),
        }
    }

    pub fn root(&self) -> Value {
        self.root.clone()
    }

    /// A fresh pointer at the root.
    pub fn pointer(&self) -> VarPointer {
        VarPointer::new(self.root())
    }

    /// Create missing intermediate maps along `path`, then assign `value`
    /// at the leaf. Nothing is written when an intermediate exists but is
    /// not navigable; returns whether the write happened.
    pub fn put_value<S: AsRef<str>>(&self, path: &[S], value: Value) -> bool {
        let mut pointer = self.pointer();
        if !pointer.force_move_forward_along(path) {
            tracing::debug!("put_value: path {:?} is blocked", as_strs(path));
            return false;
        }
        match pointer.set_value(value) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("put_value: assignment refused: {}", e);
                false
            }
        }
    }

    /// Value at `path`, `undefined` when any segment is missing.
    pub fn get_value<S: AsRef<str>>(&self, path: &[S]) -> Value {
        let mut pointer = self.pointer();
        if pointer.move_forward_along(path) {
            pointer.value()
        } else {
            Value::Undefined
        }
    }

    /// Create empty maps along `path` without assigning anything.
    pub fn ensure_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.pointer().force_move_forward_along(path)
    }
}

fn as_strs<S: AsRef<str>>(path: &[S]) -> Vec<&str> {
    path.iter().map(|s| s.as_ref()).collect()
}

/// Cursor into the tree.
///
/// `instances` is `[holder, root, node1, ...]` where `holder` is a virtual
/// map `{root: root}` so assigning at depth zero follows the same
/// parent-slot rule as every other depth. `instances.len() ==
/// attrs_path.len() + 2` always holds.
#[derive(Clone)]
pub struct VarPointer {
    attrs_path: AttrPath,
    instances: Vec<Value>,
}

/// Frozen copy of a pointer's path and identity chain.
#[derive(Clone, Debug)]
pub struct VarPointerSnapshot {
    attrs_path: AttrPath,
    instances: Vec<Value>,
}

impl VarPointerSnapshot {
    pub fn attrs_path(&self) -> &[String] {
        &self.attrs_path
    }
}

impl VarPointer {
    pub fn new(root: Value) -> Self {
        let holder = Value::map_of([("root", root.clone())]);
        Self {
            attrs_path: Vec::new(),
            instances: vec![holder, root],
        }
    }

    pub fn attrs_path(&self) -> &[String] {
        &self.attrs_path
    }

    pub fn depth(&self) -> usize {
        self.attrs_path.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.attrs_path.is_empty()
    }

    /// The identity chain, holder first.
    pub fn instances(&self) -> &[Value] {
        &self.instances
    }

    pub fn root(&self) -> Value {
        self.instances[1].clone()
    }

    /// Node the pointer currently designates.
    pub fn value(&self) -> Value {
        self.instances[self.instances.len() - 1].clone()
    }

    /// Rewrite the parent's slot with `value`. The shared tree is mutated in
    /// place; at depth zero only the pointer's own root changes.
    pub fn set_value(&mut self, value: Value) -> Result<(), Exception> {
        let parent = &self.instances[self.instances.len() - 2];
        let attr = self
            .attrs_path
            .last()
            .map(String::as_str)
            .unwrap_or("root");
        parent.set_attr(attr, value.clone())?;
        let last = self.instances.len() - 1;
        self.instances[last] = value;
        Ok(())
    }

    /// Step into `attr` of the current node. Re-entering a node that is
    /// already on the stack collapses the stack back to it.
    pub fn move_forward(&mut self, attr: &str) -> bool {
        let current = self.value();
        if !current.is_container() {
            return false;
        }
        let Some(child) = current.get_attr(attr) else {
            return false;
        };

        let seen_at = self
            .instances
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, instance)| instance.same(&child))
            .map(|(index, _)| index);

        if let Some(index) = seen_at {
            while self.instances.len() - 1 > index {
                self.move_backward();
            }
            return true;
        }

        self.attrs_path.push(attr.to_string());
        self.instances.push(child);
        true
    }

    /// Pop one level; false at the root.
    pub fn move_backward(&mut self) -> bool {
        if self.attrs_path.is_empty() {
            return false;
        }
        self.attrs_path.pop();
        self.instances.pop();
        true
    }

    /// Pop until the path is `depth` segments long.
    pub fn move_back_to(&mut self, depth: usize) {
        while self.depth() > depth && self.move_backward() {}
    }

    /// Follow `path` from the current position; stops at the first missing
    /// segment and returns false.
    pub fn move_forward_along<S: AsRef<str>>(&mut self, path: &[S]) -> bool {
        path.iter().all(|attr| self.move_forward(attr.as_ref()))
    }

    /// Follow `path`, creating an empty map for every missing segment whose
    /// parent is navigable.
    pub fn force_move_forward_along<S: AsRef<str>>(&mut self, path: &[S]) -> bool {
        for attr in path {
            let attr = attr.as_ref();
            if self.move_forward(attr) {
                continue;
            }
            let current = self.value();
            if !current.is_container() || current.set_attr(attr, Value::map()).is_err() {
                return false;
            }
            if !self.move_forward(attr) {
                return false;
            }
        }
        true
    }

    pub fn create_snapshot(&self) -> VarPointerSnapshot {
        VarPointerSnapshot {
            attrs_path: self.attrs_path.clone(),
            instances: self.instances.clone(),
        }
    }

    /// Same path and same identity chain as when `snapshot` was taken.
    pub fn is_equal_to_snapshot(&self, snapshot: &VarPointerSnapshot) -> bool {
        self.instances.len() == snapshot.instances.len()
            && self
                .instances
                .iter()
                .zip(&snapshot.instances)
                .all(|(a, b)| a.same(b))
            && self.attrs_path == snapshot.attrs_path
    }

    /// Walk the recorded path from the root checking
    /// `parent[attr] === recorded child`. On the first mismatch the pointer
    /// is truncated to that depth and false is returned.
    pub fn before_start_operations_check(&mut self) -> bool {
        for depth in 0..self.attrs_path.len() {
            let parent = &self.instances[depth + 1];
            let recorded = &self.instances[depth + 2];
            let consistent = parent
                .get_attr(&self.attrs_path[depth])
                .is_some_and(|actual| actual.same(recorded));
            if !consistent {
                tracing::debug!(
                    "Stale pointer at depth {} ({:?}), truncating",
                    depth,
                    self.attrs_path
                );
                self.attrs_path.truncate(depth);
                self.instances.truncate(depth + 2);
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_chain_consistent(pointer: &VarPointer) {
        assert_eq!(pointer.attrs_path().len() + 2, pointer.instances().len());
        for (i, attr) in pointer.attrs_path().iter().enumerate() {
            let parent = &pointer.instances()[i + 1];
            let child = &pointer.instances()[i + 2];
            assert!(parent.get_attr(attr).unwrap().same(child));
        }
    }

    #[test]
    fn test_put_then_get() {
        let tree = VarTree::new();
        assert!(tree.put_value(&["a", "b"], Value::from(5)));
        assert!(matches!(tree.get_value(&["a"]), Value::Map(_)));
        assert_eq!(tree.get_value(&["a", "b"]), Value::from(5));
        assert!(tree.get_value(&["a", "c"]).is_undefined());
        assert!(tree.get_value(&["z", "b"]).is_undefined());
    }

    #[test]
    fn test_put_refuses_oversized_list_writes() {
        let tree = VarTree::new();
        assert!(tree.put_value(&["items"], Value::list(vec![])));

        assert!(!tree.put_value(&["items", "18446744073709551615"], Value::from(1)));
        assert!(!tree.put_value(&["items", "4294967296", "x"], Value::from(1)));
        assert!(!tree.put_value(&["items", "length"], Value::Number(1e300)));
        assert_eq!(tree.get_value(&["items", "length"]), Value::Number(0.0));

        assert!(tree.put_value(&["items", "1"], Value::from(7)));
        assert_eq!(tree.get_value(&["items", "length"]), Value::Number(2.0));
    }

    #[test]
    fn test_put_through_primitive_fails_silently() {
        let tree = VarTree::new();
        tree.put_value(&["a"], Value::from(1));
        assert!(!tree.put_value(&["a", "b"], Value::from(2)));
        assert_eq!(tree.get_value(&["a"]), Value::from(1));
    }

    #[test]
    fn test_put_into_list() {
        let tree = VarTree::new();
        tree.put_value(&["items"], Value::list(vec![]));
        assert!(tree.put_value(&["items", "0"], Value::from("x")));
        assert_eq!(tree.get_value(&["items", "length"]), Value::from(1));
    }

    #[test]
    fn test_move_forward_and_backward() {
        let tree = VarTree::new();
        tree.put_value(&["a", "b", "c"], Value::from(true));
        let mut pointer = tree.pointer();
        assert!(!pointer.move_backward());
        assert!(pointer.move_forward("a"));
        assert!(pointer.move_forward("b"));
        assert!(!pointer.move_forward("missing"));
        assert!(pointer.move_forward("c"));
        assert!(!pointer.move_forward("anything"));
        assert_eq!(pointer.attrs_path(), ["a", "b", "c"]);
        assert_chain_consistent(&pointer);

        assert!(pointer.move_backward());
        assert_eq!(pointer.attrs_path(), ["a", "b"]);
        pointer.move_back_to(0);
        assert!(pointer.is_at_root());
        assert_chain_consistent(&pointer);
    }

    #[test]
    fn test_cycle_collapses_path() {
        let a = Value::map();
        a.set_attr("b", a.clone()).unwrap();
        let mut pointer = VarPointer::new(a.clone());

        assert!(pointer.move_forward("b"));
        assert!(pointer.move_forward("b"));
        assert_eq!(pointer.depth(), 0);
        assert!(pointer.value().same(&a));
    }

    #[test]
    fn test_cycle_to_ancestor_truncates() {
        let tree = VarTree::new();
        tree.put_value(&["x", "y"], Value::map());
        let x = tree.get_value(&["x"]);
        tree.get_value(&["x", "y"]).set_attr("up", x.clone()).unwrap();

        let mut pointer = tree.pointer();
        pointer.move_forward_along(&["x", "y"]);
        assert_eq!(pointer.depth(), 2);
        assert!(pointer.move_forward("up"));
        assert_eq!(pointer.attrs_path(), ["x"]);
        assert!(pointer.value().same(&x));
    }

    #[test]
    fn test_stale_detection_truncates() {
        let tree = VarTree::new();
        tree.put_value(&["x", "y"], Value::map());
        let mut pointer = tree.pointer();
        assert!(pointer.move_forward_along(&["x", "y"]));
        assert!(pointer.before_start_operations_check());

        tree.put_value(&["x"], Value::map());
        assert!(!pointer.before_start_operations_check());
        assert_eq!(pointer.depth(), 0);
        assert!(pointer.value().same(&tree.root()));
        assert!(pointer.before_start_operations_check());
    }

    #[test]
    fn test_stale_detection_deeper() {
        let tree = VarTree::new();
        tree.put_value(&["x", "y", "z"], Value::from(1));
        let mut pointer = tree.pointer();
        pointer.move_forward_along(&["x", "y", "z"]);

        tree.get_value(&["x"]).set_attr("y", Value::map()).unwrap();
        assert!(!pointer.before_start_operations_check());
        assert_eq!(pointer.attrs_path(), ["x"]);
        assert_chain_consistent(&pointer);
    }

    #[test]
    fn test_snapshot_comparison() {
        let tree = VarTree::new();
        tree.put_value(&["a", "b"], Value::from(1));
        let mut pointer = tree.pointer();
        pointer.move_forward_along(&["a", "b"]);
        let snapshot = pointer.create_snapshot();
        assert!(pointer.is_equal_to_snapshot(&snapshot));

        pointer.set_value(Value::from(2)).unwrap();
        assert!(!pointer.is_equal_to_snapshot(&snapshot));
        assert_eq!(tree.get_value(&["a", "b"]), Value::from(2));

        let other = pointer.create_snapshot();
        pointer.move_backward();
        assert!(!pointer.is_equal_to_snapshot(&other));
    }

    #[test]
    fn test_set_value_at_root_only_rebinds_pointer() {
        let tree = VarTree::new();
        let mut pointer = tree.pointer();
        pointer.set_value(Value::from(3)).unwrap();
        assert_eq!(pointer.value(), Value::from(3));
        assert!(matches!(tree.root(), Value::Map(_)));
    }

    #[test]
    fn test_ensure_path() {
        let tree = VarTree::new();
        assert!(tree.ensure_path(&["GeneralTestData"]));
        assert!(matches!(tree.get_value(&["GeneralTestData"]), Value::Map(_)));
        let before = tree.get_value(&["GeneralTestData"]);
        tree.ensure_path(&["GeneralTestData"]);
        assert!(tree.get_value(&["GeneralTestData"]).same(&before));
    }
}
