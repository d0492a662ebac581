//! The tree's basic storage cell: maps, sequences and scalars.

pub mod patch;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;

use crate::object::{ObjectType, TypedObject};
use crate::path::resolver::{self, ResolveOptions};
use crate::query;
use crate::tree::Tree;

/// A reference-counted handle to a [`Node`]. Nodes are never moved or copied;
/// identity is pointer identity on this handle.
pub type NodeRef = Arc<Node>;

/// The three mutually exclusive storage shapes a [`Node`] can hold.
pub(crate) enum Storage {
    Map(HashMap<String, NodeRef>),
    Sequence(Vec<NodeRef>),
    Scalar(Value),
}

/// The kind of a [`Node`], mirroring the active [`Storage`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Map,
    Sequence,
    Scalar,
}

pub(crate) struct Binding {
    pub object_type: Arc<ObjectType>,
    pub object: Arc<dyn TypedObject>,
}

/// One cell of the tree: a map, a sequence, or a scalar leaf.
///
/// A node's children, parent link and bound object are each guarded by their
/// own lock so that readers (`value`, `get`, `query`) can run concurrently
/// with each other while mutation (via the patch engine) is serialized by the
/// owning [`Tree`].
pub struct Node {
    pub(crate) storage: RwLock<Storage>,
    pub(crate) parent: RwLock<Option<Weak<Node>>>,
    pub(crate) parent_key: RwLock<String>,
    pub(crate) binding: RwLock<Option<Binding>>,
    pub(crate) tree: RwLock<Option<Weak<Tree>>>,
}

impl Node {
    pub(crate) fn new_scalar(value: Value) -> NodeRef {
        Arc::new(Node {
            storage: RwLock::new(Storage::Scalar(value)),
            parent: RwLock::new(None),
            parent_key: RwLock::new(String::new()),
            binding: RwLock::new(None),
            tree: RwLock::new(None),
        })
    }

    pub(crate) fn new_map() -> NodeRef {
        Arc::new(Node {
            storage: RwLock::new(Storage::Map(HashMap::new())),
            parent: RwLock::new(None),
            parent_key: RwLock::new(String::new()),
            binding: RwLock::new(None),
            tree: RwLock::new(None),
        })
    }

    pub(crate) fn new_sequence() -> NodeRef {
        Arc::new(Node {
            storage: RwLock::new(Storage::Sequence(Vec::new())),
            parent: RwLock::new(None),
            parent_key: RwLock::new(String::new()),
            binding: RwLock::new(None),
            tree: RwLock::new(None),
        })
    }

    pub fn kind(&self) -> Kind {
        match &*self.storage.read().unwrap() {
            Storage::Map(_) => Kind::Map,
            Storage::Sequence(_) => Kind::Sequence,
            Storage::Scalar(_) => Kind::Scalar,
        }
    }

    /// A deep, independent snapshot of this subtree as plain JSON data.
    pub fn value(&self) -> Value {
        match &*self.storage.read().unwrap() {
            Storage::Map(children) => {
                let mut map = serde_json::Map::with_capacity(children.len());
                for (k, child) in children {
                    map.insert(k.clone(), child.value());
                }
                Value::Object(map)
            }
            Storage::Sequence(children) => {
                Value::Array(children.iter().map(|c| c.value()).collect())
            }
            Storage::Scalar(v) => v.clone(),
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.read().unwrap().as_ref().and_then(Weak::upgrade)
    }

    pub fn parent_key(&self) -> String {
        self.parent_key.read().unwrap().clone()
    }

    pub fn root(self: &NodeRef) -> NodeRef {
        let mut current = self.clone();
        loop {
            let next = current.parent();
            match next {
                Some(p) => current = p,
                None => return current,
            }
        }
    }

    pub fn tree(&self) -> Option<Arc<Tree>> {
        self.tree.read().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// This node's name: the tree's name at the root, the parent key
    /// otherwise.
    pub fn name(&self) -> String {
        if self.parent().is_none() {
            self.tree().map(|t| t.name().to_owned()).unwrap_or_default()
        } else {
            self.parent_key()
        }
    }

    /// This node's full slash-separated path from the tree root.
    pub fn path(self: &NodeRef) -> String {
        let mut segments = Vec::new();
        let mut current = self.clone();
        loop {
            let parent = current.parent();
            match parent {
                None => break,
                Some(p) => {
                    segments.push(current.parent_key());
                    current = p;
                }
            }
        }
        segments.reverse();
        segments.join("/")
    }

    /// Resolves `path` with links, redirects and dedup all enabled.
    pub fn get(self: &NodeRef, path: &str) -> Vec<NodeRef> {
        let options = self
            .tree()
            .map(|tree| tree.resolve_options())
            .unwrap_or_default();
        self.get_ex(path, options)
    }

    pub fn get_one(self: &NodeRef, path: &str) -> Option<NodeRef> {
        self.get(path).into_iter().next()
    }

    pub fn get_ex(self: &NodeRef, path: &str, options: ResolveOptions) -> Vec<NodeRef> {
        resolver::resolve(self, path, options)
    }

    pub fn query(self: &NodeRef, q: &Value) -> Result<Value, query::Error> {
        query::query(self, q)
    }

    /// Rewrites this subtree by computing the equivalent full-path patch from
    /// the tree root and applying it through the owning tree.
    pub fn set(self: &NodeRef, new_value: Value) {
        let Some(tree) = self.tree() else {
            return;
        };
        let path = self.path();
        let full_patch = crate::patch_path::make_patch_with_path(&path, new_value, false);
        tree.set(full_patch);
    }

    /// Removes map entries whose value is scalar `null`. Sequence elements
    /// are never removed.
    pub fn clean_nulls(&self, recursive: bool) {
        let mut storage = self.storage.write().unwrap();
        match &mut *storage {
            Storage::Map(children) => {
                children.retain(|_, child| !matches!(&*child.storage.read().unwrap(), Storage::Scalar(Value::Null)));
                if recursive {
                    for child in children.values() {
                        child.clean_nulls(true);
                    }
                }
            }
            Storage::Sequence(children) => {
                if recursive {
                    for child in children.iter() {
                        child.clean_nulls(true);
                    }
                }
            }
            Storage::Scalar(_) => {}
        }
    }

    pub fn object(&self) -> Option<Arc<dyn TypedObject>> {
        self.binding.read().unwrap().as_ref().map(|b| b.object.clone())
    }

    /// If this node's bound object implements the optional redirect
    /// capability, returns the substitute node list it yields.
    pub fn redirect(&self) -> Option<Vec<NodeRef>> {
        let binding = self.binding.read().unwrap();
        let binding = binding.as_ref()?;
        binding.object_type.redirect_for(&binding.object)
    }

    pub fn object_type_name(&self) -> Option<String> {
        self.binding
            .read()
            .unwrap()
            .as_ref()
            .map(|b| b.object_type.name().to_owned())
    }

    pub(crate) fn map_child(&self, key: &str) -> Option<NodeRef> {
        match &*self.storage.read().unwrap() {
            Storage::Map(children) => children.get(key).cloned(),
            _ => None,
        }
    }

    pub(crate) fn map_keys(&self) -> Vec<String> {
        match &*self.storage.read().unwrap() {
            Storage::Map(children) => children.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn sequence_child(&self, index: usize) -> Option<NodeRef> {
        match &*self.storage.read().unwrap() {
            Storage::Sequence(children) => children.get(index).cloned(),
            _ => None,
        }
    }

    pub(crate) fn sequence_len(&self) -> Option<usize> {
        match &*self.storage.read().unwrap() {
            Storage::Sequence(children) => Some(children.len()),
            _ => None,
        }
    }

    pub(crate) fn children(&self) -> Vec<NodeRef> {
        match &*self.storage.read().unwrap() {
            Storage::Map(children) => children.values().cloned().collect(),
            Storage::Sequence(children) => children.clone(),
            Storage::Scalar(_) => Vec::new(),
        }
    }

    pub(crate) fn scalar_value(&self) -> Option<Value> {
        match &*self.storage.read().unwrap() {
            Storage::Scalar(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_tree(&self, tree: &Weak<Tree>) {
        *self.tree.write().unwrap() = Some(tree.clone());
        for child in self.children() {
            child.set_tree(tree);
        }
    }

    pub(crate) fn reset_to_empty_map(&self) {
        *self.storage.write().unwrap() = Storage::Map(HashMap::new());
    }

    pub(crate) fn set_binding(&self, binding: Option<Binding>) {
        *self.binding.write().unwrap() = binding;
    }

    pub(crate) fn take_binding(&self) -> Option<Binding> {
        self.binding.write().unwrap().take()
    }

    /// The bound object type and object, if any, as a cheap clone of the
    /// `Arc`s — used by the synchronize cascade to push field updates into
    /// an existing parent binding without holding the binding lock.
    pub(crate) fn binding_snapshot(&self) -> Option<(Arc<ObjectType>, Arc<dyn TypedObject>)> {
        self.binding
            .read()
            .unwrap()
            .as_ref()
            .map(|b| (b.object_type.clone(), b.object.clone()))
    }
}

/// Recursively destroys every bound typed object in this subtree, deepest
/// first, then clears the binding. Used by the patch engine when a node is
/// truncated or re-kinded, and by the tree when clearing.
pub(crate) fn destroy_subtree(node: &NodeRef) {
    for child in node.children() {
        destroy_subtree(&child);
    }
    if let Some(binding) = node.take_binding() {
        binding.object.destroyed();
    }
}

/// Downcasts a node's bound object to a concrete typed-object implementation,
/// the idiomatic replacement for the original system's reflection-based type
/// assertion.
pub fn object_as<T: TypedObject + 'static>(node: &Node) -> Option<Arc<T>> {
    let obj = node.object()?;
    let any = obj.as_any_arc();
    any.downcast::<T>().ok()
}

/// Downcasts the bound objects of a slice of nodes, dropping any node with
/// no binding or a binding of the wrong type.
pub fn resolve_objects<T: TypedObject + 'static>(nodes: &[NodeRef]) -> Vec<Arc<T>> {
    nodes.iter().filter_map(|n| object_as::<T>(n)).collect()
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_first_char_only() {
        assert_eq!(capitalize("name"), "Name");
        assert_eq!(capitalize("Name"), "Name");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("x"), "X");
    }

    #[test]
    fn value_snapshot_is_independent_of_later_mutation() {
        let node = Node::new_map();
        {
            let mut storage = node.storage.write().unwrap();
            if let Storage::Map(m) = &mut *storage {
                m.insert("a".to_string(), Node::new_scalar(Value::from(1)));
            }
        }
        let snap = node.value();
        assert_eq!(snap, serde_json::json!({"a": 1}));
    }
}
