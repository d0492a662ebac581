//! Orchestrates the patch → synchronize (type-binding lifecycle) → watcher
//! fan-out cascade that makes up a [`Tree::set`] call, and owns the root
//! [`Node`] plus the table of [`ObjectType`]s available to this tree.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::node::{destroy_subtree, Kind, Node, NodeRef};
use crate::object::registry::{self, TypeRegistry};
use crate::object::ObjectType;
use crate::path::ResolveOptions;
use crate::query;
use crate::watcher::Watcher;

/// A lifecycle callback or action failed during a [`Tree::set`] cascade.
/// Per the system's error policy, this is logged and the cascade continues
/// rather than aborting — the tree must never end up half-bound.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("action at {path:?} failed: {message}")]
    ActionFailed { path: String, message: String },
}

/// The root-owned graph of [`Node`]s plus binding metadata: the reactive,
/// typed, hierarchical data tree.
pub struct Tree {
    name: String,
    root: NodeRef,
    types: Mutex<HashMap<String, Arc<ObjectType>>>,
    created: AtomicBool,
    modified: AtomicBool,
    watchers: Mutex<HashMap<String, Arc<Watcher>>>,
    last_sweep: Mutex<std::time::Instant>,
    clean_interval: Duration,
    max_resolve_depth: usize,
    max_link_hops: usize,
    /// Serializes all mutation paths (`Set`, `Clear`, the watcher GC sweep),
    /// per the concurrency model's writer discipline. Readers do not take
    /// this lock.
    writer: Mutex<()>,
}

impl Tree {
    /// A new, empty tree named `name`, using the default watcher clean
    /// interval (60s) and resolve depth/link-hop caps.
    pub fn new(name: impl Into<String>) -> Arc<Tree> {
        Self::with_limits(name, Duration::from_secs(60), 64, 32)
    }

    pub fn with_limits(
        name: impl Into<String>,
        clean_interval: Duration,
        max_resolve_depth: usize,
        max_link_hops: usize,
    ) -> Arc<Tree> {
        Arc::new_cyclic(|weak| {
            let root = Node::new_map();
            root.set_tree(weak);
            Tree {
                name: name.into(),
                root,
                types: Mutex::new(HashMap::new()),
                created: AtomicBool::new(false),
                modified: AtomicBool::new(false),
                watchers: Mutex::new(HashMap::new()),
                last_sweep: Mutex::new(std::time::Instant::now()),
                clean_interval,
                max_resolve_depth,
                max_link_hops,
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    pub fn is_created(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_created(&self) {
        self.created.store(true, Ordering::SeqCst);
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            links: true,
            redirects: true,
            dedup: true,
            max_depth: self.max_resolve_depth,
            max_link_hops: self.max_link_hops,
        }
    }

    /// The full current snapshot of the tree.
    pub fn value(&self) -> Value {
        self.root.value()
    }

    pub fn get(&self, path: &str) -> Vec<NodeRef> {
        self.root.get(path)
    }

    pub fn query(&self, q: &Value) -> Result<Value, query::Error> {
        self.root.query(q)
    }

    /// Registers `object_type` directly on this tree (not the process-wide
    /// registry).
    pub fn add_type(&self, object_type: ObjectType) -> Arc<ObjectType> {
        let object_type = Arc::new(object_type);
        self.types
            .lock()
            .unwrap()
            .insert(object_type.name().to_owned(), object_type.clone());
        object_type
    }

    /// Resolves `names` against `registry` (a process-wide or per-tree
    /// [`TypeRegistry`], possibly backed by a type-provider plugin) and
    /// merges the resolved types into this tree's local type table. The
    /// abstract equivalent of the source system's `AddPlugin`.
    pub fn add_types(
        &self,
        registry: &TypeRegistry,
        names: &[String],
    ) -> Result<(), registry::Error> {
        let resolved = registry.resolve(names)?;
        let mut types = self.types.lock().unwrap();
        for t in resolved {
            types.insert(t.name().to_owned(), t);
        }
        Ok(())
    }

    pub fn get_type(&self, name: &str) -> Option<Arc<ObjectType>> {
        self.types.lock().unwrap().get(name).cloned()
    }

    /// The single mutation entry point: applies `patch_value` to the root,
    /// runs the type-binding lifecycle over every modified node, and fans
    /// the raw patch out to every active watcher.
    #[instrument(skip(self, patch_value), fields(tree = %self.name))]
    pub fn set(self: &Arc<Self>, patch_value: Value) {
        let _writer = self.writer.lock().unwrap();

        let modified = crate::node::patch::apply(&self.root, &patch_value);
        let was_modified = !modified.is_empty();

        // Processed shallow-to-deep (the reverse of the patch engine's
        // leaf-first report), so a node's own retyping happens before its
        // children push field updates into it.
        let mut freshly_created = Vec::new();
        for node in modified.iter().rev() {
            if self.synchronize(node) {
                freshly_created.push(node.clone());
            }
        }

        // Children's `CreatedChildren()` before parents': the reverse of
        // the shallow-to-deep processing order above.
        for node in freshly_created.iter().rev() {
            if let Some(obj) = node.object() {
                obj.created_children();
            }
        }

        // `CreatedTree()` runs immediately, parents first, only once this
        // tree has already been through its initial `Created()` cascade;
        // otherwise it's deferred until `Created()` is called.
        if self.is_created() {
            for node in &freshly_created {
                if let Some(obj) = node.object() {
                    obj.created_tree();
                }
            }
        }

        if was_modified {
            self.modified.store(true, Ordering::SeqCst);
        }

        let watchers: Vec<Arc<Watcher>> = self.watchers.lock().unwrap().values().cloned().collect();
        for w in watchers {
            w.collect(&patch_value);
        }
    }

    /// Binds or unbinds `node`'s typed object according to its current
    /// `"object"` child, pushes its snapshot value into its parent's bound
    /// object field (if any), and reports whether a fresh object was
    /// created.
    fn synchronize(&self, node: &NodeRef) -> bool {
        let mut created_fresh = false;

        let new_type = if node.kind() == Kind::Map {
            node.map_child("object")
                .and_then(|c| c.scalar_value())
                .and_then(|v| v.as_str().map(str::to_owned))
                .and_then(|name| self.get_type(&name))
        } else {
            None
        };

        let current_name = node.object_type_name();
        let types_differ = match (&new_type, &current_name) {
            (Some(nt), Some(cur)) => nt.name() != cur,
            (None, None) => false,
            _ => true,
        };

        if types_differ {
            if let Some(binding) = node.take_binding() {
                binding.object.destroyed();
            }
            if let Some(nt) = &new_type {
                let object = nt.construct(node.clone());
                for key in node.map_keys() {
                    if key == "object" {
                        continue;
                    }
                    if let Some(child) = node.map_child(&key) {
                        nt.apply_field(&object, &key, &child.value());
                    }
                }
                node.set_binding(Some(crate::node::Binding {
                    object_type: nt.clone(),
                    object: object.clone(),
                }));
                object.created();
                created_fresh = true;
            }
        }

        if let Some(parent) = node.parent() {
            let parent_key = node.parent_key();
            if parent.kind() == Kind::Map && parent_key != "object" {
                if let Some((object_type, object)) = parent.binding_snapshot() {
                    object_type.apply_field(&object, &parent_key, &node.value());
                }
            }
        }

        created_fresh
    }

    /// Runs the deferred top-down `createdTree()` cascade over every
    /// already-bound object, then marks the tree as created. A no-op if
    /// already created.
    pub fn created(self: &Arc<Self>) {
        if self.is_created() {
            return;
        }
        call_created_tree(&self.root);
        self.mark_created();
    }

    /// Destroys every bound object, deepest first, and resets the tree to
    /// an empty map.
    pub fn clear(self: &Arc<Self>) {
        let _writer = self.writer.lock().unwrap();
        destroy_subtree(&self.root);
        self.root.reset_to_empty_map();
        self.modified.store(true, Ordering::SeqCst);
    }

    /// Destroys every bound object without resetting storage. The abstract
    /// equivalent of the source system's `DestroyObjects`.
    pub fn destroy_objects(self: &Arc<Self>) {
        let _writer = self.writer.lock().unwrap();
        destroy_subtree(&self.root);
    }

    /// `Watch(id)`: on an unknown `id`, registers a fresh watcher and
    /// returns the tree's full current snapshot; on a known `id`, returns
    /// and resets its accumulated delta. Opportunistically sweeps watchers
    /// idle longer than the clean interval.
    #[instrument(skip(self))]
    pub fn watch(self: &Arc<Self>, id: &str) -> Value {
        self.maybe_gc_watchers();

        let existing = self.watchers.lock().unwrap().get(id).cloned();
        if let Some(watcher) = existing {
            watcher.extract()
        } else {
            let watcher = Arc::new(Watcher::new(id));
            self.watchers.lock().unwrap().insert(id.to_string(), watcher);
            self.root.value()
        }
    }

    fn maybe_gc_watchers(&self) {
        let mut last_sweep = self.last_sweep.lock().unwrap();
        if last_sweep.elapsed() < self.clean_interval / 2 {
            return;
        }
        *last_sweep = std::time::Instant::now();
        drop(last_sweep);

        let clean_interval = self.clean_interval;
        self.watchers
            .lock()
            .unwrap()
            .retain(|_, w| w.idle_for() < clean_interval);
    }
}

fn call_created_tree(node: &NodeRef) {
    if let Some(obj) = node.object() {
        obj.created_tree();
    }
    for child in node.children() {
        call_created_tree(&child);
    }
}
