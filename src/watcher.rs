//! Per-consumer accumulator of tree deltas for pull-style watchers.
//!
//! A watcher owns a private, standalone tree that is never type-bound:
//! `collect` runs only the patch engine, never `synchronize`, since
//! watchers store raw data, not objects.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::instrument;

use crate::node::patch;
use crate::tree::Tree;

pub struct Watcher {
    id: String,
    tree: Mutex<Arc<Tree>>,
    last_extract: Mutex<Instant>,
}

impl Watcher {
    pub fn new(id: impl Into<String>) -> Self {
        let tree = Tree::new("watcher");
        tree.mark_created();
        Self {
            id: id.into(),
            tree: Mutex::new(tree),
            last_extract: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Applies `patch_value` to this watcher's private tree, bypassing type
    /// binding entirely. Guarded by this watcher's own mutex, as required
    /// for `collect`/`extract` atomicity.
    #[instrument(skip(self, patch_value), fields(watcher = %self.id))]
    pub fn collect(&self, patch_value: &Value) {
        let tree = self.tree.lock().unwrap();
        patch::apply(&tree.root(), patch_value);
    }

    /// Atomically reads the current private-tree snapshot and resets it to
    /// an empty tree, updating `last_extract` to now.
    pub fn extract(&self) -> Value {
        let mut tree = self.tree.lock().unwrap();
        *self.last_extract.lock().unwrap() = Instant::now();
        let snapshot = tree.value();
        let fresh = Tree::new("watcher");
        fresh.mark_created();
        *tree = fresh;
        snapshot
    }

    pub fn idle_for(&self) -> Duration {
        self.last_extract.lock().unwrap().elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collect_does_not_bind_objects() {
        let w = Watcher::new("w1");
        w.collect(&json!({"obj1": {"object": "Anything"}}));
        assert_eq!(w.extract(), json!({"obj1": {"object": "Anything"}}));
    }

    #[test]
    fn extract_resets_private_tree() {
        let w = Watcher::new("w1");
        w.collect(&json!({"x": 1}));
        assert_eq!(w.extract(), json!({"x": 1}));
        assert_eq!(w.extract(), json!({}));
    }

    #[test]
    fn two_watchers_receive_independent_deltas() {
        let w1 = Watcher::new("w1");
        let w2 = Watcher::new("w2");
        w1.collect(&json!({"x": 1}));
        w2.collect(&json!({"x": 1}));
        w1.collect(&json!({"y": 2}));

        assert_eq!(w1.extract(), json!({"x": 1, "y": 2}));
        assert_eq!(w2.extract(), json!({"x": 1}));
    }
}
