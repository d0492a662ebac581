//! Applies JSON-shaped patches to a node subtree, tracking the set of
//! modified nodes in leaf-first order.

use serde_json::Value;

use super::{destroy_subtree, Node, NodeRef, Storage};

/// Applies `patch` to `node`, returning every node whose storage, scalar
/// value, or kind changed (including descendants), deepest first, with
/// `node` itself last if it was modified.
pub fn apply(node: &NodeRef, patch: &Value) -> Vec<NodeRef> {
    let mut modified = Vec::new();
    apply_inner(node, patch, &mut modified);
    modified
}

fn apply_inner(node: &NodeRef, patch: &Value, modified: &mut Vec<NodeRef>) -> bool {
    match patch {
        Value::Object(map) => apply_map(node, map, modified),
        Value::Array(seq) => apply_seq(node, seq, modified),
        scalar => apply_scalar(node, scalar, modified),
    }
}

fn ensure_kind_map(node: &NodeRef) -> bool {
    let already_map = matches!(&*node.storage.read().unwrap(), Storage::Map(_));
    if already_map {
        return false;
    }
    destroy_subtree(node);
    *node.storage.write().unwrap() = Storage::Map(Default::default());
    true
}

fn ensure_kind_sequence(node: &NodeRef) -> bool {
    let already_seq = matches!(&*node.storage.read().unwrap(), Storage::Sequence(_));
    if already_seq {
        return false;
    }
    destroy_subtree(node);
    *node.storage.write().unwrap() = Storage::Sequence(Default::default());
    true
}

fn child_tree_weak(node: &NodeRef) -> Option<std::sync::Weak<crate::tree::Tree>> {
    node.tree.read().unwrap().clone()
}

fn attach_child(parent: &NodeRef, key: &str, child: &NodeRef) {
    *child.parent.write().unwrap() = Some(std::sync::Arc::downgrade(parent));
    *child.parent_key.write().unwrap() = key.to_string();
    if let Some(tree) = child_tree_weak(parent) {
        child.set_tree(&tree);
    }
}

fn apply_map(
    node: &NodeRef,
    patch: &serde_json::Map<String, Value>,
    modified: &mut Vec<NodeRef>,
) -> bool {
    let mut self_modified = ensure_kind_map(node);

    for (key, value) in patch {
        let (child, newly_created) = match node.map_child(key) {
            Some(existing) => (existing, false),
            None => {
                let fresh = Node::new_map_placeholder_for(value);
                attach_child(node, key, &fresh);
                if let Storage::Map(children) = &mut *node.storage.write().unwrap() {
                    children.insert(key.clone(), fresh.clone());
                }
                self_modified = true;
                (fresh, true)
            }
        };
        // `apply_inner` pushes `child` into `modified` itself when it
        // reports a change, so only push here for the one case it can't
        // see: a freshly created leaf whose placeholder value already
        // equals the patch (e.g. a brand new scalar field), which reports
        // no change of its own despite being a new node.
        let child_modified = apply_inner(&child, value, modified);
        if newly_created && !child_modified {
            modified.push(child.clone());
        }
        if child_modified || newly_created {
            self_modified = true;
        }
    }

    if self_modified {
        modified.push(node.clone());
    }
    self_modified
}

fn apply_seq(node: &NodeRef, patch: &[Value], modified: &mut Vec<NodeRef>) -> bool {
    let mut self_modified = ensure_kind_sequence(node);

    let is_append_mode = matches!(
        patch.first(),
        Some(Value::Object(m)) if m.contains_key("appendArray")
    );

    if is_append_mode {
        for (i, elem) in patch.iter().enumerate() {
            let elem_patch = if i == 0 {
                strip_append_marker(elem)
            } else {
                elem.clone()
            };
            let fresh = Node::new_map_placeholder_for(&elem_patch);
            let index = node.sequence_len().unwrap_or(0);
            attach_child(node, &index.to_string(), &fresh);
            if let Storage::Sequence(children) = &mut *node.storage.write().unwrap() {
                children.push(fresh.clone());
            }
            // Every appended slot is new, so (as in `apply_map`) only push
            // it here when `apply_inner` didn't already report it modified.
            let child_modified = apply_inner(&fresh, &elem_patch, modified);
            if !child_modified {
                modified.push(fresh);
            }
            self_modified = true;
        }
        if self_modified {
            modified.push(node.clone());
        }
        return self_modified;
    }

    for (i, elem) in patch.iter().enumerate() {
        let (child, newly_created) = match node.sequence_child(i) {
            Some(existing) => (existing, false),
            None => {
                let fresh = Node::new_map_placeholder_for(elem);
                attach_child(node, &i.to_string(), &fresh);
                if let Storage::Sequence(children) = &mut *node.storage.write().unwrap() {
                    children.push(fresh.clone());
                }
                self_modified = true;
                (fresh, true)
            }
        };
        let child_modified = apply_inner(&child, elem, modified);
        if newly_created && !child_modified {
            modified.push(child.clone());
        }
        if child_modified || newly_created {
            self_modified = true;
        }
    }

    let existing_len = node.sequence_len().unwrap_or(0);
    if existing_len > patch.len() {
        let mut storage = node.storage.write().unwrap();
        if let Storage::Sequence(children) = &mut *storage {
            let removed: Vec<NodeRef> = children.split_off(patch.len());
            drop(storage);
            for r in &removed {
                destroy_subtree(r);
            }
        }
        self_modified = true;
    }

    if self_modified {
        modified.push(node.clone());
    }
    self_modified
}

fn strip_append_marker(value: &Value) -> Value {
    match value {
        Value::Object(m) => {
            let mut m = m.clone();
            m.remove("appendArray");
            Value::Object(m)
        }
        other => other.clone(),
    }
}

fn apply_scalar(node: &NodeRef, patch: &Value, modified: &mut Vec<NodeRef>) -> bool {
    let kind_changed = !matches!(&*node.storage.read().unwrap(), Storage::Scalar(_));
    if kind_changed {
        destroy_subtree(node);
    }
    let changed = kind_changed
        || match &*node.storage.read().unwrap() {
            Storage::Scalar(existing) => existing != patch,
            _ => true,
        };
    if changed {
        *node.storage.write().unwrap() = Storage::Scalar(patch.clone());
        modified.push(node.clone());
    }
    changed
}

impl Node {
    /// A fresh, still-unattached node shaped like `value` (map, sequence or
    /// scalar) so its first patch application doesn't need a separate
    /// "ensure kind" round trip. Used only by the patch engine when creating
    /// new slots.
    pub(crate) fn new_map_placeholder_for(value: &Value) -> NodeRef {
        match value {
            Value::Object(_) => Node::new_map(),
            Value::Array(_) => Node::new_sequence(),
            scalar => Node::new_scalar(scalar.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_patch_creates_leaf_first_modified_list() {
        let root = Node::new_map();
        let modified = apply(&root, &json!({"a": {"b": 1}}));
        // b (scalar) before a (map) before root.
        assert_eq!(modified.len(), 3);
        assert_eq!(root.value(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn scalar_patch_is_idempotent() {
        let root = Node::new_scalar(json!(1));
        let first = apply(&root, &json!(2));
        assert_eq!(first.len(), 1);
        let second = apply(&root, &json!(2));
        assert!(second.is_empty());
    }

    #[test]
    fn sequence_truncation_destroys_tail_nodes_only() {
        let root = Node::new_sequence();
        apply(&root, &json!([1, 2, 3]));
        assert_eq!(root.value(), json!([1, 2, 3]));
        apply(&root, &json!([10]));
        assert_eq!(root.value(), json!([10]));
    }

    #[test]
    fn append_mode_keeps_existing_elements() {
        let root = Node::new_sequence();
        apply(&root, &json!([1, 2]));
        apply(&root, &json!([{"appendArray": true, "v": 3}]));
        assert_eq!(root.value(), json!([1, 2, {"v": 3}]));
    }

    #[test]
    fn map_patch_preserves_unmentioned_keys() {
        let root = Node::new_map();
        apply(&root, &json!({"a": 1, "b": 2}));
        apply(&root, &json!({"a": 10}));
        assert_eq!(root.value(), json!({"a": 10, "b": 2}));
    }
}
