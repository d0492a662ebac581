//! Structural projection of a subtree via a string path or a map-shaped
//! query.

use serde_json::Value;
use thiserror::Error;

use crate::node::{Kind, NodeRef};
use crate::path::ResolveOptions;

#[derive(Debug, Error)]
pub enum Error {
    #[error("query sub-value at {0:?} was expected to be a map")]
    MalformedQuery(String),
}

/// Projects `node`'s subtree according to `q`, per the query engine
/// contract: `null` yields the full snapshot, a string is resolved as a
/// path relative to `node` and merged by full node path, a map recurses
/// structurally.
pub fn query(node: &NodeRef, q: &Value) -> Result<Value, Error> {
    match q {
        Value::Null => Ok(node.value()),
        Value::String(path) => query_by_path(node, path),
        Value::Object(fields) => query_by_map(node, fields),
        other => {
            // A query that isn't null/string/map has no defined shape;
            // sibling sub-queries must not be aborted by it, so it's
            // treated the same as an absent key: malformed, reported and
            // skipped by the caller rather than propagated as a value.
            Err(Error::MalformedQuery(other.to_string()))
        }
    }
}

fn query_by_path(node: &NodeRef, path: &str) -> Result<Value, Error> {
    let mut result = serde_json::Map::new();
    let tree_name = node.tree().map(|t| t.name().to_owned()).unwrap_or_default();
    for found in node.get_ex(path, ResolveOptions::default()) {
        let full_path = format!("{tree_name}/{}", found.path());
        insert_deep(&mut result, &full_path, found.value());
    }
    Ok(Value::Object(result))
}

fn insert_deep(map: &mut serde_json::Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let Some(first) = segments.next() else {
        return;
    };
    insert_deep_rec(map, first, segments, value);
}

fn insert_deep_rec<'a>(
    map: &mut serde_json::Map<String, Value>,
    key: &str,
    mut rest: impl Iterator<Item = &'a str>,
    value: Value,
) {
    match rest.next() {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(next_key) => {
            let entry = map
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            if let Value::Object(inner) = entry {
                insert_deep_rec(inner, next_key, rest, value);
            }
        }
    }
}

fn query_by_map(node: &NodeRef, fields: &serde_json::Map<String, Value>) -> Result<Value, Error> {
    match node.kind() {
        Kind::Sequence => {
            let items = node
                .children()
                .iter()
                .map(|child| query(child, &Value::Object(fields.clone())))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(items))
        }
        Kind::Map => {
            let mut out = serde_json::Map::with_capacity(fields.len());
            for (k, sub_query) in fields {
                match node.map_child(k) {
                    None => {
                        out.insert(k.clone(), Value::Null);
                    }
                    Some(child) => {
                        out.insert(k.clone(), query(&child, sub_query)?);
                    }
                }
            }
            Ok(Value::Object(out))
        }
        Kind::Scalar => Ok(node.value()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{patch, Node};
    use serde_json::json;

    #[test]
    fn null_query_returns_full_snapshot() {
        let root = Node::new_map();
        patch::apply(&root, &json!({"a": 1}));
        assert_eq!(query(&root, &Value::Null).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn map_query_preserves_nesting_and_nulls_absent_keys() {
        let root = Node::new_map();
        patch::apply(&root, &json!({"a": 1, "b": 2}));
        let result = query(&root, &json!({"a": null, "missing": null})).unwrap();
        assert_eq!(result, json!({"a": 1, "missing": null}));
    }

    #[test]
    fn sequence_query_returns_list_of_same_length() {
        let root = Node::new_sequence();
        patch::apply(&root, &json!([{"a": 1}, {"a": 2}]));
        let result = query(&root, &json!({"a": null})).unwrap();
        assert_eq!(result, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn string_query_resolves_relative_to_the_node_it_was_called_on() {
        let tree = crate::tree::Tree::new("t");
        tree.set(json!({"a": {"b": {"c": 42}}, "other": 1}));

        let a = tree.get("a").into_iter().next().unwrap();
        // Resolved relative to `a`, not the tree root: "other" is a
        // sibling of `a`, not a descendant, so a root-relative resolution
        // of "b/c" would find nothing.
        let result = a.query(&Value::String("b/c".to_string())).unwrap();
        assert_eq!(result, json!({"t": {"a": {"b": {"c": 42}}}}));
    }
}
