//! Builds a nested-map patch from a `/`-separated path and a leaf value,
//! and its approximate inverse. Used by [`crate::node::Node::set`] and
//! available to callers building their own patches.

use serde_json::{Map, Value};

/// Synthesises a nested map following `/`-separated `path`, with `value` at
/// the leaf. With `resolve_object_type`, a segment of the form
/// `name:TypeName` additionally sets `"object": "TypeName"` at that level.
pub fn make_patch_with_path(path: &str, value: Value, resolve_object_type: bool) -> Value {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return value;
    }

    let mut root = Map::new();
    let mut cursor = &mut root;
    for (i, segment) in segments.iter().enumerate() {
        let (key, object_type) = if resolve_object_type {
            match segment.split_once(':') {
                Some((k, t)) => (k, Some(t)),
                None => (*segment, None),
            }
        } else {
            (*segment, None)
        };

        if i == segments.len() - 1 {
            let mut leaf = Map::new();
            if let Some(t) = object_type {
                leaf.insert("object".to_string(), Value::String(t.to_string()));
            }
            if leaf.is_empty() {
                cursor.insert(key.to_string(), value);
            } else {
                match value {
                    Value::Object(obj) => {
                        for (k, v) in obj {
                            leaf.insert(k, v);
                        }
                        cursor.insert(key.to_string(), Value::Object(leaf));
                    }
                    other => {
                        cursor.insert(key.to_string(), Value::Object(leaf));
                        let _ = other; // merge semantics: scalar value with a typed leaf has no slot
                    }
                }
            }
            break;
        }

        if let Some(t) = object_type {
            let mut leaf = Map::new();
            leaf.insert("object".to_string(), Value::String(t.to_string()));
            cursor.insert(key.to_string(), Value::Object(leaf));
        } else {
            cursor
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        cursor = match cursor.get_mut(key).unwrap() {
            Value::Object(m) => m,
            _ => unreachable!("just inserted as an object"),
        };
    }

    Value::Object(root)
}

/// Collapses a single-key nested map chain into a slash path and the leaf
/// value found once a level has more than one key (or isn't a map at all).
pub fn trunk_path_and_value(value: &Value) -> (String, Value) {
    let mut path = Vec::new();
    let mut current = value.clone();
    loop {
        match &current {
            Value::Object(map) if map.len() == 1 => {
                let (k, v) = map.iter().next().unwrap();
                path.push(k.clone());
                current = v.clone();
            }
            _ => break,
        }
    }
    (path.join("/"), current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_nested_map_from_path() {
        let patch = make_patch_with_path("a/b/c", json!(42), false);
        assert_eq!(patch, json!({"a": {"b": {"c": 42}}}));
    }

    #[test]
    fn empty_path_returns_value_unchanged() {
        assert_eq!(make_patch_with_path("", json!(1), false), json!(1));
    }

    #[test]
    fn resolves_object_type_segments() {
        let patch = make_patch_with_path("a:Greeter/name", json!("Ada"), true);
        assert_eq!(patch, json!({"a": {"object": "Greeter", "name": "Ada"}}));
    }

    #[test]
    fn trunk_path_and_value_collapses_single_key_chain() {
        let (path, value) = trunk_path_and_value(&json!({"a": {"b": {"c": 42}}}));
        assert_eq!(path, "a/b/c");
        assert_eq!(value, json!(42));
    }

    #[test]
    fn trunk_path_and_value_stops_at_multi_key_map() {
        let (path, value) = trunk_path_and_value(&json!({"a": {"b": 1, "c": 2}}));
        assert_eq!(path, "a");
        assert_eq!(value, json!({"b": 1, "c": 2}));
    }
}
