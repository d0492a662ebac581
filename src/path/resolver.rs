//! Given a starting node and a path string, produces the set of resolved
//! nodes, applying link-following, redirects and deduplication.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::node::{Node, NodeRef};

use super::tokenizer::{tokenize, Predicate, Token};

/// The recursion/hop caps this system pins to concrete defaults, where
/// [`crate::config::Config`] is not threaded through (e.g. calls against a
/// detached, tree-less node).
const DEFAULT_MAX_DEPTH: usize = 64;
const DEFAULT_MAX_LINK_HOPS: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub links: bool,
    pub redirects: bool,
    pub dedup: bool,
    pub max_depth: usize,
    pub max_link_hops: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            links: true,
            redirects: true,
            dedup: true,
            max_depth: DEFAULT_MAX_DEPTH,
            max_link_hops: DEFAULT_MAX_LINK_HOPS,
        }
    }
}

pub fn resolve(start: &NodeRef, path: &str, options: ResolveOptions) -> Vec<NodeRef> {
    let tokens = tokenize(path);
    let mut hops_used = 0usize;
    resolve_tokens(start, &tokens, options, &mut hops_used)
}

fn resolve_tokens(
    start: &NodeRef,
    tokens: &[Token],
    options: ResolveOptions,
    hops_used: &mut usize,
) -> Vec<NodeRef> {
    let mut current = vec![start.clone()];
    for token in tokens {
        let mut next = Vec::new();
        for node in &current {
            next.extend(apply_token(node, token, options));
        }
        current = post_process(next, options, hops_used);
    }
    current
}

fn apply_token(node: &NodeRef, token: &Token, options: ResolveOptions) -> Vec<NodeRef> {
    match token {
        Token::Root => vec![node.root()],
        Token::Parent => node.parent().into_iter().collect(),
        Token::AllParents => {
            let mut ancestors = Vec::new();
            let mut current = node.parent();
            let mut depth = 0;
            while let Some(p) = current {
                ancestors.push(p.clone());
                depth += 1;
                if depth >= options.max_depth {
                    break;
                }
                current = p.parent();
            }
            ancestors
        }
        Token::DirectChildren => node.children(),
        Token::AllChildren => {
            let mut descendants = Vec::new();
            collect_all_children(node, options.max_depth, &mut descendants);
            descendants
        }
        Token::Sub(name) => resolve_sub(node, name),
        Token::Params(predicates) => {
            if predicates.iter().all(|p| predicate_matches(node, p)) {
                vec![node.clone()]
            } else {
                Vec::new()
            }
        }
    }
}

fn collect_all_children(node: &NodeRef, depth_left: usize, out: &mut Vec<NodeRef>) {
    if depth_left == 0 {
        return;
    }
    for child in node.children() {
        out.push(child.clone());
        collect_all_children(&child, depth_left - 1, out);
    }
}

fn resolve_sub(node: &NodeRef, name: &str) -> Vec<NodeRef> {
    if let Some(child) = node.map_child(name) {
        return vec![child];
    }
    if let Ok(index) = name.parse::<usize>() {
        if let Some(child) = node.sequence_child(index) {
            return vec![child];
        }
    }
    Vec::new()
}

fn predicate_matches(node: &NodeRef, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Present(key) => field_value(node, key).is_some(),
        Predicate::Absent(key) => field_value(node, key).is_none(),
        Predicate::Eq(key, value) => field_value(node, key)
            .map(|v| value_to_compare_string(&v) == *value)
            .unwrap_or(false),
        Predicate::Ne(key, value) => field_value(node, key)
            .map(|v| value_to_compare_string(&v) != *value)
            .unwrap_or(true),
        Predicate::Gt(key, value) => numeric_compare(node, key, value, |a, b| a > b),
        Predicate::Lt(key, value) => numeric_compare(node, key, value, |a, b| a < b),
        Predicate::Ge(key, value) => numeric_compare(node, key, value, |a, b| a >= b),
        Predicate::Le(key, value) => numeric_compare(node, key, value, |a, b| a <= b),
        Predicate::Regex(key, pattern) => {
            let Some(value) = field_value(node, key) else {
                return false;
            };
            let Ok(re) = Regex::new(pattern) else {
                return false;
            };
            re.is_match(&value_to_compare_string(&value))
        }
    }
}

fn field_value(node: &NodeRef, key: &str) -> Option<Value> {
    if key == "_key" {
        return Some(Value::String(node.parent_key()));
    }
    node.map_child(key).and_then(|c| c.scalar_value())
}

fn numeric_compare(node: &NodeRef, key: &str, value: &str, cmp: impl Fn(f64, f64) -> bool) -> bool {
    let Some(lhs) = field_value(node, key).and_then(|v| value_to_f64(&v)) else {
        return false;
    };
    let Ok(rhs) = value.parse::<f64>() else {
        return false;
    };
    cmp(lhs, rhs)
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn value_to_compare_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Applies link-following, redirect and dedup, in that order, to a freshly
/// produced working set.
fn post_process(nodes: Vec<NodeRef>, options: ResolveOptions, hops_used: &mut usize) -> Vec<NodeRef> {
    let nodes = if options.links {
        follow_links(nodes, options, hops_used)
    } else {
        nodes
    };
    let nodes = if options.redirects {
        apply_redirects(nodes)
    } else {
        nodes
    };
    if options.dedup {
        dedup(nodes)
    } else {
        nodes
    }
}

fn follow_links(nodes: Vec<NodeRef>, options: ResolveOptions, hops_used: &mut usize) -> Vec<NodeRef> {
    let mut current = nodes;
    loop {
        let mut changed = false;
        let mut next = Vec::with_capacity(current.len());
        for node in current {
            if *hops_used < options.max_link_hops {
                if let Some(rest) = link_target(&node) {
                    if let Some(parent) = node.parent() {
                        *hops_used += 1;
                        let resolved = resolve_tokens(&parent, &tokenize(&rest), options, hops_used);
                        next.extend(resolved);
                        changed = true;
                        continue;
                    }
                }
            }
            next.push(node);
        }
        current = next;
        if !changed {
            break;
        }
    }
    current
}

fn link_target(node: &Node) -> Option<String> {
    match node.scalar_value() {
        Some(Value::String(s)) if s.starts_with('@') => Some(s[1..].to_string()),
        _ => None,
    }
}

fn apply_redirects(nodes: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node.redirect() {
            Some(replacement) => out.extend(replacement),
            None => out.push(node),
        }
    }
    out
}

fn dedup(nodes: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut seen: Vec<*const Node> = Vec::with_capacity(nodes.len());
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let ptr = Arc::as_ptr(&node);
        if seen.contains(&ptr) {
            continue;
        }
        seen.push(ptr);
        out.push(node);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::patch;
    use serde_json::json;

    #[test]
    fn resolves_nested_map_path() {
        let root = Node::new_map();
        patch::apply(&root, &json!({"a": {"b": {"c": 42}}}));
        let result = resolve(&root, "a/b/c", ResolveOptions::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].value(), json!(42));
    }

    #[test]
    fn link_following_resolves_through_parent() {
        let root = Node::new_map();
        patch::apply(&root, &json!({"a": {"b": {"c": 42}, "link": "@b/c"}}));
        let result = resolve(&root, "a/link", ResolveOptions::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].value(), json!(42));
    }

    #[test]
    fn predicate_equals_and_numeric() {
        let root = Node::new_map();
        patch::apply(
            &root,
            &json!({"xs": [{"k": "alpha", "n": 1}, {"k": "beta", "n": 2}]}),
        );
        let eq = resolve(&root, "xs/*[k=beta]/n", ResolveOptions::default());
        assert_eq!(eq.len(), 1);
        assert_eq!(eq[0].value(), json!(2));

        let gt = resolve(&root, "xs/*[n>1]/k", ResolveOptions::default());
        assert_eq!(gt.len(), 1);
        assert_eq!(gt[0].value(), json!("beta"));
    }

    #[test]
    fn dedup_keeps_first_occurrence_only() {
        let root = Node::new_map();
        patch::apply(&root, &json!({"a": 1}));
        // "a" resolved via two different (degenerate) token paths collapses to one.
        let result = resolve(&root, "a", ResolveOptions::default());
        assert_eq!(result.len(), 1);
    }
}
