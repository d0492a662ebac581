//! The string-evaluation DSL used by actions (§6): `:key` reads a context
//! variable directly, everything else is scanned for `{expr}` spans that
//! get substituted with the formatted value of `expr` evaluated against
//! the context.

use serde_json::Value;

use crate::action::Context;

/// Evaluates `s` against `context`, per the substitution rules: a leading
/// `:` reads a context variable directly; otherwise every unescaped
/// `{expr}` span is replaced by the formatted value of `context.get(expr)`.
pub fn evaluate_context_value(context: &dyn Context, s: &str) -> Value {
    evaluate_internal(context, s, false)
}

fn evaluate_internal(context: &dyn Context, s: &str, evaluate_this_value: bool) -> Value {
    if let Some(key) = s.strip_prefix(':') {
        return context.get(key).unwrap_or(Value::Null);
    }

    if evaluate_this_value && !contains_unescaped_brace(s, '{') {
        return context.get(s).unwrap_or(Value::Null);
    }

    let mut current = s.to_string();
    loop {
        let (next, substituted) = substitute_once(context, &current);
        current = next;
        if !substituted {
            break;
        }
    }
    Value::String(current)
}

fn contains_unescaped_brace(s: &str, brace: char) -> bool {
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == brace && (i == 0 || (chars[i - 1] != '\\' && chars[i - 1] != '$')) {
            return true;
        }
    }
    false
}

/// Replaces the first well-formed `{expr}` span (escape-aware) with its
/// evaluated, formatted value. Returns the rewritten string and whether a
/// substitution happened.
fn substitute_once(context: &dyn Context, s: &str) -> (String, bool) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut last_open: Option<usize> = None;
    let mut substituted = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let escaped_prev = i > 0 && (chars[i - 1] == '\\' || chars[i - 1] == '$');

        if c == '{' && !escaped_prev {
            last_open = Some(out.chars().count());
            out.push(c);
        } else if c == '}' && !escaped_prev {
            if let Some(open) = last_open {
                let inner: String = out.chars().skip(open + 1).collect();
                if !inner.chars().any(|ch| matches!(ch, '\n' | '\r' | '\t')) {
                    let value = evaluate_internal(context, &inner, true);
                    let formatted = format_value(&value);
                    let prefix: String = out.chars().take(open).collect();
                    out = prefix + &formatted;
                    substituted = true;
                    last_open = None;
                    i += 1;
                    continue;
                }
                last_open = None;
            }
            out.push(c);
        } else {
            out.push(c);
        }
        i += 1;
    }

    (out, substituted)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
