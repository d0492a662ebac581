//! Splits a path string into an ordered list of [`Token`]s.

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Root,
    Parent,
    AllParents,
    DirectChildren,
    AllChildren,
    Params(Vec<Predicate>),
    Sub(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, String),
    Ne(String, String),
    Gt(String, String),
    Lt(String, String),
    Ge(String, String),
    Le(String, String),
    Regex(String, String),
    Present(String),
    Absent(String),
}

/// Tokenizes `path` per the grammar documented in the path DSL design.
pub fn tokenize(path: &str) -> Vec<Token> {
    let chars: Vec<char> = path.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    if chars.first() == Some(&'/') {
        tokens.push(Token::Root);
        i = 1;
    }

    for raw_segment in split_unescaped(&chars[i..], '/') {
        if raw_segment.is_empty() {
            continue;
        }
        tokens.extend(tokenize_segment(&raw_segment));
    }

    tokens
}

/// Splits `chars` on unescaped occurrences of `delim`, never splitting
/// inside a bracketed `[...]` span.
fn split_unescaped(chars: &[char], delim: char) -> Vec<Vec<char>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            current.push(c);
            current.push(chars[i + 1]);
            i += 2;
            continue;
        }
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' if depth > 0 => {
                depth -= 1;
                current.push(c);
            }
            c if c == delim && depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
        i += 1;
    }
    segments.push(current);
    segments
}

fn tokenize_segment(segment: &[char]) -> Vec<Token> {
    let mut tokens = Vec::new();

    // Split off a single trailing [...] predicate block, if present.
    let (selector, params) = match segment.iter().position(|&c| c == '[') {
        Some(idx) if segment.last() == Some(&']') => (&segment[..idx], Some(&segment[idx + 1..segment.len() - 1])),
        _ => (segment, None),
    };

    let selector_text = unescape(selector);
    if !selector_text.is_empty() {
        tokens.push(match selector_text.as_str() {
            ".." => Token::Parent,
            "..." => Token::AllParents,
            "*" => Token::DirectChildren,
            "**" => Token::AllChildren,
            other => Token::Sub(other.to_string()),
        });
    }

    if let Some(params) = params {
        tokens.push(Token::Params(parse_predicates(params)));
    }

    tokens
}

fn parse_predicates(chars: &[char]) -> Vec<Predicate> {
    split_unescaped(chars, ',')
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(|clause| parse_predicate(&unescape(&clause)))
        .collect()
}

fn parse_predicate(clause: &str) -> Predicate {
    if let Some(key) = clause.strip_prefix('!') {
        return Predicate::Absent(key.to_string());
    }
    for (op, ctor) in [
        ("!=", Predicate::Ne as fn(String, String) -> Predicate),
        (">=", Predicate::Ge),
        ("<=", Predicate::Le),
        ("=", Predicate::Eq),
        (">", Predicate::Gt),
        ("<", Predicate::Lt),
        ("~", Predicate::Regex),
    ] {
        if let Some(pos) = clause.find(op) {
            let key = clause[..pos].to_string();
            let value = clause[pos + op.len()..].to_string();
            return ctor(key, value);
        }
    }
    Predicate::Present(clause.to_string())
}

fn unescape(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn root_and_sub_tokens() {
        assert_eq!(tokenize("/a/b"), vec![Token::Root, Token::Sub("a".into()), Token::Sub("b".into())]);
    }

    #[test]
    fn wildcard_immediately_followed_by_predicate() {
        let tokens = tokenize("xs/*[k=beta]/n");
        assert_eq!(
            tokens,
            vec![
                Token::Sub("xs".into()),
                Token::DirectChildren,
                Token::Params(vec![Predicate::Eq("k".into(), "beta".into())]),
                Token::Sub("n".into()),
            ]
        );
    }

    #[test_case(".." => Token::Parent)]
    #[test_case("..." => Token::AllParents)]
    #[test_case("*" => Token::DirectChildren)]
    #[test_case("**" => Token::AllChildren)]
    fn standalone_tokens(segment: &str) -> Token {
        tokenize(segment).into_iter().next().unwrap()
    }

    #[test]
    fn predicate_forms() {
        let tokens = tokenize("*[a=1,b!=2,c>3,d<4,e>=5,f<=6,g~^x,h,!i]");
        let Token::Params(preds) = &tokens[1] else {
            panic!("expected Params token");
        };
        assert_eq!(
            preds,
            &vec![
                Predicate::Eq("a".into(), "1".into()),
                Predicate::Ne("b".into(), "2".into()),
                Predicate::Gt("c".into(), "3".into()),
                Predicate::Lt("d".into(), "4".into()),
                Predicate::Ge("e".into(), "5".into()),
                Predicate::Le("f".into(), "6".into()),
                Predicate::Regex("g".into(), "^x".into()),
                Predicate::Present("h".into()),
                Predicate::Absent("i".into()),
            ]
        );
    }

    #[test]
    fn nested_brackets_do_not_split_on_comma() {
        let tokens = tokenize("*[k~a[0-9],b=2]");
        let Token::Params(preds) = &tokens[1] else {
            panic!("expected Params token");
        };
        assert_eq!(preds.len(), 2);
    }

    #[test]
    fn escaped_slash_is_literal_within_a_token() {
        assert_eq!(tokenize(r"a\/b"), vec![Token::Sub("a/b".into())]);
    }
}
