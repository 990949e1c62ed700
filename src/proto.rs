//! Minimal protobuf surface scanner
//!
//! The registry does not parse protobuf - syntactic validation belongs to a
//! real parser at the serialization layer. What registration needs is much
//! smaller: reject content that is not even shaped like a .proto file, and
//! read the `import` statements so they can be checked against the declared
//! reference list. This module does exactly that, by splitting the content
//! into top-level statements (comment- and string-aware, brace-counted) and
//! looking only at each statement's leading keyword.

const WELL_KNOWN_PREFIX: &str = "google/protobuf/";

const TOP_LEVEL_KEYWORDS: &[&str] = &[
    "syntax", "edition", "package", "import", "option", "message", "enum", "service", "extend",
];

/// Well-known types ship with every protobuf toolchain and never need a
/// registered reference.
pub fn is_well_known(path: &str) -> bool {
    path.starts_with(WELL_KNOWN_PREFIX)
}

/// Check that the content is plausibly a protobuf schema.
///
/// Statement-level only: every top-level statement must start with a known
/// protobuf keyword and braces must balance. Anything deeper is left to the
/// schema-type parser at the edge.
pub fn validate(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("empty protobuf schema".to_string());
    }
    for stmt in top_level_statements(content)? {
        let Some(word) = stmt.split_whitespace().next() else {
            continue;
        };
        let Some(keyword) = leading_identifier(&stmt) else {
            return Err(format!("unexpected top-level element '{}'", word));
        };
        if !TOP_LEVEL_KEYWORDS.contains(&keyword) {
            return Err(format!("unexpected top-level element '{}'", word));
        }
    }
    Ok(())
}

/// Extract the import paths declared by the schema, in order.
///
/// `import public` and `import weak` modifiers are accepted; the quoted path
/// is what gets returned. Content that fails statement splitting yields no
/// imports - validation reports the real problem.
pub fn imports(content: &str) -> Vec<String> {
    let Ok(statements) = top_level_statements(content) else {
        return Vec::new();
    };
    statements
        .iter()
        .filter(|s| leading_identifier(s) == Some("import"))
        .filter_map(|s| quoted(s))
        .collect()
}

/// Split content into top-level statements.
///
/// A statement is everything up to a top-level `;`, or the head of a
/// top-level `{...}` block. Comments are skipped, string literals are
/// carried through opaquely, nested blocks are not inspected.
fn top_level_statements(content: &str) -> Result<Vec<String>, String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            '"' | '\'' => {
                if depth == 0 {
                    current.push(c);
                }
                let mut escaped = false;
                for n in chars.by_ref() {
                    if depth == 0 {
                        current.push(n);
                    }
                    if escaped {
                        escaped = false;
                    } else if n == '\\' {
                        escaped = true;
                    } else if n == c {
                        break;
                    }
                }
            }
            '{' => {
                if depth == 0 {
                    let head = std::mem::take(&mut current);
                    if head.trim().is_empty() {
                        return Err("block without a declaration".to_string());
                    }
                    statements.push(head);
                }
                depth += 1;
            }
            '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced '}'".to_string())?;
            }
            ';' => {
                if depth == 0 {
                    let stmt = std::mem::take(&mut current);
                    if !stmt.trim().is_empty() {
                        statements.push(stmt);
                    }
                }
            }
            _ => {
                if depth == 0 {
                    current.push(c);
                }
            }
        }
    }

    if depth != 0 {
        return Err("unbalanced '{'".to_string());
    }
    let trailing = current.trim();
    if !trailing.is_empty() {
        let head: String = trailing.chars().take(30).collect();
        return Err(format!("unterminated statement near '{}'", head));
    }
    Ok(statements)
}

fn leading_identifier(stmt: &str) -> Option<&str> {
    let s = stmt.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some(&s[..end])
    }
}

fn quoted(stmt: &str) -> Option<String> {
    let start = stmt.find(['"', '\''])?;
    let quote = &stmt[start..start + 1];
    let rest = &stmt[start + 1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}
