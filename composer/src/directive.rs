/// A recognized directive, tokenized from a placeholder's text.
///
/// Variants mirror the grammar table and its priority order; text that
/// matches no entry is not a directive and the placeholder is left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `@{expr}` / `@[name]{expr}`: substitute a bound value.
    Bind {
        scope_name: Option<String>,
        expr: String,
    },
    /// `@Context{path}` / `@Context[name]{path}`: push a scope.
    Context { name: Option<String>, path: String },
    /// `@EndContext`: pop a scope.
    EndContext,
    /// `@Repeat{arrayPath}`: open a block-range repeat.
    Repeat { path: String },
    /// `@EndRepeat`: close a block-range repeat.
    EndRepeat,
    /// `@RowRepeat[idx{,span}]{arrayPath}`: repeat table rows.
    RowRepeat {
        index_var: String,
        span: usize,
        path: String,
    },
    /// `@ColRepeat[idx{,span}]{arrayPath}`: repeat table columns.
    ColRepeat {
        index_var: String,
        span: usize,
        path: String,
    },
    /// `@RowShow{flag}`: keep the row when the flag is true.
    RowShow { path: String },
    /// `@RowHide{flag}`: delete the row when the flag is true.
    RowHide { path: String },
    /// `@ColShow{flag}`: keep the column when the flag is true.
    ColShow { path: String },
    /// `@ColHide{flag}`: delete the column when the flag is true.
    ColHide { path: String },
}

/// Tokenize trimmed directive text. Returns `None` for anything that is
/// not a well-formed directive; such placeholders stay as literal content.
pub fn parse(text: &str) -> Option<Directive> {
    let rest = text.trim().strip_prefix('@')?;

    // Plain binding comes first in the priority order: `@{...}` or
    // `@[name]{...}`.
    if rest.starts_with('{') {
        let expr = braced(rest)?;
        return Some(Directive::Bind {
            scope_name: None,
            expr: expr.to_string(),
        });
    }
    if rest.starts_with('[') {
        let (name, tail) = bracket_ident(rest)?;
        let expr = braced(tail)?;
        return Some(Directive::Bind {
            scope_name: Some(name.to_string()),
            expr: expr.to_string(),
        });
    }

    let keyword_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let (keyword, tail) = rest.split_at(keyword_len);

    match keyword {
        "Context" => {
            if tail.starts_with('[') {
                let (name, tail) = bracket_ident(tail)?;
                let path = braced(tail)?;
                Some(Directive::Context {
                    name: Some(name.to_string()),
                    path: path.to_string(),
                })
            } else {
                let path = braced(tail)?;
                Some(Directive::Context {
                    name: None,
                    path: path.to_string(),
                })
            }
        }
        "EndContext" if tail.is_empty() => Some(Directive::EndContext),
        "Repeat" => Some(Directive::Repeat {
            path: braced(tail)?.to_string(),
        }),
        "EndRepeat" if tail.is_empty() => Some(Directive::EndRepeat),
        "RowRepeat" => {
            let (index_var, span, tail) = indexed(tail)?;
            Some(Directive::RowRepeat {
                index_var,
                span,
                path: braced(tail)?.to_string(),
            })
        }
        "ColRepeat" => {
            let (index_var, span, tail) = indexed(tail)?;
            Some(Directive::ColRepeat {
                index_var,
                span,
                path: braced(tail)?.to_string(),
            })
        }
        "RowShow" => Some(Directive::RowShow {
            path: braced(tail)?.to_string(),
        }),
        "RowHide" => Some(Directive::RowHide {
            path: braced(tail)?.to_string(),
        }),
        "ColShow" => Some(Directive::ColShow {
            path: braced(tail)?.to_string(),
        }),
        "ColHide" => Some(Directive::ColHide {
            path: braced(tail)?.to_string(),
        }),
        _ => None,
    }
}

/// `{...}` spanning the whole tail, inner text non-empty. Inner braces
/// are allowed; only the final character closes the parameter.
fn braced(tail: &str) -> Option<&str> {
    let inner = tail.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() { None } else { Some(inner) }
}

/// Leading `[ident]`, returning the identifier and the remaining tail.
fn bracket_ident(tail: &str) -> Option<(&str, &str)> {
    let after = tail.strip_prefix('[')?;
    let close = after.find(']')?;
    let ident = &after[..close];
    if !is_ident(ident) {
        return None;
    }
    Some((ident, &after[close + 1..]))
}

/// Leading `[ident]` or `[ident,span]` for the repeat directives. A span
/// of 0 is treated as the default of 1.
fn indexed(tail: &str) -> Option<(String, usize, &str)> {
    let after = tail.strip_prefix('[')?;
    let close = after.find(']')?;
    let inner = &after[..close];
    let rest = &after[close + 1..];

    let (ident, span) = match inner.split_once(',') {
        Some((ident, digits)) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (ident, digits.parse::<usize>().ok()?)
        }
        None => (inner, 1),
    };
    if !is_ident(ident) {
        return None;
    }
    Some((ident.to_string(), span.max(1), rest))
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
