use serde_json::{Map, Value};

/// Resolve a binding expression against a scope object.
///
/// Grammar: `IDENT ('[' INTEGER ']')? ('.' REST)?` where `REST` is the
/// same grammar again. Anything that fails to resolve (a missing key, an
/// index on a non-array or out of bounds, a dotted step into a non-object,
/// malformed syntax, or a final value of JSON `null`) yields `None`.
/// Resolution never fails loudly; callers treat `None` as their
/// documented no-op case.
pub fn resolve<'a>(scope: &'a Map<String, Value>, expr: &str) -> Option<&'a Value> {
    let expr = expr.trim_matches([' ', '\t']);

    let ident_len = expr
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(expr.len());
    if ident_len == 0 {
        return None;
    }
    let (ident, mut rest) = expr.split_at(ident_len);

    let mut value = scope.get(ident)?;

    if let Some(after) = rest.strip_prefix('[') {
        let close = after.find(']')?;
        let digits = &after[..close];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index: usize = digits.parse().ok()?;
        value = value.as_array()?.get(index)?;
        rest = &after[close + 1..];
    }

    if rest.is_empty() {
        return match value {
            Value::Null => None,
            resolved => Some(resolved),
        };
    }

    let tail = rest.strip_prefix('.')?;
    if tail.is_empty() {
        return None;
    }
    resolve(value.as_object()?, tail)
}

/// Render a resolved value as literal substitution text. Strings are
/// inserted verbatim; every other value uses its compact JSON form
/// (`3`, `true`, `[1,2]`).
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
