use serde_json::{Map, Value};

/// One scope on the context stack. A scope of `None` marks a `@Context`
/// whose data path failed to resolve; every directive evaluated against
/// it degrades to a no-op.
#[derive(Debug, Clone)]
pub struct ContextEntry<'a> {
    pub scope: Option<&'a Map<String, Value>>,
    pub name: Option<String>,
}

/// The stack of data scopes directives resolve against. Constructed with
/// one entry: the root data object, named `$`.
#[derive(Debug)]
pub struct ContextStack<'a> {
    entries: Vec<ContextEntry<'a>>,
}

impl<'a> ContextStack<'a> {
    pub fn new(root: &'a Map<String, Value>) -> Self {
        ContextStack {
            entries: vec![ContextEntry {
                scope: Some(root),
                name: Some("$".to_string()),
            }],
        }
    }

    pub fn push(&mut self, scope: Option<&'a Map<String, Value>>, name: Option<String>) {
        self.entries.push(ContextEntry { scope, name });
    }

    /// Pop one entry. Popping an empty stack is a no-op, never an error.
    pub fn pop(&mut self) -> Option<ContextEntry<'a>> {
        self.entries.pop()
    }

    /// The scope unqualified lookups resolve against: the top entry's
    /// scope, or `None` if the stack is empty or the top scope is null.
    pub fn current(&self) -> Option<&'a Map<String, Value>> {
        self.entries.last().and_then(|entry| entry.scope)
    }

    /// Find the nearest-pushed entry with the given name, searching the
    /// whole stack from the top down.
    pub fn named(&self, name: &str) -> Option<&'a Map<String, Value>> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.name.as_deref() == Some(name))
            .and_then(|entry| entry.scope)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
