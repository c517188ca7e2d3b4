use std::ops::Range;

use doctree::{Document, NodeData, NodeId, PlaceholderFlavor};
use serde_json::{Map, Value};

use crate::binding;
use crate::context::ContextStack;
use crate::directive::{self, Directive};
use crate::error::ComposeDiagnostic;
use crate::repeat::{self, PendingRepeat};
use crate::table;

/// One composition in progress. Owns a private clone of the template
/// tree and mutates it in place; the data context is only ever read.
pub struct Engine<'a> {
    pub doc: Document,
    pub stack: ContextStack<'a>,
    pub diagnostics: Vec<ComposeDiagnostic>,
}

/// Scanner state threaded from one placeholder to the next within a
/// single pass. The pending repeat travels inside the state value, so a
/// recursive pass spawned by an expansion can never observe an outer
/// pass's repeat in flight.
pub enum ScanState<'a> {
    Advance,
    Seek {
        pending: PendingRepeat<'a>,
        depth: u32,
    },
}

impl<'a> Engine<'a> {
    pub fn new(template: &Document, root: &'a Map<String, Value>) -> Self {
        Engine {
            doc: template.clone(),
            stack: ContextStack::new(root),
            diagnostics: Vec::new(),
        }
    }

    /// Run one scan pass per section: body, then headers, then footers.
    /// The context stack carries over from one pass to the next.
    pub fn run(&mut self) {
        for root in self.doc.roots() {
            let Some(first) = self.doc.first_child(root) else {
                continue;
            };
            let last = self
                .doc
                .last_child(root)
                .expect("non-empty root has a last child");
            self.scan_range(first, last);
        }
    }

    /// Process every placeholder reachable from the inclusive sibling
    /// range `[first, last]` in document order. Placeholders detached by
    /// earlier directives are skipped silently.
    pub fn scan_range(&mut self, first: NodeId, last: NodeId) {
        let placeholders = self.collect_placeholders(first, last);
        let mut state = ScanState::Advance;
        for ph in placeholders {
            if self.is_detached(ph) {
                continue;
            }
            state = self.handle(ph, state);
        }

        // A pass that ends still seeking swallowed every directive after
        // the opening @Repeat; surface that instead of staying silent.
        if let ScanState::Seek { pending, .. } = state {
            let (span, source_id) = self.placeholder_origin(pending.start);
            self.diagnostics.push(ComposeDiagnostic::mismatched_repeat(
                &pending.array_path,
                span,
                source_id,
            ));
        }
    }

    fn handle(&mut self, ph: NodeId, state: ScanState<'a>) -> ScanState<'a> {
        match state {
            ScanState::Seek { pending, depth } => {
                let text = self.placeholder_text(ph);
                if text.starts_with("@EndRepeat") {
                    if depth == 0 {
                        repeat::expand(self, pending, ph);
                        ScanState::Advance
                    } else {
                        ScanState::Seek {
                            pending,
                            depth: depth - 1,
                        }
                    }
                } else if text.starts_with("@Repeat") {
                    ScanState::Seek {
                        pending,
                        depth: depth + 1,
                    }
                } else {
                    ScanState::Seek { pending, depth }
                }
            }
            ScanState::Advance => self.advance(ph),
        }
    }

    fn advance(&mut self, ph: NodeId) -> ScanState<'a> {
        let text = self.placeholder_text(ph);
        if !text.starts_with('@') {
            return ScanState::Advance;
        }
        let Some(parsed) = directive::parse(&text) else {
            return ScanState::Advance;
        };

        match parsed {
            Directive::Bind { scope_name, expr } => {
                let scope = match &scope_name {
                    Some(name) => self.stack.named(name),
                    None => self.stack.current(),
                };
                if let Some(scope) = scope {
                    if let Some(value) = binding::resolve(scope, &expr) {
                        self.substitute(ph, binding::stringify(value));
                    }
                }
                ScanState::Advance
            }

            Directive::Context { name, path } => {
                let scope = self
                    .stack
                    .current()
                    .and_then(|scope| binding::resolve(scope, &path))
                    .and_then(Value::as_object);
                self.stack.push(scope, name);
                self.doc.remove(ph);
                ScanState::Advance
            }

            Directive::EndContext => {
                self.stack.pop();
                self.doc.remove(ph);
                ScanState::Advance
            }

            Directive::Repeat { path } => {
                let items = self
                    .stack
                    .current()
                    .and_then(|scope| binding::resolve(scope, &path))
                    .and_then(Value::as_array);
                match items {
                    Some(items) => ScanState::Seek {
                        pending: PendingRepeat {
                            start: ph,
                            array_path: path,
                            items,
                        },
                        depth: 0,
                    },
                    None => ScanState::Advance,
                }
            }

            // Without an active seek this is unrecognized text, typically
            // the closer of a repeat whose array never resolved.
            Directive::EndRepeat => ScanState::Advance,

            Directive::RowRepeat {
                index_var,
                span,
                path,
            } => {
                if let Some(len) = self.resolve_array_len(&path) {
                    table::row_repeat(self, ph, &index_var, len, span);
                }
                ScanState::Advance
            }

            Directive::ColRepeat {
                index_var,
                span,
                path,
            } => {
                if let Some(len) = self.resolve_array_len(&path) {
                    table::col_repeat(self, ph, &index_var, len, span);
                }
                ScanState::Advance
            }

            Directive::RowShow { path } => {
                table::row_visibility(self, ph, &path, false);
                ScanState::Advance
            }
            Directive::RowHide { path } => {
                table::row_visibility(self, ph, &path, true);
                ScanState::Advance
            }
            Directive::ColShow { path } => {
                table::col_visibility(self, ph, &path, false);
                ScanState::Advance
            }
            Directive::ColHide { path } => {
                table::col_visibility(self, ph, &path, true);
                ScanState::Advance
            }
        }
    }

    /// Replace a resolved placeholder with a literal text leaf shaped to
    /// its flavor.
    fn substitute(&mut self, ph: NodeId, literal: String) {
        let flavor = self.placeholder_flavor(ph);
        let text = self.doc.create(NodeData::Text(literal));
        let replacement = match flavor {
            PlaceholderFlavor::Inline => text,
            PlaceholderFlavor::Block => {
                let para = self.doc.create(NodeData::Paragraph);
                self.doc.append_child(para, text);
                para
            }
            PlaceholderFlavor::Cell => {
                let cell = self.doc.create(NodeData::TableCell);
                self.doc.append_child(cell, text);
                cell
            }
        };
        self.doc.replace(ph, replacement);
    }

    /// Consume a placeholder while keeping the document shape legal: a
    /// cell-level placeholder leaves an empty cell behind so its row
    /// keeps the column count; other flavors are simply removed.
    pub(crate) fn blank_placeholder(&mut self, ph: NodeId) {
        if self.placeholder_flavor(ph) == PlaceholderFlavor::Cell {
            let cell = self.doc.create(NodeData::TableCell);
            self.doc.insert_after(ph, cell);
        }
        self.doc.remove(ph);
    }

    /// A placeholder is detached when its topmost ancestor is no longer
    /// one of the live section roots.
    fn is_detached(&self, node: NodeId) -> bool {
        !self.doc.is_live_root(self.doc.top_ancestor(node))
    }

    /// All placeholders reachable from the sibling range, depth-first
    /// pre-order: siblings that are themselves placeholders, plus every
    /// placeholder descendant of the others.
    fn collect_placeholders(&self, first: NodeId, last: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut node = Some(first);
        while let Some(current) = node {
            if self.doc.data(current).is_placeholder() {
                found.push(current);
            } else {
                self.collect_descendants(current, &mut found);
            }
            if current == last {
                break;
            }
            node = self.doc.next_sibling(current);
        }
        found
    }

    fn collect_descendants(&self, node: NodeId, found: &mut Vec<NodeId>) {
        for &child in self.doc.children(node) {
            if self.doc.data(child).is_placeholder() {
                found.push(child);
            } else {
                self.collect_descendants(child, found);
            }
        }
    }

    fn resolve_array_len(&self, path: &str) -> Option<usize> {
        self.stack
            .current()
            .and_then(|scope| binding::resolve(scope, path))
            .and_then(Value::as_array)
            .map(|items| items.len())
    }

    fn placeholder_text(&self, ph: NodeId) -> String {
        match self.doc.data(ph) {
            NodeData::Placeholder(p) => p.text.trim().to_string(),
            _ => String::new(),
        }
    }

    pub(crate) fn placeholder_flavor(&self, ph: NodeId) -> PlaceholderFlavor {
        match self.doc.data(ph) {
            NodeData::Placeholder(p) => p.flavor,
            _ => PlaceholderFlavor::Inline,
        }
    }

    pub(crate) fn set_placeholder_text(&mut self, ph: NodeId, text: String) {
        if let NodeData::Placeholder(p) = self.doc.data_mut(ph) {
            p.text = text;
        }
    }

    fn placeholder_origin(&self, ph: NodeId) -> (Range<usize>, usize) {
        match self.doc.data(ph) {
            NodeData::Placeholder(p) => (p.span.clone(), p.source_id),
            _ => (0..0, 0),
        }
    }
}
