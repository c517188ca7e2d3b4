use doctree::{NodeData, NodeId};
use serde_json::Value;

use crate::binding;
use crate::scanner::Engine;

/// Row-axis expansion: clone the placeholder's row block once per data
/// element, substituting `#<idx>` tokens, then delete the template rows.
/// A placeholder outside any row is a no-op.
pub(crate) fn row_repeat(
    engine: &mut Engine<'_>,
    ph: NodeId,
    index_var: &str,
    data_len: usize,
    row_span: usize,
) {
    let Some(row) = ancestor_row(engine, ph) else {
        return;
    };
    engine.doc.remove(ph);

    // The template block: this row plus the next span - 1 row siblings,
    // fewer if the table runs out.
    let mut rows = vec![row];
    let mut cursor = row;
    while rows.len() < row_span {
        let Some(next) = next_row_sibling(engine, cursor) else {
            break;
        };
        rows.push(next);
        cursor = next;
    }

    let anchor = rows[0];
    let mut first_new = None;
    let mut last_new = None;
    for index in 0..data_len {
        for &template in &rows {
            let copy = engine.doc.clone_subtree(template);
            engine.doc.insert_before(anchor, copy);
            substitute_index(engine, copy, index_var, index);
            if first_new.is_none() {
                first_new = Some(copy);
            }
            last_new = Some(copy);
        }
    }

    for &template in &rows {
        engine.doc.remove(template);
    }

    if let (Some(first), Some(last)) = (first_new, last_new) {
        engine.scan_range(first, last);
    }
}

/// Column-axis expansion across every row of the enclosing row container
/// (one table level only). Template cells are addressed by logical column
/// index; rows with too few cells are left untouched.
pub(crate) fn col_repeat(
    engine: &mut Engine<'_>,
    ph: NodeId,
    index_var: &str,
    data_len: usize,
    col_span: usize,
) {
    let Some((row, row_child)) = row_and_row_child(engine, ph) else {
        return;
    };

    let col_index = logical_column_index(engine, row, row_child);
    let cell_count = engine
        .doc
        .children(row)
        .iter()
        .filter(|&&c| engine.doc.data(c).is_cell())
        .count();
    if col_index + col_span > cell_count {
        return;
    }

    engine.blank_placeholder(ph);

    let Some(container) = engine.doc.parent(row) else {
        return;
    };
    for sibling in engine.doc.children(container).to_vec() {
        if !engine.doc.data(sibling).is_row() {
            continue;
        }
        let cells: Vec<NodeId> = engine
            .doc
            .children(sibling)
            .iter()
            .copied()
            .filter(|&c| engine.doc.data(c).is_cell())
            .collect();
        let Some(&anchor) = cells.get(col_index) else {
            continue;
        };
        let templates: Vec<NodeId> = cells[col_index..].iter().copied().take(col_span).collect();

        let mut first_new = None;
        let mut last_new = None;
        for index in 0..data_len {
            for &template in &templates {
                let copy = engine.doc.clone_subtree(template);
                engine.doc.insert_before(anchor, copy);
                substitute_index(engine, copy, index_var, index);
                if first_new.is_none() {
                    first_new = Some(copy);
                }
                last_new = Some(copy);
            }
        }

        for &template in &templates {
            engine.doc.remove(template);
        }

        if let (Some(first), Some(last)) = (first_new, last_new) {
            engine.scan_range(first, last);
        }
    }
}

/// `@RowShow` / `@RowHide`: delete the placeholder's row when the flag
/// matches the delete trigger, blank the placeholder and keep the row
/// otherwise. A non-boolean or unresolved flag leaves everything as is.
pub(crate) fn row_visibility(engine: &mut Engine<'_>, ph: NodeId, path: &str, delete_when: bool) {
    let Some(flag) = resolve_flag(engine, path) else {
        return;
    };
    if flag == delete_when {
        if let Some(row) = ancestor_row(engine, ph) {
            engine.doc.remove(row);
        }
    } else {
        engine.blank_placeholder(ph);
    }
}

/// `@ColShow` / `@ColHide`: delete the cell at the placeholder's logical
/// column index from every row of the enclosing container, or blank the
/// placeholder and keep the column.
pub(crate) fn col_visibility(engine: &mut Engine<'_>, ph: NodeId, path: &str, delete_when: bool) {
    let Some(flag) = resolve_flag(engine, path) else {
        return;
    };
    if flag == delete_when {
        let Some((row, row_child)) = row_and_row_child(engine, ph) else {
            return;
        };
        let col_index = logical_column_index(engine, row, row_child);
        let Some(container) = engine.doc.parent(row) else {
            return;
        };
        for sibling in engine.doc.children(container).to_vec() {
            if !engine.doc.data(sibling).is_row() {
                continue;
            }
            let cell = engine
                .doc
                .children(sibling)
                .iter()
                .copied()
                .filter(|&c| engine.doc.data(c).is_cell())
                .nth(col_index);
            if let Some(cell) = cell {
                engine.doc.remove(cell);
            }
        }
    } else {
        engine.blank_placeholder(ph);
    }
}

fn resolve_flag(engine: &Engine<'_>, path: &str) -> Option<bool> {
    engine
        .stack
        .current()
        .and_then(|scope| binding::resolve(scope, path))
        .and_then(Value::as_bool)
}

/// Walk parents to the nearest row-kind ancestor.
fn ancestor_row(engine: &Engine<'_>, node: NodeId) -> Option<NodeId> {
    let mut cursor = engine.doc.parent(node);
    while let Some(current) = cursor {
        if engine.doc.data(current).is_row() {
            return Some(current);
        }
        cursor = engine.doc.parent(current);
    }
    None
}

/// The next row-kind sibling after `node`, skipping any non-row
/// siblings in between.
fn next_row_sibling(engine: &Engine<'_>, node: NodeId) -> Option<NodeId> {
    let mut cursor = engine.doc.next_sibling(node);
    while let Some(current) = cursor {
        if engine.doc.data(current).is_row() {
            return Some(current);
        }
        cursor = engine.doc.next_sibling(current);
    }
    None
}

/// The nearest row ancestor together with the placeholder's direct
/// row-child ancestor (the template cell; the placeholder itself when it
/// is cell-flavored).
fn row_and_row_child(engine: &Engine<'_>, node: NodeId) -> Option<(NodeId, NodeId)> {
    let mut child = node;
    let mut cursor = engine.doc.parent(node);
    while let Some(current) = cursor {
        if engine.doc.data(current).is_row() {
            return Some((current, child));
        }
        child = current;
        cursor = engine.doc.parent(current);
    }
    None
}

/// Count of cell-kind children preceding `row_child`; non-cell row
/// children do not advance the column index.
fn logical_column_index(engine: &Engine<'_>, row: NodeId, row_child: NodeId) -> usize {
    engine
        .doc
        .children(row)
        .iter()
        .take_while(|&&c| c != row_child)
        .filter(|&&c| engine.doc.data(c).is_cell())
        .count()
}

/// Replace `#<idx>` tokens with the element index in every placeholder
/// of a freshly cloned subtree.
fn substitute_index(engine: &mut Engine<'_>, root: NodeId, index_var: &str, index: usize) {
    let token = format!("#{}", index_var);
    let value = index.to_string();
    let mut pending = vec![root];
    while let Some(node) = pending.pop() {
        if let NodeData::Placeholder(p) = engine.doc.data_mut(node) {
            if p.text.contains(&token) {
                p.text = p.text.replace(&token, &value);
            }
        }
        pending.extend_from_slice(engine.doc.children(node));
    }
}
