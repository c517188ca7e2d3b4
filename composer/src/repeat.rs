use doctree::{Document, NodeId};
use serde_json::Value;

use crate::scanner::Engine;

/// The single in-flight repeat of one scan pass: the opening placeholder,
/// the array path it named, and the resolved array snapshot.
pub struct PendingRepeat<'a> {
    pub start: NodeId,
    pub array_path: String,
    pub items: &'a [Value],
}

/// Finish a block-range repeat at its matching `@EndRepeat`.
///
/// The template range is the contiguous run of the common ancestor's
/// children spanning the two placeholders. The start placeholder's text
/// becomes `@Context{path[i]}` before cloning iteration `i` and the end
/// placeholder's becomes `@EndContext`, so every clone pushes and pops
/// its own element scope when the inserted span is rescanned.
pub(crate) fn expand<'a>(engine: &mut Engine<'a>, pending: PendingRepeat<'a>, end: NodeId) {
    let (ancestor, start_child, end_child) = common_ancestor(&engine.doc, pending.start, end);
    let range = match (start_child, end_child) {
        (Some(start), Some(end)) => sibling_range(&engine.doc, ancestor, start, end),
        _ => vec![ancestor],
    };
    let Some(&anchor) = range.first() else {
        return;
    };

    engine.set_placeholder_text(end, "@EndContext".to_string());

    let mut first_new = None;
    let mut last_new = None;
    for index in 0..pending.items.len() {
        engine.set_placeholder_text(
            pending.start,
            format!("@Context{{{}[{}]}}", pending.array_path, index),
        );
        for &node in &range {
            let copy = engine.doc.clone_subtree(node);
            engine.doc.insert_before(anchor, copy);
            if first_new.is_none() {
                first_new = Some(copy);
            }
            last_new = Some(copy);
        }
    }

    for &node in &range {
        engine.doc.remove(node);
    }
    log::debug!(
        "expanded @Repeat{{{}}} into {} clones of {} nodes",
        pending.array_path,
        pending.items.len(),
        range.len()
    );

    if let (Some(first), Some(last)) = (first_new, last_new) {
        engine.scan_range(first, last);
    }
}

/// Find the nearest common ancestor of two nodes plus the two
/// direct-child-of-ancestor boundary nodes that slice the sibling range.
///
/// Both root-to-node paths are compared top-down while equal; the last
/// matching node is the ancestor. For `a == b` the boundaries are `None`
/// and the range degenerates to the single node.
pub(crate) fn common_ancestor(
    doc: &Document,
    a: NodeId,
    b: NodeId,
) -> (NodeId, Option<NodeId>, Option<NodeId>) {
    let path_a = root_path(doc, a);
    let path_b = root_path(doc, b);

    let mut depth = 0;
    while depth < path_a.len() && depth < path_b.len() && path_a[depth] == path_b[depth] {
        depth += 1;
    }
    assert!(depth > 0, "nodes share no ancestor");

    (
        path_a[depth - 1],
        path_a.get(depth).copied(),
        path_b.get(depth).copied(),
    )
}

/// Ancestor chain from the node's root down to the node itself.
fn root_path(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut path = vec![node];
    let mut cursor = node;
    while let Some(parent) = doc.parent(cursor) {
        path.push(parent);
        cursor = parent;
    }
    path.reverse();
    path
}

/// The contiguous run of `ancestor`'s children from `start` through
/// `end`, inclusive.
fn sibling_range(doc: &Document, ancestor: NodeId, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let mut range = Vec::new();
    let mut inside = false;
    for &child in doc.children(ancestor) {
        if child == start {
            inside = true;
        }
        if inside {
            range.push(child);
        }
        if child == end {
            break;
        }
    }
    range
}
