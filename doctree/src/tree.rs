use crate::node::{NodeData, SectionKind};

/// Index of a node in a [`Document`] arena. Ids are only meaningful for
/// the document that produced them (and its clones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A mutable document tree: one body root plus any number of header and
/// footer roots, all sharing a single arena.
///
/// Nodes are never deallocated individually; [`Document::remove`] detaches
/// a subtree from its parent and leaves it in the arena. Detached subtrees
/// are invisible to rendering and are recognized by consumers through
/// [`Document::top_ancestor`] no longer being a live root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    headers: Vec<NodeId>,
    footers: Vec<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Document {
            nodes: Vec::new(),
            body: NodeId(0),
            headers: Vec::new(),
            footers: Vec::new(),
        };
        doc.body = doc.create(NodeData::Section(SectionKind::Body));
        doc
    }

    /// Allocate a new detached node.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Add a header or footer root to the live root set.
    pub fn add_section(&mut self, kind: SectionKind) -> NodeId {
        let id = self.create(NodeData::Section(kind));
        match kind {
            SectionKind::Header => self.headers.push(id),
            SectionKind::Footer => self.footers.push(id),
            SectionKind::Body => panic!("document already has a body root"),
        }
        id
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn headers(&self) -> &[NodeId] {
        &self.headers
    }

    pub fn footers(&self) -> &[NodeId] {
        &self.footers
    }

    /// All live roots in processing order: body, headers, footers.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots = Vec::with_capacity(1 + self.headers.len() + self.footers.len());
        roots.push(self.body);
        roots.extend_from_slice(&self.headers);
        roots.extend_from_slice(&self.footers);
        roots
    }

    pub fn is_live_root(&self, id: NodeId) -> bool {
        id == self.body || self.headers.contains(&id) || self.footers.contains(&id)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.last().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Walk the parent chain to the topmost ancestor (the node itself if
    /// detached or a root).
    pub fn top_ancestor(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        while let Some(parent) = self.nodes[cur.0].parent {
            cur = parent;
        }
        cur
    }

    /// Append a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes[child.0].parent.is_none());
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert a detached node as a sibling immediately before `anchor`.
    pub fn insert_before(&mut self, anchor: NodeId, new: NodeId) {
        let parent = self.nodes[anchor.0]
            .parent
            .expect("insert_before anchor has no parent");
        let pos = self.child_position(parent, anchor);
        self.nodes[new.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(pos, new);
    }

    /// Insert a detached node as a sibling immediately after `anchor`.
    pub fn insert_after(&mut self, anchor: NodeId, new: NodeId) {
        let parent = self.nodes[anchor.0]
            .parent
            .expect("insert_after anchor has no parent");
        let pos = self.child_position(parent, anchor);
        self.nodes[new.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(pos + 1, new);
    }

    /// Detach `id` (and its whole subtree) from its parent. No-op for
    /// nodes that are already detached.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != id);
            self.nodes[id.0].parent = None;
        }
    }

    /// Replace the attached node `old` with the detached node `new`,
    /// keeping the position among its siblings. `old` ends up detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let parent = self.nodes[old.0]
            .parent
            .expect("replace target has no parent");
        let pos = self.child_position(parent, old);
        self.nodes[parent.0].children[pos] = new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
    }

    /// Deep-copy the subtree rooted at `id` into a new detached subtree.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.nodes[id.0].data.clone();
        let copy = self.create(data);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    fn child_position(&self, parent: NodeId, child: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == child)
            .expect("node not found among parent's children")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
