mod structural;

use crate::node::SectionKind;
use crate::tree::{Document, NodeId};

/// Parser entry point for one Markdown source.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the source as a document body, producing a fresh tree.
    pub fn parse(&self) -> Document {
        let mut doc = Document::new();
        let body = doc.body();
        structural::parse_into(&mut doc, body, &self.source, self.file_id);
        doc
    }

    /// Parse the source as an extra header or footer section of an
    /// existing tree. Returns the new section root.
    pub fn parse_section(&self, doc: &mut Document, kind: SectionKind) -> NodeId {
        let root = doc.add_section(kind);
        structural::parse_into(doc, root, &self.source, self.file_id);
        root
    }
}
