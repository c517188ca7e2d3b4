use std::ops::Range;

/// Which top-level section a root node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Body,
    Header,
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Ordered { start: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

/// The legal shape of content that may replace a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderFlavor {
    /// Stands in for a whole block (a paragraph-level position).
    Block,
    /// Stands in for an inline run within a paragraph, heading or cell.
    Inline,
    /// Stands in for an entire table cell. Counts as a cell for
    /// logical-column arithmetic.
    Cell,
}

/// A directive-bearing marker node. Consumed at most once during
/// composition: replaced, removed, or left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Directive text, trimmed of surrounding whitespace.
    pub text: String,
    pub flavor: PlaceholderFlavor,
    /// Byte span of the originating code span in its source file.
    /// Clones inherit the span of the node they were cloned from.
    pub span: Range<usize>,
    /// Source file id the span refers to (for diagnostics).
    pub source_id: usize,
}

/// Payload of a single document tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// A section root: the body, or one header/footer root.
    Section(SectionKind),

    // Block-level
    Paragraph,
    Heading { level: u8 },
    CodeBlock { language: Option<String>, content: String },
    BlockQuote,
    List(ListKind),
    ListItem,
    Table { alignments: Vec<ColumnAlignment> },
    TableRow,
    TableCell,
    Rule,

    // Inline-level
    Text(String),
    CodeSpan(String),
    Strong,
    Emphasis,
    Strikethrough,
    Link { dest: String, title: String },
    Image { dest: String, title: String },
    SoftBreak,
    HardBreak,

    Placeholder(Placeholder),
}

impl NodeData {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, NodeData::Placeholder(_))
    }

    pub fn is_row(&self) -> bool {
        matches!(self, NodeData::TableRow)
    }

    /// True cells and cell-flavored placeholders both occupy a column slot.
    pub fn is_cell(&self) -> bool {
        matches!(self, NodeData::TableCell)
            || matches!(
                self,
                NodeData::Placeholder(Placeholder {
                    flavor: PlaceholderFlavor::Cell,
                    ..
                })
            )
    }

    /// Block-level content that can stand on its own in a section or
    /// list item (a repeatable container).
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeData::Paragraph
                | NodeData::Heading { .. }
                | NodeData::CodeBlock { .. }
                | NodeData::BlockQuote
                | NodeData::List(_)
                | NodeData::Table { .. }
                | NodeData::Rule
        ) || matches!(
            self,
            NodeData::Placeholder(Placeholder {
                flavor: PlaceholderFlavor::Block,
                ..
            })
        )
    }
}
