pub mod node;
pub mod parser;
mod render;
pub mod tree;

pub use node::{
    ColumnAlignment, ListKind, NodeData, Placeholder, PlaceholderFlavor, SectionKind,
};
pub use parser::Parser;
pub use tree::{Document, NodeId};
