use std::io;

use crate::node::{ColumnAlignment, ListKind, NodeData};
use crate::tree::{Document, NodeId};

impl Document {
    /// Render the whole tree back to Markdown: headers first, then the
    /// body, then footers. Untouched placeholders render back as their
    /// original code span.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let mut sections: Vec<NodeId> = Vec::new();
        sections.extend_from_slice(self.headers());
        sections.push(self.body());
        sections.extend_from_slice(self.footers());

        let mut first = true;
        for root in sections {
            if self.children(root).is_empty() {
                continue;
            }
            if !first {
                out.push('\n');
            }
            first = false;
            self.render_section(root, &mut out);
        }
        out
    }

    /// Serialize the rendered tree to a byte sink.
    pub fn save(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        sink.write_all(self.to_markdown().as_bytes())
    }

    fn render_section(&self, root: NodeId, out: &mut String) {
        for (idx, &child) in self.children(root).iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            self.render_block(child, out);
        }
    }

    fn render_block(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            NodeData::Paragraph => {
                self.render_inlines(node, out);
                out.push('\n');
            }
            NodeData::Heading { level } => {
                for _ in 0..*level {
                    out.push('#');
                }
                out.push(' ');
                self.render_inlines(node, out);
                out.push('\n');
            }
            NodeData::CodeBlock { language, content } => {
                out.push_str("```");
                if let Some(lang) = language {
                    out.push_str(lang);
                }
                out.push('\n');
                out.push_str(content);
                if !content.is_empty() && !content.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("```\n");
            }
            NodeData::BlockQuote => {
                let mut inner = String::new();
                for (idx, &child) in self.children(node).iter().enumerate() {
                    if idx > 0 {
                        inner.push('\n');
                    }
                    self.render_block(child, &mut inner);
                }
                for line in inner.lines() {
                    if line.is_empty() {
                        out.push_str(">\n");
                    } else {
                        out.push_str("> ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
            }
            NodeData::List(kind) => {
                for (idx, &item) in self.children(node).iter().enumerate() {
                    let marker = match kind {
                        ListKind::Bullet => "- ".to_string(),
                        ListKind::Ordered { start } => format!("{}. ", start + idx as u64),
                    };
                    let mut inner = String::new();
                    for (j, &child) in self.children(item).iter().enumerate() {
                        if j > 0 {
                            inner.push('\n');
                        }
                        self.render_block(child, &mut inner);
                    }
                    for (ln, line) in inner.lines().enumerate() {
                        if line.is_empty() {
                            out.push('\n');
                        } else {
                            if ln == 0 {
                                out.push_str(&marker);
                            } else {
                                for _ in 0..marker.len() {
                                    out.push(' ');
                                }
                            }
                            out.push_str(line);
                            out.push('\n');
                        }
                    }
                }
            }
            NodeData::Table { alignments } => {
                self.render_table(node, alignments, out);
            }
            NodeData::Rule => {
                out.push_str("---\n");
            }
            NodeData::Placeholder(ph) => {
                out.push('`');
                out.push_str(&ph.text);
                out.push_str("`\n");
            }
            // Anything else in block position renders as a bare line.
            _ => {
                self.render_inline(node, out);
                out.push('\n');
            }
        }
    }

    fn render_table(&self, table: NodeId, alignments: &[ColumnAlignment], out: &mut String) {
        let rows: Vec<NodeId> = self
            .children(table)
            .iter()
            .copied()
            .filter(|&c| self.data(c).is_row())
            .collect();
        let Some((&header, body)) = rows.split_first() else {
            return;
        };

        self.render_row(header, out);

        let columns = self
            .children(header)
            .iter()
            .filter(|&&c| self.data(c).is_cell())
            .count();
        out.push('|');
        for k in 0..columns {
            let sep = match alignments.get(k).copied().unwrap_or(ColumnAlignment::None) {
                ColumnAlignment::None => "---",
                ColumnAlignment::Left => ":---",
                ColumnAlignment::Center => ":---:",
                ColumnAlignment::Right => "---:",
            };
            out.push(' ');
            out.push_str(sep);
            out.push_str(" |");
        }
        out.push('\n');

        for &row in body {
            self.render_row(row, out);
        }
    }

    fn render_row(&self, row: NodeId, out: &mut String) {
        out.push('|');
        for &child in self.children(row) {
            if !self.data(child).is_cell() {
                continue;
            }
            // Cell whitespace is insignificant in the source, so keep the
            // rendered form trimmed too.
            let mut content = String::new();
            match self.data(child) {
                NodeData::Placeholder(ph) => {
                    content.push('`');
                    content.push_str(&ph.text);
                    content.push('`');
                }
                _ => self.render_inlines(child, &mut content),
            }
            out.push(' ');
            out.push_str(content.trim());
            out.push_str(" |");
        }
        out.push('\n');
    }

    fn render_inlines(&self, parent: NodeId, out: &mut String) {
        for &child in self.children(parent) {
            self.render_inline(child, out);
        }
    }

    fn render_inline(&self, node: NodeId, out: &mut String) {
        match self.data(node) {
            NodeData::Text(s) => out.push_str(s),
            NodeData::CodeSpan(s) => {
                out.push('`');
                out.push_str(s);
                out.push('`');
            }
            NodeData::Placeholder(ph) => {
                out.push('`');
                out.push_str(&ph.text);
                out.push('`');
            }
            NodeData::Strong => {
                out.push_str("**");
                self.render_inlines(node, out);
                out.push_str("**");
            }
            NodeData::Emphasis => {
                out.push('*');
                self.render_inlines(node, out);
                out.push('*');
            }
            NodeData::Strikethrough => {
                out.push_str("~~");
                self.render_inlines(node, out);
                out.push_str("~~");
            }
            NodeData::Link { dest, .. } => {
                out.push('[');
                self.render_inlines(node, out);
                out.push_str("](");
                out.push_str(dest);
                out.push(')');
            }
            NodeData::Image { dest, .. } => {
                out.push_str("![");
                self.render_inlines(node, out);
                out.push_str("](");
                out.push_str(dest);
                out.push(')');
            }
            NodeData::SoftBreak | NodeData::HardBreak => out.push('\n'),
            _ => {}
        }
    }
}
