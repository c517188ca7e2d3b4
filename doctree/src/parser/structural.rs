use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::node::{ColumnAlignment, ListKind, NodeData, Placeholder, PlaceholderFlavor};
use crate::tree::{Document, NodeId};

/// Parse Markdown source into children of `root`.
///
/// Inline code spans whose content starts with `@` become placeholder
/// nodes. A paragraph or table cell consisting of exactly one placeholder
/// collapses into a block-level or cell-level placeholder respectively;
/// every other placeholder is inline-run-level.
pub(crate) fn parse_into(doc: &mut Document, root: NodeId, source: &str, file_id: usize) {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut builder = Builder { doc, file_id };
    let mut i = 0;
    builder.collect_blocks(&events, &mut i, root, BlockEnd::None);
    log::debug!("parsed {} bytes into section {:?}", source.len(), root);
}

/// Which End tag terminates the current block container.
#[derive(Clone, Copy)]
enum BlockEnd {
    None,
    Item,
    Quote,
}

impl BlockEnd {
    fn matches(self, end: &TagEnd) -> bool {
        match self {
            BlockEnd::None => false,
            BlockEnd::Item => matches!(end, TagEnd::Item),
            BlockEnd::Quote => matches!(end, TagEnd::BlockQuote(_)),
        }
    }
}

struct Builder<'d> {
    doc: &'d mut Document,
    file_id: usize,
}

impl Builder<'_> {
    /// Parse block-level content into `parent` until the matching End tag
    /// (or the end of input).
    fn collect_blocks(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        parent: NodeId,
        end: BlockEnd,
    ) {
        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(tag_end) if end.matches(tag_end) => {
                    *i += 1;
                    return;
                }

                Event::Start(Tag::Paragraph) => {
                    *i += 1;
                    let para = self.doc.create(NodeData::Paragraph);
                    self.collect_inlines(events, i, para, &|e| matches!(e, TagEnd::Paragraph));
                    self.attach_block(parent, para);
                }

                Event::Start(Tag::Heading { level, .. }) => {
                    let level = heading_level_to_u8(level);
                    *i += 1;
                    let heading = self.doc.create(NodeData::Heading { level });
                    self.doc.append_child(parent, heading);
                    self.collect_inlines(events, i, heading, &|e| {
                        matches!(e, TagEnd::Heading(_))
                    });
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let language = match kind {
                        pulldown_cmark::CodeBlockKind::Fenced(lang) => {
                            let lang = lang.to_string();
                            if lang.is_empty() { None } else { Some(lang) }
                        }
                        pulldown_cmark::CodeBlockKind::Indented => None,
                    };
                    *i += 1;
                    let content =
                        collect_text_until(events, i, |e| matches!(e, TagEnd::CodeBlock));
                    let node = self.doc.create(NodeData::CodeBlock { language, content });
                    self.doc.append_child(parent, node);
                }

                Event::Start(Tag::BlockQuote(_)) => {
                    *i += 1;
                    let quote = self.doc.create(NodeData::BlockQuote);
                    self.doc.append_child(parent, quote);
                    self.collect_blocks(events, i, quote, BlockEnd::Quote);
                }

                Event::Start(Tag::List(start)) => {
                    let kind = match start {
                        Some(n) => ListKind::Ordered { start: *n },
                        None => ListKind::Bullet,
                    };
                    *i += 1;
                    self.list(events, i, parent, kind);
                }

                Event::Start(Tag::Table(alignments)) => {
                    let alignments: Vec<ColumnAlignment> = alignments
                        .iter()
                        .map(|a| match a {
                            pulldown_cmark::Alignment::None => ColumnAlignment::None,
                            pulldown_cmark::Alignment::Left => ColumnAlignment::Left,
                            pulldown_cmark::Alignment::Center => ColumnAlignment::Center,
                            pulldown_cmark::Alignment::Right => ColumnAlignment::Right,
                        })
                        .collect();
                    *i += 1;
                    self.table(events, i, parent, alignments);
                }

                Event::Rule => {
                    let node = self.doc.create(NodeData::Rule);
                    self.doc.append_child(parent, node);
                    *i += 1;
                }

                // Bare inline content (tight list items): wrap in an
                // implicit paragraph.
                _ if is_inline_event(ev) => {
                    self.implicit_paragraph(events, i, parent);
                }

                _ => {
                    *i += 1;
                }
            }
        }
    }

    fn list(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        parent: NodeId,
        kind: ListKind,
    ) {
        let list = self.doc.create(NodeData::List(kind));
        self.doc.append_child(parent, list);

        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(TagEnd::List(_)) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::Item) => {
                    *i += 1;
                    let item = self.doc.create(NodeData::ListItem);
                    self.doc.append_child(list, item);
                    self.collect_blocks(events, i, item, BlockEnd::Item);
                }
                _ => {
                    *i += 1;
                }
            }
        }
    }

    fn table(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        parent: NodeId,
        alignments: Vec<ColumnAlignment>,
    ) {
        let table = self.doc.create(NodeData::Table { alignments });
        self.doc.append_child(parent, table);

        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(TagEnd::Table) => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::TableHead) => {
                    *i += 1;
                    self.table_row(events, i, table, true);
                }
                Event::Start(Tag::TableRow) => {
                    *i += 1;
                    self.table_row(events, i, table, false);
                }
                _ => {
                    *i += 1;
                }
            }
        }
    }

    fn table_row(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        table: NodeId,
        head: bool,
    ) {
        let row = self.doc.create(NodeData::TableRow);
        self.doc.append_child(table, row);

        while *i < events.len() {
            let (ref ev, _) = events[*i];
            match ev {
                Event::End(TagEnd::TableHead) if head => {
                    *i += 1;
                    break;
                }
                Event::End(TagEnd::TableRow) if !head => {
                    *i += 1;
                    break;
                }
                Event::Start(Tag::TableCell) => {
                    *i += 1;
                    let cell = self.doc.create(NodeData::TableCell);
                    self.collect_inlines(events, i, cell, &|e| matches!(e, TagEnd::TableCell));
                    self.attach_cell(row, cell);
                }
                _ => {
                    *i += 1;
                }
            }
        }
    }

    /// Collect inline nodes into `parent` until a matching End tag.
    fn collect_inlines(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        parent: NodeId,
        is_end: &dyn Fn(&TagEnd) -> bool,
    ) {
        while *i < events.len() {
            if let (Event::End(tag_end), _) = &events[*i] {
                if is_end(tag_end) {
                    *i += 1;
                    break;
                }
            }
            if !self.inline_event(events, i, parent) {
                *i += 1;
            }
        }
    }

    /// Bare inline events at block level get an implicit paragraph.
    fn implicit_paragraph(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        parent: NodeId,
    ) {
        let para = self.doc.create(NodeData::Paragraph);
        while *i < events.len() {
            if !self.inline_event(events, i, para) {
                break;
            }
        }
        self.attach_block(parent, para);
    }

    /// Process one inline-level event into `parent`. Returns false
    /// (without consuming) when the event is not inline-level.
    fn inline_event(
        &mut self,
        events: &[(Event<'_>, Range<usize>)],
        i: &mut usize,
        parent: NodeId,
    ) -> bool {
        let (ref ev, ref range) = events[*i];
        match ev {
            Event::Text(s) => {
                let node = self.doc.create(NodeData::Text(s.to_string()));
                self.doc.append_child(parent, node);
                *i += 1;
            }
            Event::Code(s) => {
                self.code_span(parent, s, range.clone());
                *i += 1;
            }
            Event::SoftBreak => {
                let node = self.doc.create(NodeData::SoftBreak);
                self.doc.append_child(parent, node);
                *i += 1;
            }
            Event::HardBreak => {
                let node = self.doc.create(NodeData::HardBreak);
                self.doc.append_child(parent, node);
                *i += 1;
            }
            Event::Start(Tag::Strong) => {
                *i += 1;
                let node = self.doc.create(NodeData::Strong);
                self.doc.append_child(parent, node);
                self.collect_inlines(events, i, node, &|e| matches!(e, TagEnd::Strong));
            }
            Event::Start(Tag::Emphasis) => {
                *i += 1;
                let node = self.doc.create(NodeData::Emphasis);
                self.doc.append_child(parent, node);
                self.collect_inlines(events, i, node, &|e| matches!(e, TagEnd::Emphasis));
            }
            Event::Start(Tag::Strikethrough) => {
                *i += 1;
                let node = self.doc.create(NodeData::Strikethrough);
                self.doc.append_child(parent, node);
                self.collect_inlines(events, i, node, &|e| matches!(e, TagEnd::Strikethrough));
            }
            Event::Start(Tag::Link { dest_url, title, .. }) => {
                let dest = dest_url.to_string();
                let title = title.to_string();
                *i += 1;
                let node = self.doc.create(NodeData::Link { dest, title });
                self.doc.append_child(parent, node);
                self.collect_inlines(events, i, node, &|e| matches!(e, TagEnd::Link));
            }
            Event::Start(Tag::Image { dest_url, title, .. }) => {
                let dest = dest_url.to_string();
                let title = title.to_string();
                *i += 1;
                let node = self.doc.create(NodeData::Image { dest, title });
                self.doc.append_child(parent, node);
                self.collect_inlines(events, i, node, &|e| matches!(e, TagEnd::Image));
            }
            _ => return false,
        }
        true
    }

    /// A code span starting with `@` is a placeholder; anything else is
    /// literal code.
    fn code_span(&mut self, parent: NodeId, content: &str, span: Range<usize>) {
        let trimmed = content.trim();
        let node = if trimmed.starts_with('@') {
            self.doc.create(NodeData::Placeholder(Placeholder {
                text: trimmed.to_string(),
                flavor: PlaceholderFlavor::Inline,
                span,
                source_id: self.file_id,
            }))
        } else {
            self.doc.create(NodeData::CodeSpan(content.to_string()))
        };
        self.doc.append_child(parent, node);
    }

    /// Attach a finished paragraph, collapsing a lone placeholder child
    /// into a block-level placeholder.
    fn attach_block(&mut self, parent: NodeId, para: NodeId) {
        if let Some(ph) = self.lone_placeholder(para) {
            self.doc.remove(ph);
            if let NodeData::Placeholder(p) = self.doc.data_mut(ph) {
                p.flavor = PlaceholderFlavor::Block;
            }
            self.doc.append_child(parent, ph);
        } else {
            self.doc.append_child(parent, para);
        }
    }

    /// Attach a finished cell, collapsing a lone placeholder child into a
    /// cell-level placeholder that occupies the column slot itself.
    fn attach_cell(&mut self, row: NodeId, cell: NodeId) {
        if let Some(ph) = self.lone_placeholder(cell) {
            self.doc.remove(ph);
            if let NodeData::Placeholder(p) = self.doc.data_mut(ph) {
                p.flavor = PlaceholderFlavor::Cell;
            }
            self.doc.append_child(row, ph);
        } else {
            self.doc.append_child(row, cell);
        }
    }

    fn lone_placeholder(&self, container: NodeId) -> Option<NodeId> {
        match self.doc.children(container) {
            [only] if self.doc.data(*only).is_placeholder() => Some(*only),
            _ => None,
        }
    }
}

fn is_inline_event(ev: &Event<'_>) -> bool {
    matches!(
        ev,
        Event::Text(_)
            | Event::Code(_)
            | Event::SoftBreak
            | Event::HardBreak
            | Event::Start(
                Tag::Strong
                    | Tag::Emphasis
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. }
            )
    )
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Collect all text content until a matching End tag.
fn collect_text_until(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    while *i < events.len() {
        let (ref ev, _) = events[*i];
        match ev {
            Event::End(tag_end) if is_end(tag_end) => {
                *i += 1;
                break;
            }
            Event::Text(s) => {
                text.push_str(s);
                *i += 1;
            }
            _ => {
                *i += 1;
            }
        }
    }
    text
}
