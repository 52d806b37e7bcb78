use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::block::{Block, List, ListItem, Span};

/// Paragraph text that forces a page break.
const PAGE_BREAK_MARKER: &str = "---pagebreak---";

/// Parse markdown text into a list of blocks
pub fn parse(markdown: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut builder = BlockBuilder::new();
    for event in Parser::new_ext(markdown, options) {
        builder.handle(event);
    }
    builder.finish()
}

#[derive(Default)]
struct BlockBuilder {
    // Finished blocks; the last entry is the innermost open block quote
    containers: Vec<Vec<Block>>,

    // Inline content of the element currently open
    spans: Vec<Span>,
    // Parents of the spans being collected inside bold/italic/links
    span_stack: Vec<Vec<Span>>,
    link_urls: Vec<String>,

    heading_level: Option<u8>,

    code: Option<CodeBuffer>,
    html: Option<String>,

    lists: Vec<ListBuilder>,

    table: Option<TableBuilder>,
}

struct CodeBuffer {
    language: Option<String>,
    content: String,
}

struct ListBuilder {
    ordered: bool,
    // Number of open containers when the list started
    depth: usize,
    items: Vec<ListItem>,
    item_spans: Vec<Span>,
    item_blocks: Vec<Block>,
    item_checked: Option<bool>,
    item_nested: Option<Box<List>>,
}

impl ListBuilder {
    fn push_block(&mut self, block: Block) {
        // A nested list that came first stays ahead of the block
        if let Some(nested) = self.item_nested.take() {
            self.item_blocks.push(Block::List(*nested));
        }
        self.item_blocks.push(block);
    }

    fn attach_list(&mut self, list: List) {
        if self.item_blocks.is_empty() && self.item_nested.is_none() {
            self.item_nested = Some(Box::new(list));
        } else {
            self.push_block(Block::List(list));
        }
    }

    /// Paragraph text joins the item line until the item has block content.
    fn push_paragraph(&mut self, content: Vec<Span>) {
        if content.is_empty() {
            return;
        }
        if self.item_blocks.is_empty() && self.item_nested.is_none() {
            push_item_spans(&mut self.item_spans, content);
        } else {
            self.push_block(Block::Paragraph { content });
        }
    }
}

#[derive(Default)]
struct TableBuilder {
    headers: Vec<Vec<Span>>,
    rows: Vec<Vec<Vec<Span>>>,
    row: Vec<Vec<Span>>,
    in_head: bool,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            containers: vec![Vec::new()],
            ..Self::default()
        }
    }

    fn finish(mut self) -> Vec<Block> {
        // Unbalanced quotes cannot come out of pulldown-cmark, but fold them anyway
        while self.containers.len() > 1 {
            self.close_quote();
        }
        self.containers.pop().unwrap_or_default()
    }

    /// List whose open item receives blocks at the current nesting.
    fn open_item(&mut self) -> Option<&mut ListBuilder> {
        let depth = self.containers.len();
        self.lists.last_mut().filter(|list| list.depth == depth)
    }

    /// Text of a tight item arrives without a paragraph; settle it before a block opens.
    fn flush_item_text(&mut self) {
        if self.spans.is_empty() || !self.span_stack.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.spans);
        match self.open_item() {
            Some(list) => list.push_paragraph(pending),
            None => self.spans = pending,
        }
    }

    fn emit(&mut self, block: Block) {
        if let Some(list) = self.open_item() {
            list.push_block(block);
        } else if let Some(container) = self.containers.last_mut() {
            container.push(block);
        }
    }

    fn open_inline(&mut self) {
        self.span_stack.push(std::mem::take(&mut self.spans));
    }

    fn close_inline(&mut self, wrap: impl FnOnce(Vec<Span>) -> Span) {
        let inner = std::mem::take(&mut self.spans);
        if let Some(parent) = self.span_stack.pop() {
            self.spans = parent;
        }
        self.spans.push(wrap(inner));
    }

    fn close_quote(&mut self) {
        if self.containers.len() > 1 {
            let inner = self.containers.pop().unwrap_or_default();
            self.emit(Block::Quote(inner));
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),

            Event::Text(text) => match self.code.as_mut() {
                Some(code) => code.content.push_str(&text),
                None => self.spans.push(Span::Text(text.into_string())),
            },
            Event::Code(code) => self.spans.push(Span::Code(code.into_string())),
            Event::Html(html) => match self.html.as_mut() {
                Some(buffer) => buffer.push_str(&html),
                None => log::debug!("dropping stray HTML `{}`", html.trim()),
            },
            Event::InlineHtml(html) => {
                if is_line_break_tag(&html) {
                    self.spans.push(Span::LineBreak);
                } else {
                    // Text between inline tags arrives as ordinary text events
                    log::debug!("dropping inline HTML tag `{html}`");
                }
            }
            Event::SoftBreak => self.spans.push(Span::Text(" ".to_string())),
            Event::HardBreak => self.spans.push(Span::LineBreak),
            Event::Rule => {
                self.flush_item_text();
                self.emit(Block::Rule);
            }
            Event::TaskListMarker(checked) => {
                if let Some(list) = self.lists.last_mut() {
                    list.item_checked = Some(checked);
                }
            }

            // Footnotes and math have no PDF counterpart
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        if matches!(
            tag,
            Tag::Heading { .. }
                | Tag::BlockQuote(_)
                | Tag::CodeBlock(_)
                | Tag::HtmlBlock
                | Tag::List(_)
                | Tag::Table(_)
        ) {
            self.flush_item_text();
        }

        match tag {
            Tag::Heading { level, .. } => self.heading_level = Some(heading_level_to_u8(level)),
            Tag::BlockQuote(_) => self.containers.push(Vec::new()),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split(|c: char| c.is_whitespace() || c == ',')
                        .next()
                        .filter(|lang| !lang.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBuffer {
                    language,
                    content: String::new(),
                });
            }
            Tag::HtmlBlock => self.html = Some(String::new()),
            Tag::List(first_number) => {
                let depth = self.containers.len();
                self.lists.push(ListBuilder {
                    ordered: first_number.is_some(),
                    depth,
                    items: Vec::new(),
                    item_spans: Vec::new(),
                    item_blocks: Vec::new(),
                    item_checked: None,
                    item_nested: None,
                });
            }
            Tag::Item => {
                if let Some(list) = self.lists.last_mut() {
                    list.item_spans.clear();
                    list.item_blocks.clear();
                    list.item_checked = None;
                    list.item_nested = None;
                }
            }
            Tag::Table(_) => self.table = Some(TableBuilder::default()),
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                    table.row.clear();
                }
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::TableCell => self.spans.clear(),
            Tag::Strong | Tag::Emphasis | Tag::Strikethrough | Tag::Image { .. } => {
                self.open_inline()
            }
            Tag::Link { dest_url, .. } => {
                self.link_urls.push(dest_url.into_string());
                self.open_inline();
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                if let Some(level) = self.heading_level.take() {
                    let content = std::mem::take(&mut self.spans);
                    self.emit(Block::Heading { level, content });
                }
            }
            TagEnd::Paragraph => self.end_paragraph(),
            TagEnd::BlockQuote(_) => self.close_quote(),
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    self.emit(Block::CodeBlock {
                        language: code.language,
                        content: code.content,
                    });
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html.take() {
                    let text = strip_tags(&html);
                    if text.is_empty() {
                        log::debug!("dropping HTML block without text");
                    } else {
                        self.emit(Block::Paragraph {
                            content: vec![Span::Text(text)],
                        });
                    }
                }
            }
            TagEnd::List(_) => {
                if let Some(builder) = self.lists.pop() {
                    let list = List {
                        ordered: builder.ordered,
                        items: builder.items,
                    };
                    match self.open_item() {
                        Some(parent) => parent.attach_list(list),
                        None => self.emit(Block::List(list)),
                    }
                }
            }
            TagEnd::Item => {
                let remaining = std::mem::take(&mut self.spans);
                if let Some(list) = self.lists.last_mut() {
                    list.push_paragraph(remaining);
                    list.items.push(ListItem {
                        content: std::mem::take(&mut list.item_spans),
                        blocks: std::mem::take(&mut list.item_blocks),
                        nested: list.item_nested.take(),
                        checked: list.item_checked.take(),
                    });
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.emit(Block::Table {
                        headers: table.headers,
                        rows: table.rows,
                    });
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                    table.headers = std::mem::take(&mut table.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    if !table.in_head {
                        let row = std::mem::take(&mut table.row);
                        table.rows.push(row);
                    }
                }
            }
            TagEnd::TableCell => {
                let cell = std::mem::take(&mut self.spans);
                if let Some(table) = self.table.as_mut() {
                    table.row.push(cell);
                }
            }
            TagEnd::Strong => self.close_inline(Span::Bold),
            TagEnd::Emphasis => self.close_inline(Span::Italic),
            TagEnd::Strikethrough => self.close_inline(Span::Strike),
            TagEnd::Link => {
                let url = self.link_urls.pop().unwrap_or_default();
                self.close_inline(|content| Span::Link { url, content });
            }
            TagEnd::Image => {
                // Images are not embedded; their alt text stays in the flow
                let alt = std::mem::take(&mut self.spans);
                if let Some(parent) = self.span_stack.pop() {
                    self.spans = parent;
                }
                self.spans.extend(alt);
            }
            _ => {}
        }
    }

    fn end_paragraph(&mut self) {
        let content = std::mem::take(&mut self.spans);
        if content.is_empty() {
            return;
        }
        if let [Span::Text(text)] = content.as_slice() {
            if text.trim() == PAGE_BREAK_MARKER {
                self.emit(Block::PageBreak);
                return;
            }
        }
        if let Some(list) = self.open_item() {
            list.push_paragraph(content);
        } else {
            self.emit(Block::Paragraph { content });
        }
    }
}

/// Text of an HTML fragment with tags and comments removed and whitespace collapsed.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let close = if rest[open..].starts_with("<!--") {
            rest[open..].find("-->").map(|end| open + end + 3)
        } else {
            rest[open..].find('>').map(|end| open + end + 1)
        };
        match close {
            Some(close) => {
                text.push(' ');
                rest = &rest[close..];
            }
            None => {
                rest = "";
            }
        }
    }
    text.push_str(rest);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Append paragraph spans to a list item, separating loose paragraphs.
fn push_item_spans(item: &mut Vec<Span>, spans: Vec<Span>) {
    if spans.is_empty() {
        return;
    }
    if !item.is_empty() {
        item.push(Span::Text(" ".to_string()));
    }
    item.extend(spans);
}

fn is_line_break_tag(html: &str) -> bool {
    let tag: String = html
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    matches!(tag.as_str(), "<br>" | "<br/>")
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
