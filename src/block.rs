/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Text(String),
    Bold(Vec<Span>),
    Italic(Vec<Span>),
    Strike(Vec<Span>),
    Code(String),
    Link { url: String, content: Vec<Span> },
    LineBreak,
}

impl Span {
    /// Text of the span with all formatting dropped.
    pub fn plain_text(spans: &[Span]) -> String {
        let mut out = String::new();
        for span in spans {
            match span {
                Span::Text(text) | Span::Code(text) => out.push_str(text),
                Span::Bold(inner) | Span::Italic(inner) | Span::Strike(inner) => {
                    out.push_str(&Span::plain_text(inner))
                }
                Span::Link { content, .. } => out.push_str(&Span::plain_text(content)),
                Span::LineBreak => out.push(' '),
            }
        }
        out
    }
}

/// A single list item, which can contain nested content
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub content: Vec<Span>,
    /// Code blocks, quotes and later paragraphs of the item, in source order
    pub blocks: Vec<Block>,
    pub nested: Option<Box<List>>,
    /// None for plain items, Some(done) for task list items
    pub checked: Option<bool>,
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

/// Block-level elements parsed from Markdown
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    CodeBlock {
        language: Option<String>,
        content: String,
    },
    Quote(Vec<Block>),
    List(List),
    Table {
        headers: Vec<Vec<Span>>,
        rows: Vec<Vec<Vec<Span>>>,
    },
    Rule,
    PageBreak,
}
