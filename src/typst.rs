use crate::block::{Block, List, Span};
use crate::css::Stylesheet;

/// Lists with more items than this may break across pages.
const UNBREAKABLE_LIST_ITEMS: usize = 5;
/// Code blocks with more lines than this may break across pages.
const UNBREAKABLE_CODE_LINES: usize = 30;
/// Tables with more body rows than this may break across pages.
const UNBREAKABLE_TABLE_ROWS: usize = 12;

/// Builds the Typst source of a whole document.
pub struct MarkupWriter {
    out: String,
    toc_level: u8,
    sections: usize,
}

impl MarkupWriter {
    /// Headings deeper than `toc_level` are rendered but left out of the outline.
    pub fn new(toc_level: u8) -> Self {
        Self {
            out: String::new(),
            toc_level,
            sections: 0,
        }
    }

    /// Document metadata and global styles. Must come before any section.
    pub fn preamble(&mut self, title: &str, author: &str, stylesheet: Option<&Stylesheet>) {
        self.out.push_str(&format!(
            "#set document(title: {}, author: {})\n",
            quote_str(title),
            quote_str(author)
        ));
        self.out.push_str("#set page(numbering: \"1\")\n");
        // Set up paragraph settings to prevent widows/orphans
        self.out.push_str("#set par(linebreaks: \"optimized\")\n");
        if let Some(stylesheet) = stylesheet {
            self.out.push_str(&stylesheet.to_typst());
        }
        self.out.push('\n');
    }

    /// Append one section. Every section after the first starts on a new page.
    pub fn section(&mut self, blocks: &[Block]) {
        if self.sections > 0 {
            self.out.push_str("#pagebreak(weak: true)\n\n");
        }
        self.sections += 1;
        self.blocks(blocks);
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn blocks(&mut self, blocks: &[Block]) {
        let mut i = 0;
        while i < blocks.len() {
            let block = &blocks[i];

            match block {
                Block::Heading { .. } => {
                    // Keep heading with following content using a block that prevents breaks
                    let next = blocks.get(i + 1).filter(|next| keeps_with_heading(next));
                    self.out.push_str("#block(breakable: false)[\n");
                    self.block(block);
                    if let Some(next) = next {
                        self.block(next);
                        i += 1;
                    }
                    self.out.push_str("]\n\n");
                }
                _ => self.block(block),
            }

            i += 1;
        }
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading { level, content } => self.heading(*level, content),
            Block::Paragraph { content } => {
                self.spans(content);
                self.out.push_str("\n\n");
            }
            Block::CodeBlock { language, content } => {
                let small = content.lines().count() <= UNBREAKABLE_CODE_LINES;
                if small {
                    self.out.push_str("#block(breakable: false)[\n");
                }
                self.out.push_str("#raw(block: true, ");
                if let Some(lang) = language {
                    self.out.push_str(&format!("lang: {}, ", quote_str(lang)));
                }
                self.out
                    .push_str(&quote_str(content.strip_suffix('\n').unwrap_or(content)));
                self.out.push_str(")\n");
                if small {
                    self.out.push_str("]\n");
                }
                self.out.push('\n');
            }
            Block::Quote(inner) => {
                self.out.push_str("#quote(block: true)[\n");
                self.blocks(inner);
                self.out.push_str("]\n\n");
            }
            Block::List(list) => {
                // Wrap list to keep together when small, allow breaks when large
                if fits_unbroken(list) {
                    self.out.push_str("#block(breakable: false)[\n");
                    self.list(list, 0);
                    self.out.push_str("]\n\n");
                } else {
                    self.list(list, 0);
                    self.out.push('\n');
                }
            }
            Block::Table { headers, rows } => {
                if rows.len() <= UNBREAKABLE_TABLE_ROWS {
                    self.out.push_str("#block(breakable: false)[\n");
                    self.table(headers, rows);
                    self.out.push_str("]\n\n");
                } else {
                    self.table(headers, rows);
                    self.out.push('\n');
                }
            }
            Block::Rule => self.out.push_str("#line(length: 100%)\n\n"),
            Block::PageBreak => self.out.push_str("#pagebreak()\n\n"),
        }
    }

    fn heading(&mut self, level: u8, content: &[Span]) {
        if level <= self.toc_level {
            for _ in 0..level {
                self.out.push('=');
            }
            self.out.push(' ');
            self.spans(content);
            self.out.push_str("\n\n");
        } else {
            self.out
                .push_str(&format!("#heading(level: {level}, outlined: false)["));
            self.spans(content);
            self.out.push_str("]\n\n");
        }
    }

    fn spans(&mut self, spans: &[Span]) {
        for span in spans {
            self.span(span);
        }
    }

    fn span(&mut self, span: &Span) {
        match span {
            Span::Text(text) => escape_markup(text, &mut self.out),
            // Function calls instead of `*`/`_`, which only work at word boundaries
            Span::Bold(inner) => {
                self.out.push_str("#strong[");
                self.spans(inner);
                self.out.push_str("];");
            }
            Span::Italic(inner) => {
                self.out.push_str("#emph[");
                self.spans(inner);
                self.out.push_str("];");
            }
            Span::Strike(inner) => {
                self.out.push_str("#strike[");
                self.spans(inner);
                self.out.push_str("];");
            }
            Span::Code(text) => {
                // The semicolon ends the embedded expression before any following text
                self.out.push_str(&format!("#raw({});", quote_str(text)));
            }
            Span::Link { url, content } => {
                self.out.push_str(&format!("#link({})[", quote_str(url)));
                self.spans(content);
                self.out.push_str("];");
            }
            Span::LineBreak => self.out.push_str("#linebreak();"),
        }
    }

    fn list(&mut self, list: &List, indent: usize) {
        let prefix = if list.ordered { "+" } else { "-" };
        let indent_str = "  ".repeat(indent);

        for item in &list.items {
            self.out.push_str(&indent_str);
            self.out.push_str(prefix);
            self.out.push(' ');
            match item.checked {
                Some(true) => self.out.push_str("☑ "),
                Some(false) => self.out.push_str("☐ "),
                None => {}
            }
            self.spans(&item.content);
            self.out.push('\n');

            if !item.blocks.is_empty() {
                // Lines indented past the marker stay inside the item
                let mut inner = MarkupWriter::new(self.toc_level);
                inner.blocks(&item.blocks);
                let body_indent = "  ".repeat(indent + 1);
                for line in inner.finish().lines() {
                    if !line.is_empty() {
                        self.out.push_str(&body_indent);
                        self.out.push_str(line);
                    }
                    self.out.push('\n');
                }
            }

            if let Some(nested) = &item.nested {
                self.list(nested, indent + 1);
            }
        }
    }

    fn table(&mut self, headers: &[Vec<Span>], rows: &[Vec<Vec<Span>>]) {
        let col_count = headers.len();
        if col_count == 0 {
            return;
        }

        self.out.push_str("#table(\n");
        self.out.push_str(&format!("  columns: {col_count},\n"));

        // Header cells (bold)
        self.out.push_str("  table.header(");
        for cell in headers {
            self.out.push_str("strong[");
            self.spans(cell);
            self.out.push_str("], ");
        }
        self.out.push_str("),\n");

        for row in rows {
            for cell in row {
                self.out.push_str("  [");
                self.spans(cell);
                self.out.push_str("],\n");
            }
        }

        self.out.push_str(")\n");
    }
}

fn keeps_with_heading(block: &Block) -> bool {
    match block {
        Block::Heading { .. } | Block::PageBreak => false,
        Block::CodeBlock { content, .. } => content.lines().count() <= UNBREAKABLE_CODE_LINES,
        Block::List(list) => fits_unbroken(list),
        Block::Table { rows, .. } => rows.len() <= UNBREAKABLE_TABLE_ROWS,
        _ => true,
    }
}

/// Small lists of plain items are kept on one page.
fn fits_unbroken(list: &List) -> bool {
    count_list_items(list) <= UNBREAKABLE_LIST_ITEMS && !has_item_blocks(list)
}

fn count_list_items(list: &List) -> usize {
    let mut count = list.items.len();
    for item in &list.items {
        if let Some(nested) = &item.nested {
            count += count_list_items(nested);
        }
    }
    count
}

fn has_item_blocks(list: &List) -> bool {
    list.items.iter().any(|item| {
        !item.blocks.is_empty() || item.nested.as_deref().is_some_and(has_item_blocks)
    })
}

/// Escape text so Typst markup renders it literally.
fn escape_markup(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '#' | '*' | '_' | '@' | '$' | '\\' | '`' | '<' | '>' | '[' | ']' | '=' | '-' | '+'
            | '/' | '~' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

/// Typst string literal for `value`.
pub(crate) fn quote_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn blocks_to_typst(blocks: &[Block], toc_level: u8) -> String {
        let mut writer = MarkupWriter::new(toc_level);
        writer.section(blocks);
        writer.finish()
    }

    fn markup(md: &str) -> String {
        blocks_to_typst(&parse(md), 6)
    }

    #[test]
    fn heading() {
        assert_eq!(markup("# Hello"), "#block(breakable: false)[\n= Hello\n\n]\n\n");
    }

    #[test]
    fn heading_with_following_content() {
        // Heading should be grouped with following paragraph
        let result = markup("# Title\n\nSome text.");
        assert_eq!(result, "#block(breakable: false)[\n= Title\n\nSome text.\n\n]\n\n");
    }

    #[test]
    fn heading_does_not_swallow_next_heading() {
        let result = markup("# One\n## Two");
        assert_eq!(
            result,
            "#block(breakable: false)[\n= One\n\n]\n\n#block(breakable: false)[\n== Two\n\n]\n\n"
        );
    }

    #[test]
    fn headings_below_toc_level_are_not_outlined() {
        let result = blocks_to_typst(&parse("## Kept\n\n### Hidden"), 2);
        assert!(result.contains("== Kept\n"));
        assert!(result.contains("#heading(level: 3, outlined: false)[Hidden]"));
    }

    #[test]
    fn bold_and_italic() {
        assert_eq!(markup("**bold**"), "#strong[bold];\n\n");
        assert_eq!(markup("*italic*"), "#emph[italic];\n\n");
        assert_eq!(markup("***both***"), "#emph[#strong[both];];\n\n");
        assert_eq!(markup("~~gone~~"), "#strike[gone];\n\n");
    }

    #[test]
    fn emphasis_touching_letters() {
        assert_eq!(markup("**API**s"), "#strong[API];s\n\n");
        assert_eq!(markup("*foo*bar"), "#emph[foo];bar\n\n");
        assert_eq!(markup("foo**bar**"), "foo#strong[bar];\n\n");
    }

    #[test]
    fn inline_code_is_a_raw_call() {
        assert_eq!(markup("`a \"b\"`.x"), "#raw(\"a \\\"b\\\"\");.x\n\n");
    }

    #[test]
    fn code_block() {
        assert_eq!(
            markup("```rust\nlet x = 1;\n```"),
            "#block(breakable: false)[\n#raw(block: true, lang: \"rust\", \"let x = 1;\")\n]\n\n"
        );
    }

    #[test]
    fn long_code_block_may_break() {
        let body = "x\n".repeat(UNBREAKABLE_CODE_LINES + 1);
        let result = markup(&format!("```\n{body}```"));
        assert!(result.starts_with("#raw(block: true, \"x\\nx"));
    }

    #[test]
    fn link() {
        assert_eq!(
            markup("[site](https://example.com)"),
            "#link(\"https://example.com\")[site];\n\n"
        );
    }

    #[test]
    fn unordered_list() {
        assert_eq!(
            markup("- one\n- two"),
            "#block(breakable: false)[\n- one\n- two\n]\n\n"
        );
    }

    #[test]
    fn ordered_list() {
        assert_eq!(
            markup("1. one\n2. two"),
            "#block(breakable: false)[\n+ one\n+ two\n]\n\n"
        );
    }

    #[test]
    fn task_list() {
        assert_eq!(
            markup("- [x] done\n- [ ] todo"),
            "#block(breakable: false)[\n- ☑ done\n- ☐ todo\n]\n\n"
        );
    }

    #[test]
    fn code_block_stays_inside_its_list_item() {
        let result = markup("- item\n\n  ```\n  code\n  ```\n- two\n");
        assert_eq!(
            result,
            concat!(
                "- item\n",
                "  #block(breakable: false)[\n",
                "  #raw(block: true, \"code\")\n",
                "  ]\n",
                "\n",
                "- two\n",
                "\n",
            )
        );
    }

    #[test]
    fn hard_break() {
        assert_eq!(markup("line one  \nline two"), "line one#linebreak();line two\n\n");
    }

    #[test]
    fn escapes_special_chars() {
        assert_eq!(markup("a * b"), "a \\* b\n\n");
        assert_eq!(markup("a # b"), "a \\# b\n\n");
        assert_eq!(markup("a_b"), "a\\_b\n\n");
        assert_eq!(markup("see a/b -- c"), "see a\\/b \\-\\- c\n\n");
    }

    #[test]
    fn block_quote() {
        assert_eq!(markup("> note"), "#quote(block: true)[\nnote\n\n]\n\n");
    }

    #[test]
    fn table() {
        let md = "| A | B |\n|---|---|\n| 1 | 2 |";
        let expected = "#block(breakable: false)[\n#table(\n  columns: 2,\n  table.header(strong[A], strong[B], ),\n  [1],\n  [2],\n)\n]\n\n";
        assert_eq!(markup(md), expected);
    }

    #[test]
    fn horizontal_rule() {
        assert_eq!(markup("---"), "#line(length: 100%)\n\n");
    }

    #[test]
    fn sections_are_separated_by_page_breaks() {
        let mut writer = MarkupWriter::new(6);
        writer.section(&parse("one"));
        writer.section(&parse("two"));
        assert_eq!(writer.finish(), "one\n\n#pagebreak(weak: true)\n\ntwo\n\n");
    }

    #[test]
    fn preamble_sets_metadata_and_styles() {
        let mut writer = MarkupWriter::new(6);
        let sheet = Stylesheet::parse("body { color: red }");
        writer.preamble("Doc \"1\"", "Me", Some(&sheet));
        let out = writer.finish();
        assert!(out.starts_with("#set document(title: \"Doc \\\"1\\\"\", author: \"Me\")\n"));
        assert!(out.contains("#set text(fill: rgb(\"#ff0000\"))\n"));
    }

    #[test]
    fn quote_str_escapes() {
        assert_eq!(quote_str("a\\b\"c\n"), "\"a\\\\b\\\"c\\n\"");
    }
}
