//! Translation of user stylesheets into Typst set and show rules.
//!
//! Typst is not an HTML engine, so only the part of CSS that has a direct
//! Typst counterpart is honored: colors, fonts, sizes, alignment, line
//! height, page geometry and a few backgrounds. Everything else is skipped
//! with a debug log so a stylesheet written for an HTML renderer still works.

use crate::typst::quote_str;

/// Parsed stylesheet, kept in source order so later rules override earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    target: Target,
    declarations: Vec<(String, String)>,
}

/// Document element a selector maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Page,
    Body,
    Paragraph,
    Heading(u8),
    Code,
    CodeBlock,
    Link,
    Table,
    Quote,
}

impl Target {
    fn from_selector(selector: &str) -> Option<Self> {
        let selector = selector.trim().to_ascii_lowercase();
        if selector == "@page" || selector.starts_with("@page ") {
            return Some(Target::Page);
        }

        let parts: Vec<&str> = selector
            .split_whitespace()
            .filter(|part| !matches!(*part, ">" | "+" | "~"))
            .collect();
        let last = parts.last()?;
        if last.starts_with(":root") {
            return Some(Target::Body);
        }
        let element = last.split(['.', '#', ':', '[']).next().unwrap_or_default();

        let target = match element {
            "html" | "body" | "*" => Target::Body,
            "p" => Target::Paragraph,
            "h1" => Target::Heading(1),
            "h2" => Target::Heading(2),
            "h3" => Target::Heading(3),
            "h4" => Target::Heading(4),
            "h5" => Target::Heading(5),
            "h6" => Target::Heading(6),
            "pre" => Target::CodeBlock,
            "code" if parts.iter().any(|part| part.starts_with("pre")) => Target::CodeBlock,
            "code" => Target::Code,
            "a" => Target::Link,
            "table" | "thead" | "tbody" | "tr" | "th" | "td" => Target::Table,
            "blockquote" => Target::Quote,
            _ => return None,
        };
        Some(target)
    }

    /// Typst selector for show rules, `None` for targets styled with plain set rules.
    fn show_selector(self) -> Option<String> {
        match self {
            Target::Page | Target::Body => None,
            Target::Paragraph => Some("par".to_string()),
            Target::Heading(level) => Some(format!("heading.where(level: {level})")),
            Target::Code => Some("raw".to_string()),
            Target::CodeBlock => Some("raw.where(block: true)".to_string()),
            Target::Link => Some("link".to_string()),
            Target::Table => Some("table".to_string()),
            Target::Quote => Some("quote".to_string()),
        }
    }
}

/// Typst arguments collected from one rule's declarations.
#[derive(Default)]
struct Translation {
    text: Vec<String>,
    par: Vec<String>,
    page: Vec<String>,
    align: Option<&'static str>,
    background: Option<String>,
    underline: Option<bool>,
    stroke: Option<String>,
}

impl Stylesheet {
    /// Parse CSS text. Malformed or unsupported parts are skipped, never rejected.
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut rules = Vec::new();
        let mut rest = css.as_str();

        while let Some(open) = rest.find('{') {
            let body_start = open + 1;
            let Some(close) = matching_brace(&rest[body_start..]).map(|i| body_start + i) else {
                log::debug!("unterminated CSS block, ignoring the rest of the stylesheet");
                break;
            };

            // Statements such as `@import url(x);` end up in front of the selector
            let prelude = rest[..open].rsplit(';').next().unwrap_or_default().trim();
            let body = &rest[body_start..close];
            rest = &rest[close + 1..];

            if body.contains('{') {
                log::debug!("skipping nested CSS block `{prelude}`");
                continue;
            }

            let declarations = parse_declarations(body);
            for selector in prelude.split(',') {
                match Target::from_selector(selector) {
                    Some(target) => rules.push(Rule {
                        target,
                        declarations: declarations.clone(),
                    }),
                    None => log::debug!("skipping unsupported CSS selector `{}`", selector.trim()),
                }
            }
        }

        Self { rules }
    }

    /// True when no selector maps onto a document element.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Typst rules equivalent to this stylesheet, one per line.
    pub fn to_typst(&self) -> String {
        let mut out = String::new();
        for rule in &self.rules {
            let translation = translate(rule);
            emit_rule(rule.target, &translation, &mut out);
        }
        out
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Offset of the `}` closing a block whose `{` was just consumed.
fn matching_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_declarations(body: &str) -> Vec<(String, String)> {
    body.split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            Some((property, value.to_string()))
        })
        .collect()
}

fn translate(rule: &Rule) -> Translation {
    let mut t = Translation::default();

    for (property, value) in &rule.declarations {
        let handled = match property.as_str() {
            "color" => push(&mut t.text, "fill", color(value)),
            "font-size" => push(&mut t.text, "size", font_size(value)),
            "font-family" => push(&mut t.text, "font", font_family(value)),
            "font-weight" => push(&mut t.text, "weight", font_weight(value)),
            "font-style" => push(&mut t.text, "style", font_style(value)),
            "line-height" => push(&mut t.par, "leading", leading(value)),
            "text-align" => match value.to_ascii_lowercase().as_str() {
                "justify" => {
                    t.par.push("justify: true".to_string());
                    true
                }
                "left" | "start" => set_align(&mut t, "left"),
                "center" => set_align(&mut t, "center"),
                "right" | "end" => set_align(&mut t, "right"),
                _ => false,
            },
            "background" | "background-color" => {
                t.background = color(value).or_else(|| value.split_whitespace().find_map(color));
                t.background.is_some()
            }
            "margin" if rule.target == Target::Page => push(&mut t.page, "margin", margin(value)),
            "size" if rule.target == Target::Page => page_size(value, &mut t.page),
            "text-decoration" | "text-decoration-line" => {
                match value.to_ascii_lowercase().split_whitespace().next() {
                    Some("underline") => t.underline = Some(true),
                    Some("none") => t.underline = Some(false),
                    _ => {}
                }
                t.underline.is_some()
            }
            "border" | "border-color" if rule.target == Target::Table => {
                t.stroke = border(value);
                t.stroke.is_some()
            }
            _ => false,
        };

        if !handled {
            log::debug!("skipping unsupported CSS declaration `{property}: {value}`");
        }
    }

    t
}

fn push(args: &mut Vec<String>, name: &str, value: Option<String>) -> bool {
    match value {
        Some(value) => {
            args.push(format!("{name}: {value}"));
            true
        }
        None => false,
    }
}

fn set_align(t: &mut Translation, align: &'static str) -> bool {
    t.align = Some(align);
    true
}

fn emit_set(element: &str, args: &[String], selector: Option<String>, out: &mut String) {
    if args.is_empty() {
        return;
    }
    let args = args.join(", ");
    match selector {
        Some(selector) => out.push_str(&format!("#show {selector}: set {element}({args})\n")),
        None => out.push_str(&format!("#set {element}({args})\n")),
    }
}

fn emit_rule(target: Target, t: &Translation, out: &mut String) {
    if target == Target::Page {
        let mut page = t.page.clone();
        if let Some(fill) = &t.background {
            page.push(format!("fill: {fill}"));
        }
        if !page.is_empty() {
            out.push_str(&format!("#set page({})\n", page.join(", ")));
        }
        return;
    }

    // Paragraph settings of body and p apply document wide
    let par_selector = match target {
        Target::Body | Target::Paragraph => None,
        _ => target.show_selector(),
    };
    emit_set("text", &t.text, target.show_selector(), out);
    emit_set("par", &t.par, par_selector, out);

    if let Some(align) = t.align {
        match target.show_selector() {
            Some(selector) => out.push_str(&format!("#show {selector}: align.with({align})\n")),
            None => out.push_str(&format!("#set align({align})\n")),
        }
    }

    if let Some(fill) = &t.background {
        match target {
            Target::Body => out.push_str(&format!("#set page(fill: {fill})\n")),
            Target::Code => out.push_str(&format!(
                "#show raw.where(block: false): box.with(fill: {fill}, inset: (x: 2pt), outset: (y: 2pt), radius: 2pt)\n"
            )),
            Target::CodeBlock => out.push_str(&format!(
                "#show raw.where(block: true): block.with(fill: {fill}, inset: 8pt, radius: 2pt, width: 100%)\n"
            )),
            Target::Quote => out.push_str(&format!(
                "#show quote.where(block: true): block.with(fill: {fill}, inset: 8pt, width: 100%)\n"
            )),
            Target::Table => out.push_str(&format!("#set table(fill: {fill})\n")),
            _ => log::debug!("background is not supported for {target:?}"),
        }
    }

    if target == Target::Link {
        match t.underline {
            Some(true) => out.push_str("#show link: underline\n"),
            Some(false) | None => {}
        }
    }

    if let Some(stroke) = &t.stroke {
        out.push_str(&format!("#set table(stroke: {stroke})\n"));
    }
}

fn format_number(value: f64) -> String {
    let formatted = format!("{value:.3}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn split_number(value: &str) -> Option<(f64, &str)> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let number = value[..split].parse::<f64>().ok()?;
    Some((number, value[split..].trim()))
}

/// CSS length converted to a Typst length. Anything Typst would not parse is rejected.
fn length(value: &str) -> Option<String> {
    let (number, unit) = split_number(value)?;
    if !number.is_finite() {
        return None;
    }
    let converted = match unit.to_ascii_lowercase().as_str() {
        "px" => format!("{}pt", format_number(number * 0.75)),
        unit @ ("pt" | "cm" | "mm" | "in" | "em") => format!("{}{unit}", format_number(number)),
        "rem" => format!("{}em", format_number(number)),
        "" if number == 0.0 => "0pt".to_string(),
        _ => return None,
    };
    Some(converted)
}

/// Only positive sizes; the unit check is left to `length`.
fn positive_length(value: &str) -> Option<String> {
    let (number, _) = split_number(value)?;
    if number <= 0.0 {
        return None;
    }
    length(value)
}

fn font_size(value: &str) -> Option<String> {
    if let Some(percent) = value.trim().strip_suffix('%') {
        let number = percent.trim().parse::<f64>().ok()?;
        if !number.is_finite() || number <= 0.0 {
            return None;
        }
        return Some(format!("{}em", format_number(number / 100.0)));
    }
    positive_length(value)
}

/// CSS line height expressed as Typst leading, keeping the same line pitch.
fn leading(value: &str) -> Option<String> {
    const TEXT_HEIGHT_EM: f64 = 0.7;

    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        let factor = percent.trim().parse::<f64>().ok()? / 100.0;
        return Some(format!("{}em", format_number((factor - TEXT_HEIGHT_EM).max(0.0))));
    }
    if let Ok(factor) = value.parse::<f64>() {
        return Some(format!("{}em", format_number((factor - TEXT_HEIGHT_EM).max(0.0))));
    }
    length(value).map(|pitch| format!("{pitch} - {TEXT_HEIGHT_EM}em"))
}

fn font_family(value: &str) -> Option<String> {
    let first = value.split(',').next()?.trim().trim_matches(['"', '\'']).trim();
    let family = match first.to_ascii_lowercase().as_str() {
        "" => return None,
        "serif" => "Libertinus Serif",
        "monospace" => "DejaVu Sans Mono",
        "sans-serif" | "system-ui" => "New Computer Modern Sans",
        _ => first,
    };
    Some(quote_str(family))
}

fn font_weight(value: &str) -> Option<String> {
    let weight = match value.trim().to_ascii_lowercase().as_str() {
        "bold" | "bolder" => "\"bold\"".to_string(),
        "normal" | "lighter" => "\"regular\"".to_string(),
        other => {
            let number = other.parse::<u16>().ok()?;
            if !(100..=900).contains(&number) {
                return None;
            }
            number.to_string()
        }
    };
    Some(weight)
}

fn font_style(value: &str) -> Option<String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "italic" | "oblique" => Some("\"italic\"".to_string()),
        "normal" => Some("\"normal\"".to_string()),
        _ => None,
    }
}

/// CSS shorthand with one to four lengths.
fn margin(value: &str) -> Option<String> {
    let lengths: Option<Vec<String>> = value
        .split_whitespace()
        .map(|part| if part.trim_start().starts_with('-') { None } else { length(part) })
        .collect();
    let lengths = lengths?;
    let (top, right, bottom, left) = match lengths.as_slice() {
        [all] => return Some(all.clone()),
        [vertical, horizontal] => (vertical, horizontal, vertical, horizontal),
        [top, horizontal, bottom] => (top, horizontal, bottom, horizontal),
        [top, right, bottom, left] => (top, right, bottom, left),
        _ => return None,
    };
    Some(format!(
        "(top: {top}, right: {right}, bottom: {bottom}, left: {left})"
    ))
}

fn page_size(value: &str, page: &mut Vec<String>) -> bool {
    let mut handled = false;
    for keyword in value.to_ascii_lowercase().split_whitespace() {
        let paper = match keyword {
            "a3" => "a3",
            "a4" => "a4",
            "a5" => "a5",
            "letter" => "us-letter",
            "legal" => "us-legal",
            "landscape" => {
                page.push("flipped: true".to_string());
                handled = true;
                continue;
            }
            "portrait" => {
                page.push("flipped: false".to_string());
                handled = true;
                continue;
            }
            _ => continue,
        };
        page.push(format!("paper: \"{paper}\""));
        handled = true;
    }
    handled
}

fn border(value: &str) -> Option<String> {
    let mut width = None;
    let mut paint = None;
    for token in value.split_whitespace() {
        if width.is_none() {
            if let Some(len) = length(token) {
                width = Some(len);
                continue;
            }
        }
        if paint.is_none() {
            paint = color(token);
        }
    }
    let paint = paint?;
    Some(format!("{} + {paint}", width.unwrap_or_else(|| "0.5pt".to_string())))
}

/// CSS color converted to a Typst color expression.
fn color(value: &str) -> Option<String> {
    let value = value.trim().to_ascii_lowercase();

    if let Some(hex) = value.strip_prefix('#') {
        let valid = matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
        return valid.then(|| format!("rgb(\"#{hex}\")"));
    }

    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = args
            .split([',', ' ', '/'])
            .filter(|part| !part.is_empty())
            .collect();
        let channels: Option<Vec<u8>> = parts.iter().take(3).map(|c| c.parse().ok()).collect();
        let channels = channels.filter(|c| c.len() == 3)?;
        let alpha = match parts.get(3) {
            Some(alpha) => {
                let alpha = alpha.parse::<f64>().ok()?.clamp(0.0, 1.0);
                format!(", {}%", format_number(alpha * 100.0))
            }
            None => String::new(),
        };
        return Some(format!(
            "rgb({}, {}, {}{alpha})",
            channels[0], channels[1], channels[2]
        ));
    }

    let hex = match value.as_str() {
        "black" => "000000",
        "white" => "ffffff",
        "gray" | "grey" => "808080",
        "darkgray" | "darkgrey" => "a9a9a9",
        "lightgray" | "lightgrey" => "d3d3d3",
        "silver" => "c0c0c0",
        "red" => "ff0000",
        "maroon" => "800000",
        "orange" => "ffa500",
        "yellow" => "ffff00",
        "olive" => "808000",
        "green" => "008000",
        "lime" => "00ff00",
        "teal" => "008080",
        "aqua" | "cyan" => "00ffff",
        "blue" => "0000ff",
        "navy" => "000080",
        "purple" => "800080",
        "fuchsia" | "magenta" => "ff00ff",
        _ => return None,
    };
    Some(format!("rgb(\"#{hex}\")"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_rule_sets_text_and_paragraph() {
        let sheet = Stylesheet::parse("body { color: #333; font-size: 12px; line-height: 1.5; }");
        assert_eq!(
            sheet.to_typst(),
            "#set text(fill: rgb(\"#333\"), size: 9pt)\n#set par(leading: 0.8em)\n"
        );
    }

    #[test]
    fn heading_rules_use_show_set() {
        let sheet = Stylesheet::parse("h1, h2 { color: navy; text-align: center }");
        assert_eq!(
            sheet.to_typst(),
            concat!(
                "#show heading.where(level: 1): set text(fill: rgb(\"#000080\"))\n",
                "#show heading.where(level: 1): align.with(center)\n",
                "#show heading.where(level: 2): set text(fill: rgb(\"#000080\"))\n",
                "#show heading.where(level: 2): align.with(center)\n",
            )
        );
    }

    #[test]
    fn page_rule_sets_geometry() {
        let sheet = Stylesheet::parse("@page { size: A4 landscape; margin: 2cm 1in; }");
        assert_eq!(
            sheet.to_typst(),
            "#set page(paper: \"a4\", flipped: true, margin: (top: 2cm, right: 1in, bottom: 2cm, left: 1in))\n"
        );
    }

    #[test]
    fn code_block_background_wraps_raw_blocks() {
        let sheet = Stylesheet::parse("pre code { background-color: rgb(240, 240, 240); font-family: monospace }");
        let typst = sheet.to_typst();
        assert!(typst.contains("#show raw.where(block: true): set text(font: \"DejaVu Sans Mono\")"));
        assert!(typst.contains("block.with(fill: rgb(240, 240, 240), inset: 8pt"));
    }

    #[test]
    fn link_underline() {
        let sheet = Stylesheet::parse("a { text-decoration: underline; color: #0366d6 }");
        let typst = sheet.to_typst();
        assert!(typst.contains("#show link: set text(fill: rgb(\"#0366d6\"))"));
        assert!(typst.contains("#show link: underline"));
    }

    #[test]
    fn comments_and_at_rules_are_ignored() {
        let css = r#"
            @import url("x.css");
            /* p { color: red } */
            @media print { p { color: blue } }
            p { font-style: italic }
        "#;
        assert_eq!(
            Stylesheet::parse(css).to_typst(),
            "#show par: set text(style: \"italic\")\n"
        );
    }

    #[test]
    fn unsupported_selectors_and_properties_are_skipped() {
        let sheet = Stylesheet::parse("div.note { color: red } p { float: left; color: bogus }");
        assert!(!sheet.is_empty());
        assert_eq!(sheet.to_typst(), "");
    }

    #[test]
    fn unterminated_block_keeps_earlier_rules() {
        let sheet = Stylesheet::parse("h3 { font-weight: 700 } h4 { color: red");
        assert_eq!(
            sheet.to_typst(),
            "#show heading.where(level: 3): set text(weight: 700)\n"
        );
    }

    #[test]
    fn font_family_is_quoted() {
        assert_eq!(
            font_family("'Fira Sans', serif"),
            Some("\"Fira Sans\"".to_string())
        );
        assert_eq!(font_family("serif"), Some("\"Libertinus Serif\"".to_string()));
    }

    #[test]
    fn lengths_and_colors() {
        assert_eq!(length("16px"), Some("12pt".to_string()));
        assert_eq!(length("1.5rem"), Some("1.5em".to_string()));
        assert_eq!(length("0"), Some("0pt".to_string()));
        assert_eq!(length("12vw"), None);
        assert_eq!(length("12PT"), Some("12pt".to_string()));
        assert_eq!(length("2Cm"), Some("2cm".to_string()));
        assert_eq!(font_size("0px"), None);
        assert_eq!(font_size("-3pt"), None);
        assert_eq!(margin("-1cm"), None);
        assert_eq!(font_size("120%"), Some("1.2em".to_string()));
        assert_eq!(color("rgba(0, 0, 0, 0.5)"), Some("rgb(0, 0, 0, 50%)".to_string()));
        assert_eq!(color("#12345"), None);
        assert_eq!(color("GREY"), Some("rgb(\"#808080\")".to_string()));
    }
}
