//! Pseudo-markdown rendering and its inverse.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,3})\s+(.*)$").expect("valid heading regex"));
static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-*]\s+(.*)$").expect("valid bullet regex"));
static FIRST_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^1\.\s+(.*)$").expect("valid numbered-list regex"));
static NEXT_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s+(.*)$").expect("valid numbered-list regex"));

static INLINE_RULES: Lazy<[(Regex, &'static str); 4]> = Lazy::new(|| {
    [
        (
            Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"),
            "<b>${1}</b>",
        ),
        (
            Regex::new(r"__(.*?)__").expect("valid underline regex"),
            "<u>${1}</u>",
        ),
        (
            Regex::new(r"\*(.*?)\*").expect("valid italic regex"),
            "<i>${1}</i>",
        ),
        (
            Regex::new(r"~~(.*?)~~").expect("valid strike regex"),
            "<s>${1}</s>",
        ),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bulleted,
    Numbered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Bulleted => "ul",
            Self::Numbered => "ol",
        }
    }
}

enum Line<'a> {
    Blank,
    Heading(usize, &'a str),
    Item(ListKind, &'a str),
    Plain(&'a str),
}

fn classify(line: &str, open_list: Option<ListKind>) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(caps) = HEADING_RE.captures(line) {
        let level = caps.get(1).map_or(1, |m| m.len());
        let body = caps.get(2).map_or("", |m| m.as_str());
        return Line::Heading(level, body);
    }
    if let Some(body) = capture_body(&BULLET_RE, line) {
        return Line::Item(ListKind::Bulleted, body);
    }
    if let Some(body) = capture_body(&FIRST_NUMBER_RE, line) {
        return Line::Item(ListKind::Numbered, body);
    }
    if open_list.is_some() {
        if let Some(body) = capture_body(&NEXT_NUMBER_RE, line) {
            return Line::Item(ListKind::Numbered, body);
        }
    }
    Line::Plain(line)
}

fn capture_body<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Renders line-based pseudo-markdown into an HTML fragment.
///
/// Headings become `<h1>`..`<h3>`, `-`/`*` lines a `<ul>`, a `1.` line opens
/// an `<ol>` that later `N.` lines extend, blank lines `<br>`, everything
/// else a `<div>`. Inline markers apply inside every block.
pub fn render_pseudo_markdown(source: &str) -> String {
    let mut html = String::new();
    let mut list: Option<(ListKind, Vec<String>)> = None;

    for raw in source.lines() {
        let line = raw.trim();
        match classify(line, list.as_ref().map(|(kind, _)| *kind)) {
            Line::Item(kind, body) => {
                if list.as_ref().is_some_and(|(open, _)| *open != kind) {
                    flush_list(&mut html, &mut list);
                }
                list.get_or_insert_with(|| (kind, Vec::new()))
                    .1
                    .push(format_inline(body));
            }
            Line::Blank => {
                flush_list(&mut html, &mut list);
                html.push_str("<br>");
            }
            Line::Heading(level, body) => {
                flush_list(&mut html, &mut list);
                html.push_str(&format!("<h{level}>{}</h{level}>", format_inline(body)));
            }
            Line::Plain(body) => {
                flush_list(&mut html, &mut list);
                html.push_str(&format!("<div>{}</div>", format_inline(body)));
            }
        }
    }

    flush_list(&mut html, &mut list);
    html
}

fn flush_list(html: &mut String, list: &mut Option<(ListKind, Vec<String>)>) {
    let Some((kind, items)) = list.take() else {
        return;
    };
    let tag = kind.tag();
    html.push_str(&format!("<{tag}>"));
    for item in items {
        html.push_str(&format!("<li>{item}</li>"));
    }
    html.push_str(&format!("</{tag}>"));
}

fn format_inline(text: &str) -> String {
    INLINE_RULES
        .iter()
        .fold(escape_html(text), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape_html(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

enum Token<'a> {
    Open(String),
    Close(String),
    Text(&'a str),
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        let Some(start) = rest.find('<') else {
            tokens.push(Token::Text(rest));
            break;
        };
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let Some(len) = rest[start..].find('>') else {
            tokens.push(Token::Text(&rest[start..]));
            break;
        };
        let inner = &rest[start + 1..start + len];
        let (closing, inner) = match inner.strip_prefix('/') {
            Some(stripped) => (true, stripped),
            None => (false, inner),
        };
        let name: String = inner
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        tokens.push(if closing {
            Token::Close(name)
        } else {
            Token::Open(name)
        });
        rest = &rest[start + len + 1..];
    }

    tokens
}

struct ListFrame {
    ordered: bool,
    next: usize,
}

#[derive(Default)]
struct MarkdownWriter {
    lines: Vec<String>,
    current: Option<String>,
    lists: Vec<ListFrame>,
}

impl MarkdownWriter {
    fn start_block(&mut self, prefix: &str) {
        if self.current.as_ref().is_some_and(|line| !line.is_empty()) {
            self.end_block();
        }
        self.current = Some(prefix.to_string());
    }

    fn end_block(&mut self) {
        if let Some(line) = self.current.take() {
            self.lines.push(line);
        }
    }

    fn push(&mut self, text: &str) {
        self.current.get_or_insert_with(String::new).push_str(text);
    }

    fn line_break(&mut self) {
        let line = self.current.take().unwrap_or_default();
        self.lines.push(line);
    }

    fn list_item_prefix(&mut self) -> String {
        match self.lists.last_mut() {
            Some(frame) if frame.ordered => {
                frame.next += 1;
                format!("{}. ", frame.next)
            }
            _ => "- ".to_string(),
        }
    }

    fn finish(mut self) -> String {
        self.end_block();
        self.lines.join("\n")
    }
}

/// Converts an HTML fragment back into pseudo-markdown, one line per block.
///
/// Unknown tags are dropped while their text is kept.
pub fn revert_to_markdown(html: &str) -> String {
    let mut writer = MarkdownWriter::default();

    for token in tokenize(html) {
        match token {
            Token::Text(text) => writer.push(&unescape_html(text)),
            Token::Open(tag) => match tag.as_str() {
                "h1" => writer.start_block("# "),
                "h2" => writer.start_block("## "),
                "h3" => writer.start_block("### "),
                "div" | "p" => writer.start_block(""),
                "li" => {
                    let prefix = writer.list_item_prefix();
                    writer.start_block(&prefix);
                }
                "ul" | "ol" => {
                    writer.end_block();
                    writer.lists.push(ListFrame {
                        ordered: tag == "ol",
                        next: 0,
                    });
                }
                "br" => writer.line_break(),
                "b" | "strong" => writer.push("**"),
                "i" | "em" => writer.push("*"),
                "u" => writer.push("__"),
                "s" | "strike" | "del" => writer.push("~~"),
                _ => {}
            },
            Token::Close(tag) => match tag.as_str() {
                "h1" | "h2" | "h3" | "div" | "p" | "li" => writer.end_block(),
                "ul" | "ol" => {
                    writer.end_block();
                    writer.lists.pop();
                }
                "b" | "strong" => writer.push("**"),
                "i" | "em" => writer.push("*"),
                "u" => writer.push("__"),
                "s" | "strike" | "del" => writer.push("~~"),
                _ => {}
            },
        }
    }

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::{render_pseudo_markdown, revert_to_markdown};

    #[test]
    fn renders_headings_lists_and_inline_markers() {
        let html = render_pseudo_markdown("# Plan\n- **grow** users\n- keep *them*\nplain ~~old~~ __new__");
        assert_eq!(
            html,
            "<h1>Plan</h1><ul><li><b>grow</b> users</li><li>keep <i>them</i></li></ul>\
             <div>plain <s>old</s> <u>new</u></div>"
        );
    }

    #[test]
    fn numbered_list_opens_on_one_and_continues_on_any_number() {
        let html = render_pseudo_markdown("1. first\n7. second\n3. stray");
        assert_eq!(html, "<ol><li>first</li><li>second</li><li>stray</li></ol>");

        let lone = render_pseudo_markdown("3. not a list");
        assert_eq!(lone, "<div>3. not a list</div>");
    }

    #[test]
    fn blank_lines_become_breaks_and_close_lists() {
        let html = render_pseudo_markdown("- a\n\n- b");
        assert_eq!(html, "<ul><li>a</li></ul><br><ul><li>b</li></ul>");
    }

    #[test]
    fn switching_list_kind_closes_the_open_list() {
        let html = render_pseudo_markdown("- a\n1. b");
        assert_eq!(html, "<ul><li>a</li></ul><ol><li>b</li></ol>");
    }

    #[test]
    fn markup_characters_are_escaped() {
        assert_eq!(
            render_pseudo_markdown("a < b & c"),
            "<div>a &lt; b &amp; c</div>"
        );
    }

    #[test]
    fn canonical_markdown_round_trips() {
        let source = "# Growth\n## Levers\n### Detail\n\n- **bold** item\n- *soft* item\n1. one\n2. two\nplain __u__ ~~s~~ & <tag>\n#hashtag";
        assert_eq!(revert_to_markdown(&render_pseudo_markdown(source)), source);
    }

    #[test]
    fn revert_accepts_editor_html() {
        let html = "<p>Hello <strong>world</strong></p><div><br></div><ul class=\"x\"><li>item</li></ul>";
        assert_eq!(revert_to_markdown(html), "Hello **world**\n\n- item");
    }
}
