//! Frontmatter parsing for the YAML subset used in document headers.
//!
//! Only the subset observed in requirement documents is supported: scalars,
//! inline lists (`[a, b]`), block lists, nested maps and lists of maps. The
//! header text is first tokenized line by line, then rebuilt into a [`Value`]
//! by a small recursive descent that tracks indentation explicitly.

use std::{borrow::Cow, collections::BTreeMap};

use crate::domain::{Value, identifier::is_key_token};

/// A document split into its parsed header and its body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<'a> {
    /// The parsed header, or `None` if the document has no (terminated)
    /// header block.
    pub header: Option<Value>,
    /// Everything after the closing `---` line, or the whole text if there is
    /// no header.
    pub body: &'a str,
}

impl<'a> Document<'a> {
    const fn plain(text: &'a str) -> Self {
        Self {
            header: None,
            body: text,
        }
    }
}

/// Splits `text` into header and body and parses the header.
///
/// If `text` does not begin with a `---` line, or no closing `---` line
/// follows, the document is returned unchanged with no header.
#[must_use]
pub fn parse(text: &str) -> Document<'_> {
    let mut lines = text.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Document::plain(text);
    };
    if first.trim() != "---" {
        return Document::plain(text);
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        let line_start = offset;
        offset += line.len();
        if line.trim() == "---" {
            return Document {
                header: Some(parse_header(&text[header_start..line_start])),
                body: &text[offset..],
            };
        }
    }

    tracing::debug!("frontmatter header has no closing '---' line");
    Document::plain(text)
}

/// Parses the text between the `---` delimiters into a [`Value`].
///
/// The result is a map unless the header consists of a top-level list.
#[must_use]
pub fn parse_header(header: &str) -> Value {
    let mut parser = Parser {
        lines: tokenize(header),
        pos: 0,
    };
    let Some(first) = parser.peek() else {
        return Value::Map(BTreeMap::new());
    };
    let mut value = parser.parse_block(first.indent);

    // Lines left over after the first block ended are merged where possible.
    while let Some(line) = parser.peek() {
        match (&mut value, line.token) {
            (Value::Map(root), Token::Entry(..)) => {
                let indent = line.indent;
                if let Value::Map(more) = parser.parse_map(indent) {
                    root.extend(more);
                }
            }
            _ => {
                tracing::debug!("ignoring unexpected header line {}", parser.pos + 1);
                parser.pos += 1;
            }
        }
    }
    value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// A `-` whose item is the block that follows it (or nothing).
    Dash,
    /// A `- scalar` list item.
    Item(&'a str),
    /// A `key: value` pair. The value may be empty.
    Entry(&'a str, &'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Line<'a> {
    indent: usize,
    token: Token<'a>,
}

fn tokenize(header: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for raw in header.lines() {
        let raw = raw.trim_end();
        let content = raw.trim_start();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let indent = raw.len() - content.len();

        if let Some(rest) = content.strip_prefix('-') {
            let item = rest.trim_start();
            if item.is_empty() {
                lines.push(Line {
                    indent,
                    token: Token::Dash,
                });
            } else if let Some((key, value)) = dict_item(item) {
                // `- key: value` opens a map whose keys sit at the column of `key`.
                let key_column = indent + (content.len() - item.len());
                lines.push(Line {
                    indent,
                    token: Token::Dash,
                });
                lines.push(Line {
                    indent: key_column,
                    token: Token::Entry(key, value),
                });
            } else {
                lines.push(Line {
                    indent,
                    token: Token::Item(item),
                });
            }
        } else if let Some((key, value)) = split_entry(content) {
            if key.is_empty() {
                tracing::debug!("ignoring header line with an empty key: {content}");
                continue;
            }
            lines.push(Line {
                indent,
                token: Token::Entry(key, value.trim()),
            });
        } else {
            tracing::debug!("ignoring header line without a key: {content}");
        }
    }
    lines
}

/// Splits a list item into `(key, value)` if it is a `key: value` pair.
///
/// Bazel labels (`//pkg:target`), quoted strings, and citations such as
/// `ISO 26262:2018` contain a colon but are scalars: the text left of the
/// colon must be a bare key token, and the colon must be followed by
/// whitespace or the end of the line.
fn dict_item(item: &str) -> Option<(&str, &str)> {
    if item.starts_with('"') {
        return quoted_entry(item);
    }
    if item.starts_with("//") || item.starts_with('\'') {
        return None;
    }
    let (key, value) = item.split_once(':')?;
    if !(value.is_empty() || value.starts_with(char::is_whitespace)) {
        return None;
    }
    let key = key.trim_end();
    is_key_token(key).then(|| (key, value.trim()))
}

/// Splits `key: value` at the first colon, or after a double-quoted key.
fn split_entry(content: &str) -> Option<(&str, &str)> {
    if content.starts_with('"') {
        return quoted_entry(content);
    }
    let (key, value) = content.split_once(':')?;
    Some((key.trim_end(), value.trim()))
}

/// Reads `"key": value`. The colon must directly follow the closing quote and
/// be followed by whitespace or the end of the line.
fn quoted_entry(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix('"')?;
    let (key, after) = rest.split_once('"')?;
    let value = after.strip_prefix(':')?;
    (value.is_empty() || value.starts_with(char::is_whitespace)).then(|| (key, value.trim()))
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    fn parse_block(&mut self, indent: usize) -> Value {
        match self.peek() {
            Some(Line {
                token: Token::Entry(..),
                ..
            }) => self.parse_map(indent),
            Some(_) => self.parse_list(indent),
            None => Value::Map(BTreeMap::new()),
        }
    }

    fn parse_map(&mut self, base: usize) -> Value {
        let mut map = BTreeMap::new();
        while let Some(line) = self.peek() {
            if line.indent < base {
                break;
            }
            let Token::Entry(key, value) = line.token else {
                if line.indent == base {
                    break;
                }
                tracing::debug!("ignoring stray list item on header line {}", self.pos + 1);
                self.pos += 1;
                continue;
            };
            self.pos += 1;
            let value = if value.is_empty() {
                self.parse_nested(line.indent)
            } else {
                scalar(value)
            };
            map.insert(key.to_string(), value);
        }
        Value::Map(map)
    }

    /// Parses the container opened by a `key:` line with no inline value.
    fn parse_nested(&mut self, indent: usize) -> Value {
        match self.peek() {
            Some(next) if next.indent > indent => self.parse_block(next.indent),
            // `key:` followed by `- item` at the same indent is a list.
            Some(next) if next.indent == indent && !matches!(next.token, Token::Entry(..)) => {
                self.parse_list(indent)
            }
            _ => Value::Map(BTreeMap::new()),
        }
    }

    fn parse_list(&mut self, base: usize) -> Value {
        let mut items = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent != base {
                break;
            }
            match line.token {
                Token::Dash => {
                    self.pos += 1;
                    let item = match self.peek() {
                        Some(next) if next.indent > base => self.parse_block(next.indent),
                        _ => Value::Null,
                    };
                    items.push(item);
                }
                Token::Item(item) => {
                    self.pos += 1;
                    items.push(scalar(item));
                }
                Token::Entry(..) => break,
            }
        }
        Value::List(items)
    }
}

fn strip_quotes(s: &str) -> Option<&str> {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

/// Coerces a scalar token.
///
/// - quoted text is a string, with the quotes removed;
/// - `[a, b]` is a list of strings;
/// - `true`/`false` in any case is a boolean;
/// - ASCII digits only is an integer;
/// - anything else is a string.
fn scalar(raw: &str) -> Value {
    let s = raw.trim();
    if let Some(inner) = strip_quotes(s) {
        return Value::Str(inner.to_string());
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return Value::List(
            inner
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::Str(strip_quotes(item).unwrap_or(item).to_string()))
                .collect(),
        );
    }
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(int) = s.parse() {
            return Value::Int(int);
        }
    }
    Value::Str(s.to_string())
}

/// Renders a value back into header text.
///
/// Output parses back to an equal value for the supported subset: strings,
/// non-negative integers, booleans, lists and maps (including lists of maps),
/// with no null map values and no empty maps inside lists. Strings that would
/// otherwise be coerced or mis-tokenized are double-quoted, and so are keys
/// that would read as list items, comments or quoted scalars. Keys containing
/// a double quote are not supported.
#[must_use]
pub fn render(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Map(map) => render_map(map, 0, &mut out),
        Value::List(items) => render_list(items, 0, &mut out),
        scalar => {
            out.push_str(&render_scalar(scalar));
            out.push('\n');
        }
    }
    out
}

/// Renders a complete document: the header between `---` lines, then the body.
#[must_use]
pub fn render_document(header: &Value, body: &str) -> String {
    format!("---\n{}---\n{body}", render(header))
}

fn render_map(map: &BTreeMap<String, Value>, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    for (key, value) in map {
        let key = render_key(key);
        match value {
            Value::Map(nested) if !nested.is_empty() => {
                out.push_str(&format!("{pad}{key}:\n"));
                render_map(nested, indent + 2, out);
            }
            Value::List(items) if !items.is_empty() => {
                out.push_str(&format!("{pad}{key}:\n"));
                render_list(items, indent + 2, out);
            }
            Value::List(_) => out.push_str(&format!("{pad}{key}: []\n")),
            Value::Map(_) | Value::Null => out.push_str(&format!("{pad}{key}:\n")),
            scalar => out.push_str(&format!("{pad}{key}: {}\n", render_scalar(scalar))),
        }
    }
}

fn render_list(items: &[Value], indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    for item in items {
        match item {
            Value::Map(map) if !map.is_empty() => {
                // The first entry shares the dash line.
                let mut nested = String::new();
                render_map(map, indent + 2, &mut nested);
                out.push_str(&pad);
                out.push_str("- ");
                out.push_str(&nested[indent + 2..]);
            }
            Value::List(nested) if !nested.is_empty() => {
                out.push_str(&format!("{pad}-\n"));
                render_list(nested, indent + 2, out);
            }
            Value::List(_) => out.push_str(&format!("{pad}- []\n")),
            Value::Map(_) | Value::Null => out.push_str(&format!("{pad}-\n")),
            scalar => out.push_str(&format!("{pad}- {}\n", render_scalar(scalar))),
        }
    }
}

fn render_key(key: &str) -> Cow<'_, str> {
    if key.is_empty()
        || key != key.trim()
        || key.starts_with(['-', '#', '"', '\''])
        || key.contains(':')
    {
        Cow::Owned(format!("\"{key}\""))
    } else {
        Cow::Borrowed(key)
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Str(s) if needs_quotes(s) => format!("\"{s}\""),
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::List(_) | Value::Map(_) => String::new(),
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s != s.trim()
        || s.bytes().all(|b| b.is_ascii_digit())
        || s.eq_ignore_ascii_case("true")
        || s.eq_ignore_ascii_case("false")
        || s.starts_with(['"', '\'', '[', '-', '#'])
        || s.contains(": ")
        || s.ends_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(text: &str) -> Value {
        parse(text).header.expect("document should have a header")
    }

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        pairs.into_iter().collect()
    }

    #[test]
    fn no_header_returns_text_unchanged() {
        let text = "# Just markdown\n\nNo header here.";
        let document = parse(text);
        assert_eq!(document.header, None);
        assert_eq!(document.body, text);
    }

    #[test]
    fn unterminated_header_returns_text_unchanged() {
        let text = "---\nid: REQ-001\ntitle: Missing end\nBody text";
        let document = parse(text);
        assert_eq!(document.header, None);
        assert_eq!(document.body, text);
    }

    #[test]
    fn empty_input() {
        let document = parse("");
        assert_eq!(document.header, None);
        assert_eq!(document.body, "");
    }

    #[test]
    fn splits_header_and_body() {
        let document = parse("---\nid: REQ-001\n---\nThe body.\n\nThis has --- in it\n---\n");
        assert_eq!(document.header, Some(map(vec![("id", Value::from("REQ-001"))])));
        assert_eq!(document.body, "The body.\n\nThis has --- in it\n---\n");
    }

    #[test]
    fn empty_header() {
        let document = parse("---\n---\nbody");
        assert_eq!(document.header, Some(Value::Map(BTreeMap::new())));
        assert_eq!(document.body, "body");
    }

    #[test]
    fn scalar_coercion() {
        let value = header(
            r#"---
count: 42
flag: TRUE
other: false
quoted: "42"
single: 'true'
text: hello world
negative: -5
decimal: 1.5
url: https://example.com/a:b
---
"#,
        );
        assert_eq!(value.get("count"), Some(&Value::Int(42)));
        assert_eq!(value.get("flag"), Some(&Value::Bool(true)));
        assert_eq!(value.get("other"), Some(&Value::Bool(false)));
        assert_eq!(value.get("quoted"), Some(&Value::from("42")));
        assert_eq!(value.get("single"), Some(&Value::from("true")));
        assert_eq!(value.get("text"), Some(&Value::from("hello world")));
        assert_eq!(value.get("negative"), Some(&Value::from("-5")));
        assert_eq!(value.get("decimal"), Some(&Value::from("1.5")));
        assert_eq!(
            value.get("url"),
            Some(&Value::from("https://example.com/a:b"))
        );
    }

    #[test]
    fn inline_lists_are_string_lists() {
        let value = header("---\ntags: [safety, \"braking\", 'adas', 3]\nempty: []\n---\n");
        assert_eq!(
            value.get("tags"),
            Some(&Value::from(vec!["safety", "braking", "adas", "3"]))
        );
        assert_eq!(value.get("empty"), Some(&Value::List(vec![])));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let value = header("---\n# a comment\n\nid: REQ-001\n   # indented comment\ntitle: T\n---\n");
        assert_eq!(
            value,
            map(vec![("id", Value::from("REQ-001")), ("title", Value::from("T"))])
        );
    }

    #[test]
    fn block_lists_nested_under_keys() {
        let value = header(
            "---
references:
  parameters:
    - max_velocity
    - params.bzl#min_gap
  tests:
  - //vehicle/tests:braking_test
---
",
        );
        let references = value.get("references").unwrap();
        assert_eq!(
            references.get("parameters"),
            Some(&Value::from(vec!["max_velocity", "params.bzl#min_gap"]))
        );
        assert_eq!(
            references.get("tests"),
            Some(&Value::from(vec!["//vehicle/tests:braking_test"]))
        );
    }

    #[test]
    fn labels_and_citations_are_not_dict_items() {
        let value = header(
            "---
items:
  - //pkg/path:target
  - ISO 26262:2018
  - \"quoted: text\"
  - http://example.com
  - id: REQ-001
---
",
        );
        assert_eq!(
            value.get("items"),
            Some(&Value::List(vec![
                Value::from("//pkg/path:target"),
                Value::from("ISO 26262:2018"),
                Value::from("quoted: text"),
                Value::from("http://example.com"),
                map(vec![("id", Value::from("REQ-001"))]),
            ]))
        );
    }

    #[test]
    fn list_of_maps_merges_continuation_lines() {
        let value = header(
            "---
changelog:
  - version: 2
    description: Tightened the braking limit
  - version: 1
      description: Initial version
requirements:
- id: REQ-001
  version: 3
- REQ-002
---
",
        );
        assert_eq!(
            value.get("changelog"),
            Some(&Value::List(vec![
                map(vec![
                    ("version", Value::Int(2)),
                    ("description", Value::from("Tightened the braking limit")),
                ]),
                map(vec![
                    ("version", Value::Int(1)),
                    ("description", Value::from("Initial version")),
                ]),
            ]))
        );
        assert_eq!(
            value.get("requirements"),
            Some(&Value::List(vec![
                map(vec![("id", Value::from("REQ-001")), ("version", Value::Int(3))]),
                Value::from("REQ-002"),
            ]))
        );
    }

    #[test]
    fn empty_value_with_nothing_nested_is_an_empty_map() {
        let value = header("---\nreferences:\ntitle: T\n---\n");
        assert_eq!(value.get("references"), Some(&Value::Map(BTreeMap::new())));
        assert_eq!(value.get("title"), Some(&Value::from("T")));
    }

    #[test]
    fn bare_dash_holds_nested_block_or_null() {
        let value = header("---\nrows:\n  -\n    - 1\n    - 2\n  -\n---\n");
        assert_eq!(
            value.get("rows"),
            Some(&Value::List(vec![
                Value::List(vec![Value::Int(1), Value::Int(2)]),
                Value::Null,
            ]))
        );
    }

    #[test]
    fn nested_list_inside_list_item_map() {
        let value = header(
            "---
parameters:
  - name: braking
    columns:
    - name: velocity
      type: float
    - name: distance
      type: float
    description: Braking table
---
",
        );
        let parameter = &value.get("parameters").unwrap().as_list().unwrap()[0];
        assert_eq!(parameter.get("name"), Some(&Value::from("braking")));
        assert_eq!(
            parameter.get("description"),
            Some(&Value::from("Braking table"))
        );
        assert_eq!(parameter.get("columns").unwrap().as_list().unwrap().len(), 2);
    }

    #[test]
    fn keys_that_read_as_list_items_are_quoted() {
        let value = map(vec![
            ("-x", Value::from("v")),
            ("# not a comment", Value::Int(1)),
            ("a:b", Value::from(vec!["c"])),
            (
                "items",
                Value::List(vec![map(vec![("-flag", Value::Bool(true))])]),
            ),
        ]);
        let text = render(&value);
        assert!(text.contains("\"-x\": v\n"));
        assert!(text.contains("- \"-flag\": true\n"));
        assert_eq!(parse_header(&text), value);
    }

    #[test]
    fn quoted_scalars_are_not_entries() {
        let value = header("---\nstandards:\n  - \"ISO: 26262\"\n  - \"quoted\":tail\n---\n");
        assert_eq!(
            value.get("standards"),
            Some(&Value::from(vec!["ISO: 26262", "\"quoted\":tail"]))
        );
    }

    #[test]
    fn round_trip_supported_subset() {
        let value = map(vec![
            ("id", Value::from("REQ-001")),
            ("title", Value::from("Emergency braking")),
            ("version", Value::Int(2)),
            ("safety_relevant", Value::Bool(true)),
            ("quoted_number", Value::from("0042")),
            ("quoted_bool", Value::from("False")),
            ("label", Value::from("- not a list")),
            ("empty_text", Value::from("")),
            ("tags", Value::from(vec!["adas", "braking"])),
            ("none", Value::List(vec![])),
            (
                "references",
                map(vec![
                    (
                        "requirements",
                        Value::List(vec![
                            map(vec![("id", Value::from("SYS-001")), ("version", Value::Int(1))]),
                            Value::from("SYS-002"),
                        ]),
                    ),
                    ("standards", Value::from(vec!["ISO 26262:2018"])),
                    ("tests", Value::from(vec!["//vehicle:brake_test"])),
                ]),
            ),
            (
                "matrix",
                Value::List(vec![Value::from(vec!["a", "b"]), Value::Null]),
            ),
            (
                "changelog",
                Value::List(vec![map(vec![
                    ("version", Value::Int(2)),
                    ("description", Value::from("note: colon inside")),
                    ("refs", Value::from(vec!["x"])),
                ])]),
            ),
        ]);

        let text = render_document(&value, "Body text.\n");
        let document = parse(&text);
        assert_eq!(document.header, Some(value));
        assert_eq!(document.body, "Body text.\n");
    }
}
