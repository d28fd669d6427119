//! Inline link extraction and classification for Markdown bodies.
//!
//! Links are found with a plain bracket/paren scan rather than a regular
//! expression, so nested brackets in link text (`[a [b]](c)`) and parentheses
//! in targets (`[x](a(b).md)`) are matched correctly.

use crate::domain::reference::{is_test_label, md_stem};

/// What a body link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// `[@name](path#name)`: a parameter.
    Parameter,
    /// `[ID](path/ID.md)`: another requirement document.
    Requirement,
    /// `[target](//package:target)` or `[target](:target)`: a test target.
    Test,
    /// `[text](https://...)`: an external web link.
    External,
    /// Anything else. Ignored by the consistency checks.
    Unknown,
}

impl LinkKind {
    fn classify(text: &str, target: &str) -> Self {
        if text.starts_with('@') {
            Self::Parameter
        } else if target.ends_with(".md") {
            Self::Requirement
        } else if (target.starts_with("//") && target.contains(':')) || is_test_label(target) {
            Self::Test
        } else if target.starts_with("http://") || target.starts_with("https://") {
            Self::External
        } else {
            Self::Unknown
        }
    }

    /// Whether links of this kind must be declared in the header.
    #[must_use]
    pub const fn is_cross_reference(self) -> bool {
        matches!(self, Self::Parameter | Self::Requirement | Self::Test)
    }
}

/// A classified inline link found in a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownRef {
    /// The link's classification.
    pub kind: LinkKind,
    /// The text between the brackets.
    pub text: String,
    /// The text between the parentheses.
    pub target: String,
    /// The 1-based body line the link appears on.
    pub line: usize,
}

impl MarkdownRef {
    /// The requirement id a [`LinkKind::Requirement`] link points at (the
    /// target's file stem).
    #[must_use]
    pub fn requirement_id(&self) -> Option<&str> {
        match self.kind {
            LinkKind::Requirement => md_stem(&self.target),
            _ => None,
        }
    }
}

/// Every inline link in a body, in the order they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyReferences {
    links: Vec<MarkdownRef>,
}

impl BodyReferences {
    /// All links, including external and unknown ones.
    #[must_use]
    pub fn links(&self) -> &[MarkdownRef] {
        &self.links
    }

    /// Links of one kind, in body order.
    pub fn of_kind(&self, kind: LinkKind) -> impl Iterator<Item = &MarkdownRef> {
        self.links.iter().filter(move |link| link.kind == kind)
    }

    /// Whether the body has any parameter, requirement or test link.
    #[must_use]
    pub fn has_cross_references(&self) -> bool {
        self.links.iter().any(|link| link.kind.is_cross_reference())
    }
}

/// Returns the `(text, target)` pair of every `[text](target)` link on a line.
///
/// Brackets and parentheses are matched with nesting. A `[...]` that is not
/// immediately followed by `(...)` is not a link, but links nested inside it
/// are still found.
#[must_use]
pub fn extract_links(line: &str) -> Vec<(&str, &str)> {
    let bytes = line.as_bytes();
    let mut links = Vec::new();
    let mut start = 0;

    while let Some(offset) = line[start..].find('[') {
        let open = start + offset;
        start = open + 1;

        let Some(close) = matching(bytes, open, b'[', b']') else {
            continue;
        };
        if bytes.get(close + 1) != Some(&b'(') {
            continue;
        }
        let Some(end) = matching(bytes, close + 1, b'(', b')') else {
            continue;
        };

        links.push((&line[open + 1..close], &line[close + 2..end]));
        start = end + 1;
    }
    links
}

fn matching(bytes: &[u8], open: usize, left: u8, right: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (index, &byte) in bytes.iter().enumerate().skip(open) {
        if byte == left {
            depth += 1;
        } else if byte == right {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}

/// Extracts and classifies every inline link in a document body.
///
/// Lines inside fenced code blocks (```` ``` ```` or `~~~`) are skipped.
#[must_use]
pub fn parse_references(body: &str) -> BodyReferences {
    let mut links = Vec::new();
    let mut fence: Option<&str> = None;

    for (index, line) in body.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(marker) = ["```", "~~~"]
            .into_iter()
            .find(|marker| trimmed.starts_with(marker))
        {
            fence = match fence {
                None => Some(marker),
                Some(open) if open == marker => None,
                Some(open) => Some(open),
            };
            continue;
        }
        if fence.is_some() {
            continue;
        }

        links.extend(extract_links(line).into_iter().map(|(text, target)| MarkdownRef {
            kind: LinkKind::classify(text, target),
            text: text.to_string(),
            target: target.to_string(),
            line: index + 1,
        }));
    }

    BodyReferences { links }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_every_link_on_a_line() {
        let line = "See [@max_velocity](params.bzl#max_velocity) and [REQ-001](REQ-001.md).";
        assert_eq!(
            extract_links(line),
            vec![
                ("@max_velocity", "params.bzl#max_velocity"),
                ("REQ-001", "REQ-001.md"),
            ]
        );
    }

    #[test]
    fn brackets_and_parens_nest() {
        assert_eq!(
            extract_links("[a [b] c](target(1).md)"),
            vec![("a [b] c", "target(1).md")]
        );
    }

    #[test]
    fn brackets_without_target_are_not_links() {
        assert!(extract_links("just [brackets] here").is_empty());
        assert!(extract_links("[text] (space before paren)").is_empty());
        assert!(extract_links("[unclosed(paren").is_empty());
        assert!(extract_links("[text](unclosed").is_empty());
    }

    #[test]
    fn links_inside_non_link_brackets_are_found() {
        assert_eq!(
            extract_links("[see [REQ-001](REQ-001.md)]"),
            vec![("REQ-001", "REQ-001.md")]
        );
    }

    #[test]
    fn classification() {
        let body = "\
[@min_gap](params.bzl#min_gap)
[REQ-002](../sys/REQ-002.md)
[braking_test](//vehicle/tests:braking_test)
[local_test](:local_test)
[docs](https://example.com/docs)
[other](notes.txt)
";
        let refs = parse_references(body);
        let kinds: Vec<_> = refs.links().iter().map(|link| link.kind).collect();
        assert_eq!(
            kinds,
            [
                LinkKind::Parameter,
                LinkKind::Requirement,
                LinkKind::Test,
                LinkKind::Test,
                LinkKind::External,
                LinkKind::Unknown,
            ]
        );
        assert_eq!(refs.links()[1].requirement_id(), Some("REQ-002"));
        assert_eq!(refs.links()[1].line, 2);
        assert_eq!(refs.links()[0].requirement_id(), None);
        assert!(refs.has_cross_references());
    }

    #[test]
    fn external_links_are_not_cross_references() {
        let refs = parse_references("Read [the guide](https://example.com).");
        assert_eq!(refs.links().len(), 1);
        assert!(!refs.has_cross_references());
        assert_eq!(refs.of_kind(LinkKind::External).count(), 1);
    }

    #[test]
    fn fenced_code_blocks_are_skipped() {
        let body = "\
Before [REQ-001](REQ-001.md).
```markdown
[REQ-002](REQ-002.md)
~~~
[REQ-003](REQ-003.md)
```
~~~
[REQ-004](REQ-004.md)
~~~
After [REQ-005](REQ-005.md).
";
        let ids: Vec<_> = parse_references(body)
            .of_kind(LinkKind::Requirement)
            .filter_map(MarkdownRef::requirement_id)
            .map(str::to_string)
            .collect();
        assert_eq!(ids, ["REQ-001", "REQ-005"]);
    }
}
