//! Two-way agreement between header references and body links.

use tracing::instrument;

use crate::{
    domain::{
        ValidationError,
        error::ConsistencyError,
        reference::{ReferenceCategory, ReferenceSet},
    },
    storage::markdown::{BodyReferences, LinkKind, MarkdownRef, parse_references},
};

/// Checks that every cross-reference used in a body is declared in the
/// header, and every declared reference is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyChecker;

impl ConsistencyChecker {
    /// Runs the checks against a body and the header's validated references.
    ///
    /// Checks run in this order, and the first failure is returned:
    ///
    /// 1. a body with cross-reference links needs a non-empty reference set;
    /// 2. per category, each body link must match a header entry (body
    ///    order), then each header entry must match a body link (header
    ///    order);
    /// 3. each link's text must agree with its target.
    ///
    /// Standards are never linked from the body and are not checked.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsistencyError`] describing the first disagreement.
    #[instrument(level = "debug", skip_all)]
    pub fn check(self, body: &str, references: &ReferenceSet) -> Result<(), ValidationError> {
        let body_refs = parse_references(body);
        check_declared(&body_refs, references)?;
        check_link_text(&body_refs)?;
        Ok(())
    }
}

/// Checks a body against the header's references.
///
/// # Errors
///
/// See [`ConsistencyChecker::check`].
pub fn check(body: &str, references: &ReferenceSet) -> Result<(), ValidationError> {
    ConsistencyChecker.check(body, references)
}

fn check_declared(body: &BodyReferences, references: &ReferenceSet) -> Result<(), ConsistencyError> {
    if references.is_empty() {
        return if body.has_cross_references() {
            Err(ConsistencyError::MissingReferencesSection)
        } else {
            Ok(())
        };
    }

    match_category(
        body,
        ReferenceCategory::Parameters,
        LinkKind::Parameter,
        references.parameters(),
        |entry, target| entry.matches(target),
    )?;
    match_category(
        body,
        ReferenceCategory::Requirements,
        LinkKind::Requirement,
        references.requirements(),
        |entry, target| entry.matches(target),
    )?;
    match_category(
        body,
        ReferenceCategory::Tests,
        LinkKind::Test,
        references.tests(),
        |entry, target| entry == target,
    )
}

fn match_category<T: ToString>(
    body: &BodyReferences,
    category: ReferenceCategory,
    kind: LinkKind,
    declared: &[T],
    matches: impl Fn(&T, &str) -> bool,
) -> Result<(), ConsistencyError> {
    let used: Vec<&MarkdownRef> = body.of_kind(kind).collect();

    if let Some(link) = used
        .iter()
        .find(|link| !declared.iter().any(|entry| matches(entry, &link.target)))
    {
        return Err(ConsistencyError::Undeclared {
            category,
            target: link.target.clone(),
        });
    }

    if let Some(entry) = declared
        .iter()
        .find(|entry| !used.iter().any(|link| matches(entry, &link.target)))
    {
        return Err(ConsistencyError::Unused {
            category,
            entry: entry.to_string(),
        });
    }

    Ok(())
}

fn check_link_text(body: &BodyReferences) -> Result<(), ConsistencyError> {
    for link in body.links() {
        let (category, expected) = match link.kind {
            LinkKind::Parameter => {
                let Some((_, fragment)) = link.target.split_once('#') else {
                    continue;
                };
                if link.text.strip_prefix('@') == Some(fragment) {
                    continue;
                }
                (ReferenceCategory::Parameters, format!("@{fragment}"))
            }
            LinkKind::Requirement => {
                let filename = link.target.rsplit('/').next().unwrap_or_default();
                if format!("{}.md", link.text) == filename {
                    continue;
                }
                let stem = filename.strip_suffix(".md").unwrap_or(filename);
                (ReferenceCategory::Requirements, stem.to_string())
            }
            LinkKind::Test => {
                let target = link.target.rsplit(':').next().unwrap_or_default();
                if link.text == target {
                    continue;
                }
                (ReferenceCategory::Tests, target.to_string())
            }
            LinkKind::External | LinkKind::Unknown => continue,
        };
        return Err(ConsistencyError::LinkText {
            category,
            text: link.text.clone(),
            target: link.target.clone(),
            expected,
        });
    }
    Ok(())
}
