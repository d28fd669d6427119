//! Document versions, changelogs and corpus-wide staleness detection.
//!
//! Per document, [`validate_history`] checks the `version` and `changelog`
//! header fields against each other. Across a corpus, a [`CorpusContext`] is
//! built from every validated header (pass 1) and then consulted to find
//! requirement references whose tracked version has fallen behind (pass 2).

use std::{collections::BTreeMap, fmt, num::NonZeroU64};

use non_empty_string::NonEmptyString;

use crate::domain::{
    RequirementHeader, ValidationError,
    error::{SchemaError, VersionError},
    identifier::RequirementId,
    value::Value,
};

/// A document version number (always at least 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(NonZeroU64);

impl Version {
    /// Creates a version from a raw integer.
    ///
    /// Returns `None` for zero or negative values.
    #[must_use]
    pub fn new(value: i64) -> Option<Self> {
        u64::try_from(value).ok().and_then(NonZeroU64::new).map(Self)
    }

    /// Returns the version number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates that `value` is an integer version of at least 1.
///
/// # Errors
///
/// Returns a schema error if `value` is not an integer, or a version error if
/// it is less than 1.
pub fn validate_version(context: &str, value: &Value) -> Result<Version, ValidationError> {
    let raw = value
        .as_int()
        .map_err(|e| SchemaError::wrong_type(context, e))?;
    Version::new(raw).ok_or_else(|| {
        VersionError::NonPositive {
            context: context.to_string(),
            value: raw,
        }
        .into()
    })
}

/// One entry of a document's revision history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    version: Version,
    description: NonEmptyString,
}

impl ChangelogEntry {
    /// The version this entry describes.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// What changed in this version.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    fn parse(index: usize, value: &Value) -> Result<Self, ValidationError> {
        let context = format!("changelog entry {index}");
        let map = value
            .as_map()
            .map_err(|e| SchemaError::wrong_type(context.as_str(), e))?;

        let version = map
            .get("version")
            .ok_or_else(|| SchemaError::missing(context.as_str(), "version"))?;
        let version = validate_version(&format!("{context} version"), version)?;

        let description = map
            .get("description")
            .ok_or_else(|| SchemaError::missing(context.as_str(), "description"))?
            .as_str()
            .map_err(|e| SchemaError::wrong_type(format!("{context} description"), e))?;
        let description = NonEmptyString::new(description.trim().to_string()).map_err(|_| {
            SchemaError::EmptyDescription {
                version: version.get(),
            }
        })?;

        Ok(Self {
            version,
            description,
        })
    }
}

/// The validated `version` and `changelog` fields of a header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    /// The document's current version, if declared.
    pub version: Option<Version>,
    /// Revision history, newest first.
    pub changelog: Vec<ChangelogEntry>,
}

/// Validates a header's `version` and `changelog` fields.
///
/// - `version`, if present, must be an integer of at least 1.
/// - `changelog`, if present, must be a list of `{version, description}`
///   maps in strictly descending version order.
/// - If both are present, `version` must equal the first changelog entry's
///   version.
///
/// # Errors
///
/// Returns the first rule violated.
pub fn validate_history(
    version: Option<&Value>,
    changelog: Option<&Value>,
) -> Result<History, ValidationError> {
    let version = version
        .map(|value| validate_version("version", value))
        .transpose()?;

    let changelog = match changelog.filter(|value| !value.is_empty()) {
        Some(value) => value
            .as_list()
            .map_err(|e| SchemaError::wrong_type("changelog", e))?
            .iter()
            .enumerate()
            .map(|(index, entry)| ChangelogEntry::parse(index, entry))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    if let Some(pair) = changelog
        .windows(2)
        .find(|pair| pair[0].version <= pair[1].version)
    {
        return Err(VersionError::NotDescending {
            previous: pair[0].version.get(),
            next: pair[1].version.get(),
        }
        .into());
    }

    if let (Some(version), Some(latest)) = (version, changelog.first()) {
        if version != latest.version {
            return Err(VersionError::ChangelogMismatch {
                version: version.get(),
                changelog: latest.version.get(),
            }
            .into());
        }
    }

    Ok(History { version, changelog })
}

/// The corpus-wide map of requirement ids to their current versions.
///
/// Built once from every document that passed validation, then passed into
/// the staleness pass. It never changes after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusContext {
    versions: BTreeMap<RequirementId, Option<Version>>,
    duplicates: Vec<RequirementId>,
}

impl CorpusContext {
    fn insert(&mut self, header: &RequirementHeader) {
        let id = header.id().clone();
        if self.versions.insert(id.clone(), header.version()).is_some() {
            tracing::warn!("requirement id {id} appears more than once in the corpus");
            self.duplicates.push(id);
        }
    }

    /// Whether a document with this id exists in the corpus.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.versions.contains_key(id)
    }

    /// The current version of the document with this id, if it declares one.
    #[must_use]
    pub fn current_version(&self, id: &str) -> Option<Version> {
        self.versions.get(id).copied().flatten()
    }

    /// Ids that were seen more than once while building the context.
    #[must_use]
    pub fn duplicates(&self) -> &[RequirementId] {
        &self.duplicates
    }

    /// Number of distinct ids in the corpus.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the corpus is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Builds the corpus context from every validated header (pass 1).
pub fn collect_versions<'a>(
    headers: impl IntoIterator<Item = &'a RequirementHeader>,
) -> CorpusContext {
    let mut context = CorpusContext::default();
    for header in headers {
        context.insert(header);
    }
    context
}

/// A requirement reference tracking an out-of-date version of its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleReference {
    /// The referencing (child) requirement.
    pub requirement: RequirementId,
    /// The referenced (parent) requirement.
    pub parent: RequirementId,
    /// The parent version recorded in the child's header.
    pub tracked: Version,
    /// The parent's current version.
    pub current: Version,
}

impl fmt::Display for StaleReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} tracks {} v{}, but current version is v{}",
            self.requirement, self.parent, self.tracked, self.current
        )
    }
}

/// Finds requirement references whose tracked version differs from the
/// referenced document's current version (pass 2).
///
/// References without a tracked version, to ids missing from the corpus, or
/// to documents that declare no version are skipped.
pub fn detect_stale_references<'a>(
    headers: impl IntoIterator<Item = &'a RequirementHeader>,
    context: &CorpusContext,
) -> Vec<StaleReference> {
    headers
        .into_iter()
        .flat_map(|header| {
            header
                .references()
                .requirements()
                .iter()
                .filter_map(move |reference| {
                    let tracked = reference.version()?;
                    let current = context.current_version(reference.id())?;
                    (tracked != current).then(|| StaleReference {
                        requirement: header.id().clone(),
                        parent: reference.id().clone(),
                        tracked,
                        current,
                    })
                })
        })
        .collect()
}

/// A requirement reference naming an id that no document in the corpus has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// The referencing requirement.
    pub requirement: RequirementId,
    /// The missing id.
    pub parent: RequirementId,
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} references {}, which is not in the corpus",
            self.requirement, self.parent
        )
    }
}

/// Finds requirement references to ids absent from the corpus.
pub fn detect_dangling_references<'a>(
    headers: impl IntoIterator<Item = &'a RequirementHeader>,
    context: &CorpusContext,
) -> Vec<DanglingReference> {
    headers
        .into_iter()
        .flat_map(|header| {
            header
                .references()
                .requirements()
                .iter()
                .filter(|reference| !context.contains(reference.id()))
                .map(|reference| DanglingReference {
                    requirement: header.id().clone(),
                    parent: reference.id().clone(),
                })
        })
        .collect()
}
