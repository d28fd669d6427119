//! Typed header references and their format rules.
//!
//! A requirement header may carry a `references` map with up to four
//! categories. [`ReferenceFormatValidator`] turns the raw [`Value`] into a
//! [`ReferenceSet`], rejecting malformed entries and, in
//! [`OrderingMode::Strict`], lists that are not already sorted.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::{
    ValidationError,
    error::{ConsistencyError, FormatError, SchemaError},
    identifier::{RequirementId, is_identifier},
    value::{TypeMismatch, Value, ValueKind},
    version::{Version, validate_version},
};

/// One of the four kinds of cross-reference a header can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceCategory {
    /// Named parameters from a parameter schema.
    Parameters,
    /// Other requirement documents.
    Requirements,
    /// Build labels of verifying tests.
    Tests,
    /// Citations of external standards.
    Standards,
}

impl ReferenceCategory {
    /// All categories, in the order they are validated.
    pub const ALL: [Self; 4] = [
        Self::Parameters,
        Self::Requirements,
        Self::Tests,
        Self::Standards,
    ];

    /// The key used for this category in the `references` map.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Parameters => "parameters",
            Self::Requirements => "requirements",
            Self::Tests => "tests",
            Self::Standards => "standards",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }
}

impl fmt::Display for ReferenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Whether reference lists must be declared in sorted order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Every category list must be in ascending lexicographic order.
    #[default]
    Strict,
    /// Lists may appear in any order.
    Unordered,
}

/// A declared parameter reference: `name` or `path.ext#name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRef {
    path: Option<String>,
    name: String,
}

impl ParameterRef {
    fn parse(entry: &str) -> Result<Self, &'static str> {
        if entry.is_empty() {
            return Err("parameter reference must not be empty");
        }
        let (path, name) = match entry.split_once('#') {
            Some((path, name)) => {
                if path.is_empty() || !path.contains('.') {
                    return Err("expected 'path.ext#identifier'");
                }
                (Some(path.to_string()), name)
            }
            None => (None, entry),
        };
        if !is_identifier(name) {
            return Err(
                "parameter name must start with a letter or underscore and contain only alphanumerics or '_'",
            );
        }
        Ok(Self {
            path,
            name: name.to_string(),
        })
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file the parameter is defined in, if the path form was used.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Whether a body link target refers to this parameter.
    ///
    /// The path form must match the target exactly; the bare form matches
    /// the target's `#` fragment (or the whole target if it has none).
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        match &self.path {
            Some(path) => target
                .split_once('#')
                .is_some_and(|(p, name)| p == path && name == self.name),
            None => target.split_once('#').map_or(target, |(_, name)| name) == self.name,
        }
    }
}

impl fmt::Display for ParameterRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}#{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A declared reference to another requirement document.
///
/// Written either as a string (an id, or a path ending in `.md`) or as a map
/// with one of `id`/`path` and an optional tracked `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementRef {
    id: RequirementId,
    path: Option<String>,
    version: Option<Version>,
}

impl RequirementRef {
    /// The referenced requirement's id.
    ///
    /// For the path form this is the file stem.
    #[must_use]
    pub const fn id(&self) -> &RequirementId {
        &self.id
    }

    /// The path to the referenced document, if the path form was used.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The version of the referenced document this reference was written
    /// against, if tracked.
    #[must_use]
    pub const fn version(&self) -> Option<Version> {
        self.version
    }

    /// The value this reference is sorted by: the path if present, else the id.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        self.path.as_deref().unwrap_or(self.id.as_str())
    }

    /// Whether a body link target refers to this requirement.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        match &self.path {
            Some(path) => path == target,
            None => md_stem(target) == Some(self.id.as_str()),
        }
    }

    fn parse_str(entry: &str) -> Result<Self, &'static str> {
        let (id, path) = if entry.ends_with(".md") {
            let stem = md_stem(entry).unwrap_or_default();
            (stem, Some(entry.to_string()))
        } else {
            (entry, None)
        };
        let id = RequirementId::new(id.to_string()).map_err(|_| {
            "requirement id must start with a letter or underscore and contain only alphanumerics, '_' or '-'"
        })?;
        Ok(Self {
            id,
            path,
            version: None,
        })
    }

    fn parse(index: usize, value: &Value) -> Result<Self, ValidationError> {
        let context = format!("references.requirements[{index}]");
        let invalid = |entry: String, reason| FormatError::InvalidReference {
            category: ReferenceCategory::Requirements,
            entry,
            reason,
        };

        let map = match value {
            Value::Str(entry) => {
                return Self::parse_str(entry).map_err(|reason| invalid(entry.clone(), reason).into());
            }
            Value::Map(map) => map,
            other => {
                let mismatch = TypeMismatch {
                    expected: ValueKind::Str,
                    found: other.kind(),
                };
                return Err(SchemaError::wrong_type(context, mismatch).into());
            }
        };

        if let Some(key) = map
            .keys()
            .find(|key| !matches!(key.as_str(), "id" | "path" | "version"))
        {
            return Err(invalid(
                format!("{key}: ..."),
                "requirement reference maps may only contain 'id' or 'path' and 'version'",
            )
            .into());
        }

        let entry = match (map.get("id"), map.get("path")) {
            (Some(id), None) => id
                .as_str()
                .map_err(|e| SchemaError::wrong_type(format!("{context}.id"), e))?,
            (None, Some(path)) => path
                .as_str()
                .map_err(|e| SchemaError::wrong_type(format!("{context}.path"), e))?,
            _ => {
                return Err(invalid(
                    format!("{{{}}}", map.keys().cloned().collect::<Vec<_>>().join(", ")),
                    "requirement reference maps must have exactly one of 'id' or 'path'",
                )
                .into());
            }
        };
        let mut reference =
            Self::parse_str(entry).map_err(|reason| invalid(entry.to_string(), reason))?;
        if map.contains_key("id") && reference.path.is_some() {
            return Err(invalid(
                entry.to_string(),
                "an 'id' must not be a path; use the 'path' key instead",
            )
            .into());
        }
        if map.contains_key("path") && reference.path.is_none() {
            return Err(invalid(entry.to_string(), "a 'path' must end in '.md'").into());
        }

        if let Some(version) = map.get("version") {
            reference.version = Some(validate_version(
                &format!("requirement reference '{entry}' version"),
                version,
            )?);
        }
        Ok(reference)
    }
}

impl fmt::Display for RequirementRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.sort_key())?;
        if let Some(version) = self.version {
            write!(f, " (v{version})")?;
        }
        Ok(())
    }
}

/// The file stem of a `.md` path: `reqs/REQ-001.md` → `REQ-001`.
pub(crate) fn md_stem(path: &str) -> Option<&str> {
    path.rsplit('/').next()?.strip_suffix(".md")
}

pub(crate) fn is_test_label(entry: &str) -> bool {
    if let Some(rest) = entry.strip_prefix("//") {
        rest.split_once(':')
            .is_some_and(|(_, target)| !target.is_empty())
    } else if let Some(target) = entry.strip_prefix(':') {
        !target.is_empty() && !target.contains(':')
    } else {
        false
    }
}

/// The validated contents of a header's `references` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    parameters: Vec<ParameterRef>,
    requirements: Vec<RequirementRef>,
    tests: Vec<String>,
    standards: Vec<String>,
}

impl ReferenceSet {
    /// Declared parameter references.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterRef] {
        &self.parameters
    }

    /// Declared requirement references.
    #[must_use]
    pub fn requirements(&self) -> &[RequirementRef] {
        &self.requirements
    }

    /// Declared test labels.
    #[must_use]
    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    /// Declared standard citations.
    #[must_use]
    pub fn standards(&self) -> &[String] {
        &self.standards
    }

    /// Whether no category has any entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
            && self.requirements.is_empty()
            && self.tests.is_empty()
            && self.standards.is_empty()
    }

    fn projection(&self, category: ReferenceCategory) -> Vec<String> {
        match category {
            ReferenceCategory::Parameters => {
                self.parameters.iter().map(ToString::to_string).collect()
            }
            ReferenceCategory::Requirements => self
                .requirements
                .iter()
                .map(|r| r.sort_key().to_string())
                .collect(),
            ReferenceCategory::Tests => self.tests.clone(),
            ReferenceCategory::Standards => self.standards.clone(),
        }
    }
}

/// Validates the `references` section of a requirement header.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceFormatValidator {
    ordering: OrderingMode,
}

impl ReferenceFormatValidator {
    /// Creates a validator with the given ordering rule.
    #[must_use]
    pub const fn new(ordering: OrderingMode) -> Self {
        Self { ordering }
    }

    /// Validates a `references` value and returns the typed set.
    ///
    /// An absent or empty value is valid and yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: a non-map section, an unknown
    /// category key, a malformed entry, a repeated entry, or (in strict mode)
    /// an unsorted list.
    #[instrument(level = "debug", skip(self, value))]
    pub fn validate(&self, value: Option<&Value>) -> Result<ReferenceSet, ValidationError> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Ok(ReferenceSet::default());
        };
        let map = value
            .as_map()
            .map_err(|e| SchemaError::wrong_type("references", e))?;

        if let Some(key) = map
            .keys()
            .find(|key| ReferenceCategory::from_key(key).is_none())
        {
            return Err(FormatError::UnknownCategory(key.clone()).into());
        }

        let mut set = ReferenceSet::default();
        for category in ReferenceCategory::ALL {
            let Some(entries) = map.get(category.key()).filter(|v| !v.is_empty()) else {
                continue;
            };
            let entries = entries
                .as_list()
                .map_err(|e| SchemaError::wrong_type(format!("references.{category}"), e))?;
            Self::parse_category(&mut set, category, entries)?;

            let projection = set.projection(category);
            check_unique(category, &projection)?;
            if self.ordering == OrderingMode::Strict {
                check_sorted(category, projection)?;
            }
        }
        Ok(set)
    }

    fn parse_category<'a>(
        set: &mut ReferenceSet,
        category: ReferenceCategory,
        entries: &'a [Value],
    ) -> Result<(), ValidationError> {
        let invalid = |entry: &str, reason| FormatError::InvalidReference {
            category,
            entry: entry.to_string(),
            reason,
        };
        let entry = |index: usize, value: &'a Value| {
            value
                .as_str()
                .map_err(|e| SchemaError::wrong_type(format!("references.{category}[{index}]"), e))
        };
        for (index, value) in entries.iter().enumerate() {
            match category {
                ReferenceCategory::Requirements => {
                    set.requirements.push(RequirementRef::parse(index, value)?);
                }
                ReferenceCategory::Parameters => {
                    let entry = entry(index, value)?;
                    set.parameters
                        .push(ParameterRef::parse(entry).map_err(|reason| invalid(entry, reason))?);
                }
                ReferenceCategory::Tests => {
                    let entry = entry(index, value)?;
                    if !is_test_label(entry) {
                        return Err(invalid(
                            entry,
                            "test labels must look like '//package:target' or ':target'",
                        )
                        .into());
                    }
                    set.tests.push(entry.to_string());
                }
                ReferenceCategory::Standards => {
                    let entry = entry(index, value)?;
                    if entry.chars().count() < 3 {
                        return Err(invalid(
                            entry,
                            "standard citations must be at least 3 characters long",
                        )
                        .into());
                    }
                    set.standards.push(entry.to_string());
                }
            }
        }
        Ok(())
    }
}

fn check_unique(category: ReferenceCategory, entries: &[String]) -> Result<(), ConsistencyError> {
    let mut seen = BTreeSet::new();
    match entries.iter().find(|entry| !seen.insert(entry.as_str())) {
        Some(entry) => Err(ConsistencyError::DuplicateReference {
            category,
            entry: entry.clone(),
        }),
        None => Ok(()),
    }
}

fn check_sorted(category: ReferenceCategory, current: Vec<String>) -> Result<(), ConsistencyError> {
    let mut expected = current.clone();
    expected.sort();
    if current == expected {
        Ok(())
    } else {
        Err(ConsistencyError::Unsorted {
            category,
            current,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::VersionError;

    fn refs(pairs: Vec<(&str, Value)>) -> Value {
        pairs.into_iter().collect()
    }

    fn strict(value: &Value) -> Result<ReferenceSet, ValidationError> {
        ReferenceFormatValidator::new(OrderingMode::Strict).validate(Some(value))
    }

    #[test]
    fn absent_or_empty_is_valid() {
        let validator = ReferenceFormatValidator::default();
        assert!(validator.validate(None).unwrap().is_empty());
        assert!(validator.validate(Some(&refs(vec![]))).unwrap().is_empty());
        assert!(
            validator
                .validate(Some(&refs(vec![("tests", Value::List(vec![]))])))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn unknown_category_is_named() {
        let error = strict(&refs(vec![("links", Value::from(vec!["x"]))])).unwrap_err();
        assert_eq!(
            error,
            FormatError::UnknownCategory("links".to_string()).into()
        );
        assert!(error.to_string().contains("'links'"));
    }

    #[test]
    fn parameter_forms() {
        let set = strict(&refs(vec![(
            "parameters",
            Value::from(vec!["max_velocity", "params.bzl#min_gap"]),
        )]))
        .unwrap();
        assert_eq!(set.parameters()[0].name(), "max_velocity");
        assert_eq!(set.parameters()[0].path(), None);
        assert_eq!(set.parameters()[1].path(), Some("params.bzl"));
        assert_eq!(set.parameters()[1].to_string(), "params.bzl#min_gap");

        for bad in ["", "1param", "has-hyphen", "#name", "nopath#name", "params.bzl#"] {
            let error = strict(&refs(vec![("parameters", Value::from(vec![bad]))]));
            assert!(
                matches!(
                    error,
                    Err(ValidationError::Format(FormatError::InvalidReference { .. }))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn parameter_matching() {
        let bare = ParameterRef::parse("max_velocity").unwrap();
        assert!(bare.matches("params.bzl#max_velocity"));
        assert!(bare.matches("max_velocity"));
        assert!(!bare.matches("params.bzl#min_velocity"));

        let pathed = ParameterRef::parse("params.bzl#max_velocity").unwrap();
        assert!(pathed.matches("params.bzl#max_velocity"));
        assert!(!pathed.matches("other.bzl#max_velocity"));
        assert!(!pathed.matches("max_velocity"));
    }

    #[test]
    fn requirement_forms() {
        let set = strict(&refs(vec![(
            "requirements",
            Value::List(vec![
                Value::from("REQ-001"),
                [("id", Value::from("REQ-002")), ("version", Value::Int(3))]
                    .into_iter()
                    .collect(),
                [("path", Value::from("sys/SYS-001.md"))]
                    .into_iter()
                    .collect(),
            ]),
        )]))
        .unwrap();

        let reqs = set.requirements();
        assert_eq!(reqs[0].id().as_str(), "REQ-001");
        assert_eq!(reqs[1].version().map(Version::get), Some(3));
        assert_eq!(reqs[2].id().as_str(), "SYS-001");
        assert_eq!(reqs[2].path(), Some("sys/SYS-001.md"));
        assert!(reqs[2].matches("sys/SYS-001.md"));
        assert!(reqs[0].matches("../REQ-001.md"));
    }

    #[test]
    fn requirement_version_must_be_positive() {
        let error = strict(&refs(vec![(
            "requirements",
            Value::List(vec![
                [("id", Value::from("REQ-002")), ("version", Value::Int(0))]
                    .into_iter()
                    .collect(),
            ]),
        )]))
        .unwrap_err();
        assert!(matches!(
            error,
            ValidationError::Version(VersionError::NonPositive { value: 0, .. })
        ));
    }

    #[test]
    fn requirement_map_needs_exactly_one_target() {
        for map in [
            vec![("version", Value::Int(1))],
            vec![("id", Value::from("A")), ("path", Value::from("A.md"))],
            vec![("id", Value::from("A")), ("owner", Value::from("me"))],
        ] {
            let value = Value::List(vec![map.into_iter().collect()]);
            assert!(strict(&refs(vec![("requirements", value)])).is_err());
        }
    }

    #[test]
    fn test_labels() {
        assert!(is_test_label("//pkg/path:target_test"));
        assert!(is_test_label(":local_test"));
        assert!(!is_test_label("//pkg/path"));
        assert!(!is_test_label("//pkg:"));
        assert!(!is_test_label(":"));
        assert!(!is_test_label("pkg:target"));
    }

    #[test]
    fn standards_need_three_characters() {
        assert!(strict(&refs(vec![("standards", Value::from(vec!["ISO 26262:2018"]))])).is_ok());
        assert!(strict(&refs(vec![("standards", Value::from(vec!["IS"]))])).is_err());
    }

    #[test]
    fn strict_ordering_is_the_default_contract() {
        let unsorted = refs(vec![("parameters", Value::from(vec!["z_param", "a_param"]))]);
        let error = ReferenceFormatValidator::default()
            .validate(Some(&unsorted))
            .unwrap_err();
        assert_eq!(
            error,
            ConsistencyError::Unsorted {
                category: ReferenceCategory::Parameters,
                current: vec!["z_param".to_string(), "a_param".to_string()],
                expected: vec!["a_param".to_string(), "z_param".to_string()],
            }
            .into()
        );

        let sorted = refs(vec![("parameters", Value::from(vec!["a_param", "z_param"]))]);
        assert!(ReferenceFormatValidator::default().validate(Some(&sorted)).is_ok());
    }

    #[test]
    fn repeated_entries_are_rejected_in_any_order_mode() {
        let repeated = refs(vec![(
            "requirements",
            Value::from(vec!["SYS-001", "SYS-002", "SYS-001"]),
        )]);
        for ordering in [OrderingMode::Strict, OrderingMode::Unordered] {
            let error = ReferenceFormatValidator::new(ordering)
                .validate(Some(&repeated))
                .unwrap_err();
            assert_eq!(
                error.to_string(),
                "requirements reference 'SYS-001' is declared more than once"
            );
        }

        let sorted_repeat = refs(vec![("tests", Value::from(vec!["//a:a", "//a:a"]))]);
        assert_eq!(
            ReferenceFormatValidator::default()
                .validate(Some(&sorted_repeat))
                .unwrap_err(),
            ConsistencyError::DuplicateReference {
                category: ReferenceCategory::Tests,
                entry: "//a:a".to_string(),
            }
            .into()
        );
    }

    #[test]
    fn unordered_mode_accepts_any_order() {
        let unsorted = refs(vec![("tests", Value::from(vec!["//b:b", "//a:a"]))]);
        assert!(
            ReferenceFormatValidator::new(OrderingMode::Unordered)
                .validate(Some(&unsorted))
                .is_ok()
        );
    }

    #[test]
    fn requirement_maps_sort_by_id_or_path() {
        let value = refs(vec![(
            "requirements",
            Value::List(vec![
                [("id", Value::from("REQ-002"))].into_iter().collect(),
                Value::from("REQ-001"),
            ]),
        )]);
        let error = strict(&value).unwrap_err();
        assert!(error.to_string().contains("Expected order: [REQ-001, REQ-002]"));
    }

    #[test]
    fn entries_must_be_strings() {
        let error = strict(&refs(vec![("tests", Value::List(vec![Value::Int(3)]))])).unwrap_err();
        assert_eq!(
            error.to_string(),
            "references.tests[0] must be a string, found integer"
        );
    }
}
