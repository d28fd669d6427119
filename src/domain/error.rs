//! The validation error taxonomy.
//!
//! Every validator in the crate is fail-fast: the first problem found is
//! returned as a [`ValidationError`], whose `Display` text is the message
//! surfaced verbatim to the caller.

use crate::domain::{
    identifier,
    reference::ReferenceCategory,
    value::{TypeMismatch, ValueKind},
};

/// A document or schema failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The document could not be split into header and body.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// A required field is missing or has the wrong type.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An identifier, namespace or reference does not match its pattern.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Header and body disagree, or a list is out of order or has duplicates.
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    /// A version or changelog is invalid.
    #[error(transparent)]
    Version(#[from] VersionError),
}

impl From<identifier::Error> for ValidationError {
    fn from(error: identifier::Error) -> Self {
        Self::Format(FormatError::Identifier(error))
    }
}

/// Missing or malformed document structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// The document has no header, or the header is not terminated.
    #[error("document must have a frontmatter header delimited by '---' lines")]
    MissingHeader,

    /// The header was parsed but is not a `key: value` mapping.
    #[error("frontmatter header must be a mapping of keys to values, found {0}")]
    HeaderNotMap(ValueKind),
}

/// A field is missing, has the wrong type, or has an unsupported value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// A required field is absent.
    #[error("{context} missing required field: {field}")]
    MissingField {
        /// Where the field was expected.
        context: String,
        /// The name of the missing field.
        field: &'static str,
    },

    /// A field holds a value of the wrong kind.
    #[error("{context} must be a {}, found {}", .mismatch.expected, .mismatch.found)]
    WrongType {
        /// The field (or cell) that was checked.
        context: String,
        /// The expected and actual kinds.
        mismatch: TypeMismatch,
    },

    /// A field holds a value outside its allowed set.
    #[error("{context} has invalid {field}: '{value}'. Valid values are: {}", .allowed.join(", "))]
    InvalidChoice {
        /// Where the field lives.
        context: String,
        /// The name of the field.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// The accepted values.
        allowed: Vec<&'static str>,
    },

    /// A table parameter declares no columns.
    #[error("table parameter '{parameter}' must have at least one column")]
    NoColumns {
        /// The table parameter.
        parameter: String,
    },

    /// A table column is itself declared as a table.
    #[error("table parameter '{parameter}' column '{column}' cannot be of type table")]
    NestedTable {
        /// The table parameter.
        parameter: String,
        /// The offending column.
        column: String,
    },

    /// A table row has the wrong number of cells.
    #[error(
        "table parameter '{parameter}' row {row} has {found} columns but expected {expected}"
    )]
    RowLength {
        /// The table parameter.
        parameter: String,
        /// Zero-based row index.
        row: usize,
        /// Number of cells in the row.
        found: usize,
        /// Number of declared columns.
        expected: usize,
    },

    /// A changelog entry has an empty description.
    #[error("changelog entry for version {version} must have a non-empty description")]
    EmptyDescription {
        /// The version of the offending entry.
        version: u64,
    },

    /// A string field that must carry text is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// The name of the field.
        field: &'static str,
    },
}

impl SchemaError {
    pub(crate) fn wrong_type(context: impl Into<String>, mismatch: TypeMismatch) -> Self {
        Self::WrongType {
            context: context.into(),
            mismatch,
        }
    }

    pub(crate) fn missing(context: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            context: context.into(),
            field,
        }
    }
}

/// A value does not match the syntax required for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// An id or namespace is malformed.
    #[error(transparent)]
    Identifier(identifier::Error),

    /// The references section uses a key outside the known categories.
    #[error(
        "unknown reference category '{0}': only parameters, requirements, tests and standards are allowed"
    )]
    UnknownCategory(String),

    /// A single reference entry is malformed.
    #[error("invalid {category} reference '{entry}': {reason}")]
    InvalidReference {
        /// The category the entry was listed under.
        category: ReferenceCategory,
        /// The offending entry, as written.
        entry: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The document body is too short to be meaningful.
    #[error("body must contain at least {min} characters of description, found {found}")]
    BodyTooShort {
        /// Configured minimum.
        min: usize,
        /// Actual trimmed length.
        found: usize,
    },
}

/// Declared metadata disagrees with itself or with the document body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    /// The body links to references but the header declares none.
    #[error("body contains references but header has no references section")]
    MissingReferencesSection,

    /// A reference used in the body is absent from the header.
    #[error("body references {category} '{target}' not declared in header")]
    Undeclared {
        /// The reference category.
        category: ReferenceCategory,
        /// The link target used in the body.
        target: String,
    },

    /// A reference declared in the header is never used in the body.
    #[error("header declares {category} '{entry}' not used in body")]
    Unused {
        /// The reference category.
        category: ReferenceCategory,
        /// The header entry, as written.
        entry: String,
    },

    /// A link's text does not agree with its target.
    #[error("{category} link text '{text}' does not match '{expected}' in target '{target}'")]
    LinkText {
        /// The reference category.
        category: ReferenceCategory,
        /// The link text.
        text: String,
        /// The link target.
        target: String,
        /// The text implied by the target.
        expected: String,
    },

    /// Two parameters in one schema share a name.
    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),

    /// A reference category lists the same entry twice.
    #[error("{category} reference '{entry}' is declared more than once")]
    DuplicateReference {
        /// The reference category.
        category: ReferenceCategory,
        /// The repeated entry, as written.
        entry: String,
    },

    /// A reference list is not in ascending lexicographic order.
    #[error(
        "'{category}' references are not sorted lexicographically. Current order: [{}]. Expected order: [{}]",
        .current.join(", "),
        .expected.join(", ")
    )]
    Unsorted {
        /// The reference category.
        category: ReferenceCategory,
        /// The order as written.
        current: Vec<String>,
        /// The sorted order.
        expected: Vec<String>,
    },
}

/// A version number or changelog is invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    /// A version is zero or negative.
    #[error("{context} must be a positive integer (>= 1), found {value}")]
    NonPositive {
        /// Where the version appeared.
        context: String,
        /// The rejected value.
        value: i64,
    },

    /// The changelog is not strictly descending.
    #[error(
        "changelog must be in strictly descending version order, but version {next} follows version {previous}"
    )]
    NotDescending {
        /// The earlier entry's version.
        previous: u64,
        /// The later entry's version.
        next: u64,
    },

    /// The header version disagrees with the newest changelog entry.
    #[error("version {version} does not match latest changelog version {changelog}")]
    ChangelogMismatch {
        /// The header's `version` field.
        version: u64,
        /// The first changelog entry's version.
        changelog: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_verbatim() {
        let error: ValidationError = StructuralError::MissingHeader.into();
        assert!(error.to_string().contains("frontmatter header"));

        let error: ValidationError = ConsistencyError::Undeclared {
            category: ReferenceCategory::Parameters,
            target: "params.bzl#max_velocity".to_string(),
        }
        .into();
        assert_eq!(
            error.to_string(),
            "body references parameters 'params.bzl#max_velocity' not declared in header"
        );
    }

    #[test]
    fn row_length_names_row_and_expected_count() {
        let error = SchemaError::RowLength {
            parameter: "braking".to_string(),
            row: 1,
            found: 2,
            expected: 3,
        };
        assert_eq!(
            error.to_string(),
            "table parameter 'braking' row 1 has 2 columns but expected 3"
        );
    }

    #[test]
    fn unsorted_lists_both_orders() {
        let error = ConsistencyError::Unsorted {
            category: ReferenceCategory::Parameters,
            current: vec!["z_param".to_string(), "a_param".to_string()],
            expected: vec!["a_param".to_string(), "z_param".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "'parameters' references are not sorted lexicographically. Current order: [z_param, a_param]. Expected order: [a_param, z_param]"
        );
    }
}
