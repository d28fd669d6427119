//! Requirement documents: header metadata plus a Markdown body.
//!
//! [`Validator::validate_document`] is the single entry point. It splits the
//! text into header and body, checks every header field, and then checks the
//! header's references against the links used in the body. The first problem
//! found is returned.

use std::fmt;

use non_empty_string::NonEmptyString;
use serde::Serialize;
use tracing::instrument;

use crate::{
    domain::{
        Config, ValidationError,
        consistency::ConsistencyChecker,
        error::{FormatError, SchemaError, StructuralError},
        identifier::RequirementId,
        reference::{ReferenceFormatValidator, ReferenceSet},
        value::{TypeMismatch, Value, ValueKind},
        version::{ChangelogEntry, History, Version, validate_history},
    },
    storage::frontmatter::{self, Document},
};

/// What a requirement constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// Behaviour the system must exhibit.
    Functional,
    /// A quality attribute.
    NonFunctional,
    /// A timing, throughput or resource bound.
    Performance,
    /// A safety goal or safety requirement.
    Safety,
    /// A security property.
    Security,
    /// An interface contract.
    Interface,
    /// A design or implementation constraint.
    Constraint,
}

impl RequirementKind {
    const VARIANTS: [(&'static str, Self); 7] = [
        ("functional", Self::Functional),
        ("non_functional", Self::NonFunctional),
        ("performance", Self::Performance),
        ("safety", Self::Safety),
        ("security", Self::Security),
        ("interface", Self::Interface),
        ("constraint", Self::Constraint),
    ];
}

/// Where a requirement is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Being written.
    Draft,
    /// Submitted for review.
    Proposed,
    /// Reviewed and accepted.
    Approved,
    /// Implemented in the product.
    Implemented,
    /// Implementation verified by tests.
    Verified,
    /// No longer applies.
    Deprecated,
}

impl Status {
    const VARIANTS: [(&'static str, Self); 6] = [
        ("draft", Self::Draft),
        ("proposed", Self::Proposed),
        ("approved", Self::Approved),
        ("implemented", Self::Implemented),
        ("verified", Self::Verified),
        ("deprecated", Self::Deprecated),
    ];
}

/// How important a requirement is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Nice to have.
    Low,
    /// Should have.
    Medium,
    /// Must have.
    High,
    /// Must have, safety or mission critical.
    Critical,
}

impl Priority {
    const VARIANTS: [(&'static str, Self); 4] = [
        ("low", Self::Low),
        ("medium", Self::Medium),
        ("high", Self::High),
        ("critical", Self::Critical),
    ];
}

fn wire_name<T: PartialEq + Copy, const N: usize>(
    value: T,
    variants: [(&'static str, T); N],
) -> &'static str {
    variants
        .into_iter()
        .find(|(_, variant)| *variant == value)
        .map_or("", |(name, _)| name)
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(wire_name(*self, Self::VARIANTS))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(wire_name(*self, Self::VARIANTS))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(wire_name(*self, Self::VARIANTS))
    }
}

fn parse_choice<T: Copy, const N: usize>(
    field: &'static str,
    value: &Value,
    variants: [(&'static str, T); N],
) -> Result<T, SchemaError> {
    let raw = value
        .as_str()
        .map_err(|e| SchemaError::wrong_type(field, e))?;
    variants
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, variant)| *variant)
        .ok_or_else(|| SchemaError::InvalidChoice {
            context: "requirement".to_string(),
            field,
            value: raw.to_string(),
            allowed: variants.iter().map(|(name, _)| *name).collect(),
        })
}

/// The validated header of a requirement document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementHeader {
    id: RequirementId,
    title: NonEmptyString,
    kind: RequirementKind,
    status: Status,
    priority: Option<Priority>,
    owner: Option<String>,
    tags: Vec<String>,
    history: History,
    references: ReferenceSet,
}

impl RequirementHeader {
    /// The requirement's unique id.
    #[must_use]
    pub const fn id(&self) -> &RequirementId {
        &self.id
    }

    /// The one-line title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// The requirement's `type`.
    #[must_use]
    pub const fn kind(&self) -> RequirementKind {
        self.kind
    }

    /// The lifecycle status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// The priority, if declared.
    #[must_use]
    pub const fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// The owner, if declared.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Free-form tags, in declaration order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The current version, if declared.
    #[must_use]
    pub const fn version(&self) -> Option<Version> {
        self.history.version
    }

    /// Revision history, newest first.
    #[must_use]
    pub fn changelog(&self) -> &[ChangelogEntry] {
        &self.history.changelog
    }

    /// The declared cross-references.
    #[must_use]
    pub const fn references(&self) -> &ReferenceSet {
        &self.references
    }
}

/// A requirement document that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDocument {
    /// The typed header.
    pub header: RequirementHeader,
    /// The Markdown body, as written.
    pub body: String,
}

/// Validates requirement documents against a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: Config,
}

impl Validator {
    /// Creates a validator using the given configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// The configuration this validator applies.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Validates a complete requirement document.
    ///
    /// Checks run in this order:
    ///
    /// 1. the document has a `---` delimited header that is a map;
    /// 2. `id`, `title`, `type` and `status` are present strings;
    /// 3. `id` is a valid requirement id;
    /// 4. `type`, `status` and `priority` hold known values;
    /// 5. `owner` is a string and `tags` a list of strings, if present;
    /// 6. the trimmed body is at least `min_body_length` characters;
    /// 7. `references` is well formed (and sorted, in strict mode);
    /// 8. `version` and `changelog` agree;
    /// 9. body links and header references agree.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    #[instrument(level = "debug", skip_all)]
    pub fn validate_document(&self, text: &str) -> Result<ValidatedDocument, ValidationError> {
        const CONTEXT: &str = "requirement";

        let Document { header, body } = frontmatter::parse(text);
        let header = header.ok_or(StructuralError::MissingHeader)?;
        let map = match &header {
            Value::Map(map) => map,
            other => return Err(StructuralError::HeaderNotMap(other.kind()).into()),
        };

        for field in ["id", "title", "type", "status"] {
            if !map.contains_key(field) {
                return Err(SchemaError::missing(CONTEXT, field).into());
            }
        }
        let field = |name: &'static str| {
            map.get(name)
                .ok_or_else(|| SchemaError::missing(CONTEXT, name))
        };

        let id = field("id")?
            .as_str()
            .map_err(|e| SchemaError::wrong_type("id", e))?;
        let title = field("title")?
            .as_str()
            .map_err(|e| SchemaError::wrong_type("title", e))?;
        let id = RequirementId::new(id.to_string())?;
        let title = NonEmptyString::new(title.trim().to_string())
            .map_err(|_| SchemaError::Empty { field: "title" })?;

        let kind = parse_choice("type", field("type")?, RequirementKind::VARIANTS)?;
        let status = parse_choice("status", field("status")?, Status::VARIANTS)?;
        let priority = map
            .get("priority")
            .map(|value| parse_choice("priority", value, Priority::VARIANTS))
            .transpose()?;

        let owner = map
            .get("owner")
            .map(|value| {
                value
                    .as_str()
                    .map(ToString::to_string)
                    .map_err(|e| SchemaError::wrong_type("owner", e))
            })
            .transpose()?;
        let tags = parse_tags(map.get("tags"))?;

        let found = body.trim().chars().count();
        let min = self.config.min_body_length();
        if found < min {
            return Err(FormatError::BodyTooShort { min, found }.into());
        }

        let references = ReferenceFormatValidator::new(self.config.reference_ordering)
            .validate(map.get("references"))?;
        let history = validate_history(map.get("version"), map.get("changelog"))?;
        ConsistencyChecker.check(body, &references)?;

        tracing::debug!("validated requirement {id}");
        Ok(ValidatedDocument {
            header: RequirementHeader {
                id,
                title,
                kind,
                status,
                priority,
                owner,
                tags,
                history,
                references,
            },
            body: body.to_string(),
        })
    }
}

fn parse_tags(value: Option<&Value>) -> Result<Vec<String>, SchemaError> {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return Ok(Vec::new());
    };
    value
        .as_list()
        .map_err(|e| SchemaError::wrong_type("tags", e))?
        .iter()
        .enumerate()
        .map(|(index, tag)| match tag {
            Value::Str(tag) => Ok(tag.clone()),
            other => Err(SchemaError::wrong_type(
                format!("tags[{index}]"),
                TypeMismatch {
                    expected: ValueKind::Str,
                    found: other.kind(),
                },
            )),
        })
        .collect()
}

/// Validates a requirement document with the default configuration.
///
/// # Errors
///
/// See [`Validator::validate_document`].
pub fn validate_requirement_document(text: &str) -> Result<ValidatedDocument, ValidationError> {
    Validator::default().validate_document(text)
}
