//! Validation for requirement documents and parameter schemas.
//!
//! Requirement documents are markdown files with a frontmatter header. The
//! header declares metadata and cross-references; the body uses them as
//! inline links. Validation checks each document on its own, and then checks
//! version tracking across the whole corpus.

pub mod domain;
pub use domain::{
    Config, RequirementHeader, ValidationError, Value, collect_versions,
    detect_dangling_references, detect_stale_references, validate_parameter_schema,
    validate_requirement_document,
};

/// Filesystem loading and text formats.
pub mod storage;
pub use storage::Corpus;
