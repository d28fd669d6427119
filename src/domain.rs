//! Domain models for requirement documents and parameter schemas.
//!
//! This module contains the validators and the typed values they produce.
//! Nothing here touches the filesystem.

pub mod consistency;
pub mod error;
/// Requirement ids and parameter namespaces.
pub mod identifier;
pub mod parameter;
pub mod reference;
pub mod requirement;
/// The dynamically typed value produced by parsers.
pub mod value;
pub mod version;

mod config;
pub use config::Config;

pub use error::ValidationError;
pub use identifier::{Namespace, RequirementId};
pub use parameter::{ParameterSchema, validate_parameter_schema};
pub use reference::{OrderingMode, ReferenceSet};
pub use requirement::{
    RequirementHeader, ValidatedDocument, Validator, validate_requirement_document,
};
pub use value::Value;
pub use version::{
    CorpusContext, DanglingReference, StaleReference, collect_versions,
    detect_dangling_references, detect_stale_references,
};
