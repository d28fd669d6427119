//! Loading parameter files from YAML or JSON.

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::instrument;

use crate::domain::{ParameterSchema, ValidationError, Value, validate_parameter_schema};

/// Errors that can occur when loading a parameter file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read parameter file: {0}")]
    Io(#[from] io::Error),
    /// The file is not valid YAML.
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The file is not valid JSON.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The file extension is not `.yaml`, `.yml` or `.json`.
    #[error("unsupported parameter file extension: {}", .0.display())]
    UnsupportedExtension(PathBuf),
    /// The file was read but the schema is invalid.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Reads a parameter file into a [`Value`] without validating it.
///
/// The format is chosen by extension: `.yaml`/`.yml` or `.json`.
///
/// # Errors
///
/// Returns an error if the extension is unsupported, or the file cannot be
/// read or parsed.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load_parameter_file(path: &Path) -> Result<Value, LoadError> {
    let extension = path.extension().and_then(|e| e.to_str());
    let parse: fn(&str) -> Result<Value, LoadError> = match extension {
        Some("yaml" | "yml") => |text| Ok(serde_yaml::from_str(text)?),
        Some("json") => |text| Ok(serde_json::from_str(text)?),
        _ => return Err(LoadError::UnsupportedExtension(path.to_path_buf())),
    };
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Reads and validates a parameter file.
///
/// Returns both the raw data and the typed schema.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded (see
/// [`load_parameter_file`]) or fails validation.
pub fn load_parameter_schema(path: &Path) -> Result<(Value, ParameterSchema), LoadError> {
    let data = load_parameter_file(path)?;
    let schema = validate_parameter_schema(&data)?;
    Ok((data, schema))
}
