//! Typed parameter schemas.
//!
//! A parameter file declares a namespace and a list of named, typed
//! parameters. Scalars carry a single value; tables carry typed columns and
//! rows of cells. [`validate_parameter_schema`] checks a loaded [`Value`] and
//! returns the typed [`ParameterSchema`] that code generators consume.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use nonempty::NonEmpty;
use tracing::instrument;

use crate::domain::{
    ValidationError,
    error::{ConsistencyError, SchemaError},
    identifier::Namespace,
    value::{TypeMismatch, Value, ValueKind},
};

/// The declared type of a parameter or table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// A floating point number. Integers are accepted.
    Float,
    /// A whole number.
    Integer,
    /// A string.
    String,
    /// `true` or `false`.
    Boolean,
    /// Rows of typed cells.
    Table,
}

impl ParameterKind {
    const ALLOWED: [&'static str; 5] = ["boolean", "float", "integer", "string", "table"];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Table => "table",
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "float" => Some(Self::Float),
            "integer" => Some(Self::Integer),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "table" => Some(Self::Table),
            _ => None,
        }
    }

    fn parse(context: &str, value: &Value) -> Result<Self, SchemaError> {
        let raw = value
            .as_str()
            .map_err(|e| SchemaError::wrong_type(format!("{context} type"), e))?;
        Self::from_wire(raw).ok_or_else(|| SchemaError::InvalidChoice {
            context: context.to_string(),
            field: "type",
            value: raw.to_string(),
            allowed: Self::ALLOWED.to_vec(),
        })
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// A float value.
    Float(f64),
    /// An integer value.
    Integer(i64),
    /// A string value.
    String(String),
    /// A boolean value.
    Boolean(bool),
}

impl Scalar {
    /// The kind of this scalar.
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        match self {
            Self::Float(_) => ParameterKind::Float,
            Self::Integer(_) => ParameterKind::Integer,
            Self::String(_) => ParameterKind::String,
            Self::Boolean(_) => ParameterKind::Boolean,
        }
    }

    fn parse(kind: ParameterKind, context: &str, value: &Value) -> Result<Self, SchemaError> {
        let wrong_type = |e| SchemaError::wrong_type(context, e);
        Ok(match kind {
            ParameterKind::Float => Self::Float(value.as_number().map_err(wrong_type)?),
            ParameterKind::Integer => Self::Integer(value.as_int().map_err(wrong_type)?),
            ParameterKind::String => Self::String(value.as_str().map_err(wrong_type)?.to_string()),
            ParameterKind::Boolean => Self::Boolean(value.as_bool().map_err(wrong_type)?),
            ParameterKind::Table => {
                return Err(SchemaError::wrong_type(
                    context,
                    TypeMismatch {
                        expected: ValueKind::List,
                        found: value.kind(),
                    },
                ));
            }
        })
    }
}

/// One column of a table parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    name: String,
    kind: ParameterKind,
    unit: Option<String>,
}

impl ColumnDef {
    /// The column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type of every cell in this column. Never [`ParameterKind::Table`].
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// The column's unit, if declared.
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// The value of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// A single value.
    Scalar(Scalar),
    /// A table with at least one column. Every row has one cell per column,
    /// and every cell matches its column's kind.
    Table {
        /// The column definitions.
        columns: NonEmpty<ColumnDef>,
        /// The rows, in declaration order.
        rows: Vec<Vec<Scalar>>,
    },
}

impl ParameterValue {
    /// The declared kind of the parameter.
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        match self {
            Self::Scalar(scalar) => scalar.kind(),
            Self::Table { .. } => ParameterKind::Table,
        }
    }
}

/// A validated parameter definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    name: String,
    description: String,
    unit: Option<String>,
    value: ParameterValue,
}

impl ParameterDef {
    /// The parameter name, unique within its schema.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The unit, if declared.
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// The parameter's value.
    #[must_use]
    pub const fn value(&self) -> &ParameterValue {
        &self.value
    }

    /// The declared kind.
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        self.value.kind()
    }
}

/// A validated parameter file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    schema_version: String,
    namespace: Namespace,
    parameters: Vec<ParameterDef>,
}

impl ParameterSchema {
    /// The declared schema version.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// The namespace the parameters are generated into.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The parameters, in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

fn required<'a>(
    map: &'a BTreeMap<String, Value>,
    context: &str,
    field: &'static str,
) -> Result<&'a Value, SchemaError> {
    map.get(field)
        .ok_or_else(|| SchemaError::missing(context, field))
}

fn required_str<'a>(
    map: &'a BTreeMap<String, Value>,
    context: &str,
    field: &'static str,
) -> Result<&'a str, SchemaError> {
    required(map, context, field)?
        .as_str()
        .map_err(|e| SchemaError::wrong_type(format!("{context} {field}"), e))
}

fn optional_str(
    map: &BTreeMap<String, Value>,
    context: &str,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    map.get(field)
        .map(|value| {
            value
                .as_str()
                .map(ToString::to_string)
                .map_err(|e| SchemaError::wrong_type(format!("{context} {field}"), e))
        })
        .transpose()
}

/// Validates a parameter file and returns the typed schema.
///
/// Required fields are `schema_version`, `namespace` and `parameters`. Each
/// parameter needs `name`, `type` and `description`; scalars need a `value`
/// of the declared type, tables need `columns` and `rows`.
///
/// # Errors
///
/// Returns the first problem found, naming the parameter (and row and column
/// for table cells) where possible.
#[instrument(level = "debug", skip_all)]
pub fn validate_parameter_schema(data: &Value) -> Result<ParameterSchema, ValidationError> {
    const CONTEXT: &str = "parameter file";

    let map = data
        .as_map()
        .map_err(|e| SchemaError::wrong_type(CONTEXT, e))?;

    let schema_version = match required(map, CONTEXT, "schema_version")? {
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        other => {
            return Err(SchemaError::wrong_type(
                "schema_version",
                TypeMismatch {
                    expected: ValueKind::Str,
                    found: other.kind(),
                },
            )
            .into());
        }
    };
    let namespace = required(map, CONTEXT, "namespace")?
        .as_str()
        .map_err(|e| SchemaError::wrong_type("namespace", e))?;
    let namespace = Namespace::new(namespace.to_string())?;
    let entries = required(map, CONTEXT, "parameters")?
        .as_list()
        .map_err(|e| SchemaError::wrong_type("parameters", e))?;

    let mut seen = BTreeSet::new();
    let mut parameters = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let parameter = parse_parameter(index, entry)?;
        if !seen.insert(parameter.name.clone()) {
            return Err(ConsistencyError::DuplicateParameter(parameter.name).into());
        }
        parameters.push(parameter);
    }

    tracing::debug!(
        "validated {} parameters in namespace {namespace}",
        parameters.len()
    );
    Ok(ParameterSchema {
        schema_version,
        namespace,
        parameters,
    })
}

fn parse_parameter(index: usize, value: &Value) -> Result<ParameterDef, SchemaError> {
    let context = format!("Parameter at index {index}");
    let map = value
        .as_map()
        .map_err(|e| SchemaError::wrong_type(context.as_str(), e))?;

    let name = required_str(map, &context, "name")?.to_string();
    let kind = required(map, &context, "type")?;
    let description = required_str(map, &context, "description")?.to_string();

    let context = format!("Parameter '{name}'");
    let kind = ParameterKind::parse(&context, kind)?;
    let unit = optional_str(map, &context, "unit")?;

    let value = if kind == ParameterKind::Table {
        parse_table(&name, map)?
    } else {
        let value = required(map, &context, "value")?;
        ParameterValue::Scalar(Scalar::parse(kind, &context, value)?)
    };

    Ok(ParameterDef {
        name,
        description,
        unit,
        value,
    })
}

fn parse_table(
    name: &str,
    map: &BTreeMap<String, Value>,
) -> Result<ParameterValue, SchemaError> {
    let context = format!("Table parameter '{name}'");
    let columns = required(map, &context, "columns")?;
    let rows = required(map, &context, "rows")?;

    let columns = columns
        .as_list()
        .map_err(|e| SchemaError::wrong_type(format!("{context} columns"), e))?
        .iter()
        .enumerate()
        .map(|(index, column)| parse_column(name, index, column))
        .collect::<Result<Vec<_>, _>>()?;
    let columns = NonEmpty::from_vec(columns).ok_or_else(|| SchemaError::NoColumns {
        parameter: name.to_string(),
    })?;

    let rows = rows
        .as_list()
        .map_err(|e| SchemaError::wrong_type(format!("{context} rows"), e))?
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            let cells = row
                .as_list()
                .map_err(|e| SchemaError::wrong_type(format!("{context} row {row_index}"), e))?;
            if cells.len() != columns.len() {
                return Err(SchemaError::RowLength {
                    parameter: name.to_string(),
                    row: row_index,
                    found: cells.len(),
                    expected: columns.len(),
                });
            }
            cells
                .iter()
                .zip(columns.iter())
                .enumerate()
                .map(|(column_index, (cell, column))| {
                    Scalar::parse(
                        column.kind,
                        &format!("{context} row {row_index} column {column_index}"),
                        cell,
                    )
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParameterValue::Table { columns, rows })
}

fn parse_column(parameter: &str, index: usize, value: &Value) -> Result<ColumnDef, SchemaError> {
    let context = format!("Table parameter '{parameter}' column {index}");
    let map = value
        .as_map()
        .map_err(|e| SchemaError::wrong_type(context.as_str(), e))?;

    let name = required_str(map, &context, "name")?.to_string();
    let kind = ParameterKind::parse(&context, required(map, &context, "type")?)?;
    if kind == ParameterKind::Table {
        return Err(SchemaError::NestedTable {
            parameter: parameter.to_string(),
            column: name,
        });
    }
    let unit = optional_str(map, &context, "unit")?;

    Ok(ColumnDef { name, kind, unit })
}
