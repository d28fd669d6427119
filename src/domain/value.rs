use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A dynamically typed header value.
///
/// This is the universal representation produced by the frontmatter parser
/// and by the parameter-file loaders. Validators never inspect it by pattern
/// matching on raw text; they go through the typed accessors, which fail with
/// a [`TypeMismatch`] rather than coercing silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// An empty value (a bare `-` list item, or `null` in YAML/JSON).
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// A whole number.
    Int(i64),
    /// A floating point number.
    ///
    /// The frontmatter parser never produces this; it comes from YAML or JSON
    /// parameter files.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered sequence of values.
    List(Vec<Self>),
    /// A string-keyed mapping.
    Map(BTreeMap<String, Self>),
}

/// The variant of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// [`Value::Null`]
    Null,
    /// [`Value::Bool`]
    Bool,
    /// [`Value::Int`]
    Int,
    /// [`Value::Float`]
    Float,
    /// [`Value::Int`] or [`Value::Float`]
    Number,
    /// [`Value::Str`]
    Str,
    /// [`Value::List`]
    List,
    /// [`Value::Map`]
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::Str => "string",
            Self::List => "list",
            Self::Map => "map",
        };
        f.write_str(name)
    }
}

/// A typed accessor was used on a value of a different kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    /// The kind the caller asked for.
    pub expected: ValueKind,
    /// The kind the value actually has.
    pub found: ValueKind,
}

impl Value {
    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    const fn mismatch(&self, expected: ValueKind) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    /// Returns the string payload.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] if this is not a [`Value::Str`].
    pub fn as_str(&self) -> Result<&str, TypeMismatch> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::Str)),
        }
    }

    /// Returns the integer payload.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] if this is not a [`Value::Int`].
    pub const fn as_int(&self) -> Result<i64, TypeMismatch> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(other.mismatch(ValueKind::Int)),
        }
    }

    /// Returns a numeric payload, widening integers to floats.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] unless this is a [`Value::Int`] or
    /// [`Value::Float`].
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> Result<f64, TypeMismatch> {
        match self {
            Self::Int(i) => Ok(*i as f64),
            Self::Float(f) => Ok(*f),
            other => Err(other.mismatch(ValueKind::Number)),
        }
    }

    /// Returns the boolean payload.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] if this is not a [`Value::Bool`].
    pub const fn as_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }

    /// Returns the list payload.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] if this is not a [`Value::List`].
    pub fn as_list(&self) -> Result<&[Self], TypeMismatch> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(other.mismatch(ValueKind::List)),
        }
    }

    /// Returns the map payload.
    ///
    /// # Errors
    ///
    /// Returns [`TypeMismatch`] if this is not a [`Value::Map`].
    pub const fn as_map(&self) -> Result<&BTreeMap<String, Self>, TypeMismatch> {
        match self {
            Self::Map(map) => Ok(map),
            other => Err(other.mismatch(ValueKind::Map)),
        }
    }

    /// Looks up a key if this is a map.
    ///
    /// Returns `None` for missing keys and for non-map values.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Whether this value is an empty list, an empty map, or null.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<V: Into<Self>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<Self>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
