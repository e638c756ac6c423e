// SPDX-License-Identifier: MPL-2.0

//! Static schema descriptions: key types, built-in defaults and range metadata.

use std::fmt;

/// A typed setting value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Uint(u32),
    Double(f64),
    String(String),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Uint(_) => ValueKind::Uint,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uint(&self) -> Option<u32> {
        match self {
            Self::Uint(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric view used by range checks and adjustments.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Uint(value) => Some(f64::from(*value)),
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "'{value}'"),
        }
    }
}

/// Storage type of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Uint,
    Double,
    String,
}

impl ValueKind {
    /// Parse user input (CLI arguments) into a value of this kind.
    #[must_use]
    pub fn parse(self, input: &str) -> Option<Value> {
        match self {
            Self::Bool => input.parse().ok().map(Value::Bool),
            Self::Uint => input.parse().ok().map(Value::Uint),
            Self::Double => input.parse().ok().map(Value::Double),
            Self::String => Some(Value::String(input.to_owned())),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Uint => "uint",
            Self::Double => "double",
            Self::String => "string",
        })
    }
}

/// Built-in default, kept `const`-constructible so schemas can be statics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Uint(u32),
    Double(f64),
    Str(&'static str),
}

impl DefaultValue {
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::Bool(value) => Value::Bool(value),
            Self::Uint(value) => Value::Uint(value),
            Self::Double(value) => Value::Double(value),
            Self::Str(value) => Value::String(value.to_owned()),
        }
    }
}

/// Range metadata attached to a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeInfo {
    /// Any value of the key's type.
    Type,
    /// Inclusive numeric bounds.
    Range { min: f64, max: f64 },
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
}

impl RangeInfo {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Range { .. } => "range",
            Self::Enum(_) => "enum",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeySchema {
    pub name: &'static str,
    pub kind: ValueKind,
    pub default: DefaultValue,
    pub range: RangeInfo,
    pub summary: &'static str,
}

impl KeySchema {
    /// Whether `value` has this key's type and lies inside its range.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.kind() != self.kind {
            return false;
        }

        match self.range {
            RangeInfo::Type => true,
            RangeInfo::Range { min, max } => value
                .as_number()
                .is_some_and(|number| (min..=max).contains(&number)),
            RangeInfo::Enum(choices) => value
                .as_str()
                .is_some_and(|choice| choices.contains(&choice)),
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    /// Identifier used as the cosmic-config name.
    pub id: &'static str,
    pub version: u64,
    pub keys: &'static [KeySchema],
}

impl Schema {
    #[must_use]
    pub fn key(&self, name: &str) -> Option<&KeySchema> {
        self.keys.iter().find(|key| key.name == name)
    }

    #[must_use]
    pub fn has_key(&self, name: &str) -> bool {
        self.key(name).is_some()
    }
}
