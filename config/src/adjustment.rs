// SPDX-License-Identifier: MPL-2.0

//! Numeric adjustments derived from a key's range metadata.

use crate::schema::{RangeInfo, Value, ValueKind};
use crate::store::{Settings, SettingsError};

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("key {0:?} is not declared in the schema")]
    UnknownKey(String),

    #[error("invalid key type \"{kind}\" for adjustment of {key:?}")]
    NotARange { key: String, kind: &'static str },

    #[error("{value} is not a finite number for {key:?}")]
    NotFinite { key: String, value: f64 },

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Direction for [`Adjustment::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
    PageUp,
    PageDown,
}

/// Bounded numeric control bound to one setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    key: &'static str,
    kind: ValueKind,
    pub lower: f64,
    pub upper: f64,
    pub step_increment: f64,
    pub page_increment: f64,
}

impl Adjustment {
    /// Build an adjustment for `key`. The key must carry `Range` metadata;
    /// anything else means the schema is malformed.
    pub fn for_key(settings: &Settings, key: &str, step: f64) -> Result<Self, SchemaError> {
        let schema = settings
            .schema()
            .key(key)
            .ok_or_else(|| SchemaError::UnknownKey(key.to_owned()))?;

        let RangeInfo::Range { min, max } = schema.range else {
            return Err(SchemaError::NotARange {
                key: key.to_owned(),
                kind: schema.range.kind_name(),
            });
        };

        Ok(Self {
            key: schema.name,
            kind: schema.kind,
            lower: min,
            upper: max,
            step_increment: step,
            page_increment: 10.0 * step,
        })
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.key
    }

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    #[must_use]
    pub fn value(&self, settings: &Settings) -> f64 {
        settings
            .get(self.key)
            .and_then(|v| v.as_number())
            .unwrap_or(self.lower)
    }

    /// Clamp and write `value`, converting to the key's storage type.
    pub fn set_value(&self, settings: &Settings, value: f64) -> Result<f64, SchemaError> {
        if !value.is_finite() {
            return Err(SchemaError::NotFinite {
                key: self.key.to_owned(),
                value,
            });
        }

        let value = self.clamp(value);
        let stored = match self.kind {
            ValueKind::Uint => Value::Uint(value.round() as u32),
            _ => Value::Double(value),
        };
        let applied = stored.as_number().unwrap_or(value);
        settings.set(self.key, stored)?;
        Ok(applied)
    }

    pub fn step(&self, settings: &Settings, step: Step) -> Result<f64, SchemaError> {
        let delta = match step {
            Step::Up => self.step_increment,
            Step::Down => -self.step_increment,
            Step::PageUp => self.page_increment,
            Step::PageDown => -self.page_increment,
        };
        self.set_value(settings, self.value(settings) + delta)
    }
}
