// SPDX-License-Identifier: MPL-2.0

//! Settings for the background logo overlay and the desktop background it
//! sits on.

pub mod adjustment;
pub mod desktop;
pub mod schema;
pub mod store;

use schema::{DefaultValue, KeySchema, RangeInfo, Schema, Value, ValueKind};
use std::fmt;
use std::str::FromStr;

pub use adjustment::{Adjustment, SchemaError, Step};
pub use store::{KeyFilter, Settings, SettingsError, SubscriptionId};

pub const NAME: &str = "io.github.background-logo";
pub const VERSION: u64 = 1;

// Config keys
pub const LOGO_FILE: &str = "logo-file";
pub const LOGO_SIZE: &str = "logo-size";
pub const LOGO_POSITION: &str = "logo-position";
pub const LOGO_BORDER: &str = "logo-border";
pub const LOGO_OPACITY: &str = "logo-opacity";
pub const ALWAYS_SHOW: &str = "always-show";

/// Every key the overlay and preview react to.
pub const LOGO_KEYS: [&str; 6] = [
    LOGO_FILE,
    LOGO_SIZE,
    LOGO_POSITION,
    LOGO_BORDER,
    LOGO_OPACITY,
    ALWAYS_SHOW,
];

pub static LOGO_SCHEMA: Schema = Schema {
    id: NAME,
    version: VERSION,
    keys: &[
        KeySchema {
            name: LOGO_FILE,
            kind: ValueKind::String,
            default: DefaultValue::Str("/usr/share/pixmaps/system-logo-white.png"),
            range: RangeInfo::Type,
            summary: "Logo image, as a path or file URI",
        },
        KeySchema {
            name: LOGO_SIZE,
            kind: ValueKind::Double,
            default: DefaultValue::Double(7.5),
            range: RangeInfo::Range {
                min: 0.0,
                max: 100.0,
            },
            summary: "Logo width in percent of the monitor work area",
        },
        KeySchema {
            name: LOGO_POSITION,
            kind: ValueKind::String,
            default: DefaultValue::Str("bottom-right"),
            range: RangeInfo::Enum(&["center", "bottom-left", "bottom-center", "bottom-right"]),
            summary: "Where the logo is anchored",
        },
        KeySchema {
            name: LOGO_BORDER,
            kind: ValueKind::Uint,
            default: DefaultValue::Uint(50),
            range: RangeInfo::Range {
                min: 0.0,
                max: 500.0,
            },
            summary: "Distance from the work area edge in pixels",
        },
        KeySchema {
            name: LOGO_OPACITY,
            kind: ValueKind::Uint,
            default: DefaultValue::Uint(255),
            range: RangeInfo::Range {
                min: 0.0,
                max: 255.0,
            },
            summary: "Logo opacity",
        },
        KeySchema {
            name: ALWAYS_SHOW,
            kind: ValueKind::Bool,
            default: DefaultValue::Bool(false),
            range: RangeInfo::Type,
            summary: "Show the logo on every background, not just the default one",
        },
    ],
};

/// Anchor of the logo inside the work area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoPosition {
    Center,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

impl LogoPosition {
    pub const ALL: [Self; 4] = [
        Self::Center,
        Self::BottomLeft,
        Self::BottomCenter,
        Self::BottomRight,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for LogoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown logo position {0:?}")]
pub struct UnknownPosition(pub String);

impl FromStr for LogoPosition {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|position| position.as_str() == s)
            .ok_or_else(|| UnknownPosition(s.to_owned()))
    }
}

/// Typed access to the logo settings.
#[derive(Debug, Clone)]
pub struct Context(pub Settings);

/// Open the persistent logo settings.
pub fn context() -> Result<Context, SettingsError> {
    Settings::cosmic(&LOGO_SCHEMA).map(Context)
}

impl Context {
    /// Settings kept only in memory, starting from schema defaults.
    #[must_use]
    pub fn in_memory() -> Self {
        Self(Settings::in_memory(&LOGO_SCHEMA))
    }

    #[must_use]
    pub fn logo_file(&self) -> String {
        self.0.get_string(LOGO_FILE)
    }

    pub fn set_logo_file(&self, value: &str) -> Result<(), SettingsError> {
        self.0.set(LOGO_FILE, Value::String(value.to_owned()))
    }

    #[must_use]
    pub fn logo_size(&self) -> f64 {
        self.0.get_double(LOGO_SIZE)
    }

    pub fn set_logo_size(&self, value: f64) -> Result<(), SettingsError> {
        self.0.set(LOGO_SIZE, Value::Double(value))
    }

    #[must_use]
    pub fn logo_position(&self) -> LogoPosition {
        self.0
            .get_string(LOGO_POSITION)
            .parse()
            .unwrap_or_default()
    }

    pub fn set_logo_position(&self, value: LogoPosition) -> Result<(), SettingsError> {
        self.0
            .set(LOGO_POSITION, Value::String(value.as_str().to_owned()))
    }

    #[must_use]
    pub fn logo_border(&self) -> u32 {
        self.0.get_uint(LOGO_BORDER)
    }

    pub fn set_logo_border(&self, value: u32) -> Result<(), SettingsError> {
        self.0.set(LOGO_BORDER, Value::Uint(value))
    }

    #[must_use]
    pub fn logo_opacity(&self) -> u8 {
        u8::try_from(self.0.get_uint(LOGO_OPACITY)).unwrap_or(u8::MAX)
    }

    pub fn set_logo_opacity(&self, value: u8) -> Result<(), SettingsError> {
        self.0.set(LOGO_OPACITY, Value::Uint(u32::from(value)))
    }

    #[must_use]
    pub fn always_show(&self) -> bool {
        self.0.get_bool(ALWAYS_SHOW)
    }

    pub fn set_always_show(&self, value: bool) -> Result<(), SettingsError> {
        self.0.set(ALWAYS_SHOW, Value::Bool(value))
    }

    /// Load the full logo config.
    #[must_use]
    pub fn logo_config(&self) -> LogoConfig {
        LogoConfig::load(self)
    }
}

/// Snapshot of every logo setting.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoConfig {
    pub logo_file: String,
    pub logo_size: f64,
    pub logo_position: LogoPosition,
    pub logo_border: u32,
    pub logo_opacity: u8,
    pub always_show: bool,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self::load(&Context::in_memory())
    }
}

impl LogoConfig {
    #[must_use]
    pub fn load(context: &Context) -> Self {
        Self {
            logo_file: context.logo_file(),
            logo_size: context.logo_size(),
            logo_position: context.logo_position(),
            logo_border: context.logo_border(),
            logo_opacity: context.logo_opacity(),
            always_show: context.always_show(),
        }
    }

    /// Write every field. Subscribers see one notification per key.
    pub fn save(&self, context: &Context) -> Result<(), SettingsError> {
        context.set_logo_file(&self.logo_file)?;
        context.set_logo_size(self.logo_size)?;
        context.set_logo_position(self.logo_position)?;
        context.set_logo_border(self.logo_border)?;
        context.set_logo_opacity(self.logo_opacity)?;
        context.set_always_show(self.always_show)?;
        Ok(())
    }
}
