// SPDX-License-Identifier: MPL-2.0

//! Desktop background settings. Only the picture is tracked; its schema
//! default identifies the stock wallpaper the logo is meant for.

use crate::schema::{DefaultValue, KeySchema, RangeInfo, Schema, Value, ValueKind};
use crate::store::{Settings, SettingsError};

pub const NAME: &str = "io.github.background-logo.desktop";
pub const VERSION: u64 = 1;

pub const PICTURE_URI: &str = "picture-uri";

pub static DESKTOP_SCHEMA: Schema = Schema {
    id: NAME,
    version: VERSION,
    keys: &[KeySchema {
        name: PICTURE_URI,
        kind: ValueKind::String,
        default: DefaultValue::Str("file:///usr/share/backgrounds/default.xml"),
        range: RangeInfo::Type,
        summary: "Desktop background picture or slideshow",
    }],
};

#[derive(Debug, Clone)]
pub struct DesktopContext(pub Settings);

/// Open the persistent desktop background settings.
pub fn context() -> Result<DesktopContext, SettingsError> {
    Settings::cosmic(&DESKTOP_SCHEMA).map(DesktopContext)
}

impl DesktopContext {
    #[must_use]
    pub fn in_memory() -> Self {
        Self(Settings::in_memory(&DESKTOP_SCHEMA))
    }

    #[must_use]
    pub fn picture_uri(&self) -> String {
        self.0.get_string(PICTURE_URI)
    }

    pub fn set_picture_uri(&self, value: &str) -> Result<(), SettingsError> {
        self.0.set(PICTURE_URI, Value::String(value.to_owned()))
    }

    /// The built-in default picture, ignoring the user's choice.
    #[must_use]
    pub fn default_picture_uri(&self) -> String {
        self.0
            .default_value(PICTURE_URI)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_picture_survives_user_override() {
        let desktop = DesktopContext::in_memory();
        desktop.set_picture_uri("file:///home/me/cat.jpg").unwrap();

        assert_eq!(desktop.picture_uri(), "file:///home/me/cat.jpg");
        assert_eq!(
            desktop.default_picture_uri(),
            "file:///usr/share/backgrounds/default.xml"
        );
    }
}
