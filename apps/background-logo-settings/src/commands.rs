// SPDX-License-Identifier: MPL-2.0

//! Key/value commands against the logo and desktop settings.

use background_logo_config::desktop::{self, DesktopContext};
use background_logo_config::schema::{RangeInfo, Value};
use background_logo_config::{
    Adjustment, Context, LogoConfig, Settings, Step, LOGO_BORDER, LOGO_OPACITY, LOGO_SIZE,
};
use eyre::{eyre, WrapErr};
use std::io::Write;

/// Both settings stores the tool edits.
#[derive(Debug, Clone)]
pub struct Stores {
    pub logo: Context,
    pub desktop: DesktopContext,
}

impl Stores {
    pub fn open() -> eyre::Result<Self> {
        Ok(Self {
            logo: background_logo_config::context().wrap_err("failed to open logo settings")?,
            desktop: desktop::context().wrap_err("failed to open desktop settings")?,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            logo: Context::in_memory(),
            desktop: DesktopContext::in_memory(),
        }
    }

    fn all(&self) -> [&Settings; 2] {
        [&self.logo.0, &self.desktop.0]
    }

    /// The store declaring `key`.
    pub fn settings_for(&self, key: &str) -> eyre::Result<&Settings> {
        self.all()
            .into_iter()
            .find(|settings| settings.schema().has_key(key))
            .ok_or_else(|| eyre!("unknown key {key:?}"))
    }
}

/// Increment used by `step` and the slider in the preferences.
#[must_use]
pub fn step_increment(key: &str) -> Option<f64> {
    match key {
        LOGO_SIZE => Some(0.25),
        LOGO_BORDER | LOGO_OPACITY => Some(1.0),
        _ => None,
    }
}

fn adjustment(settings: &Settings, key: &str) -> eyre::Result<Adjustment> {
    let step = step_increment(key).unwrap_or(1.0);
    Adjustment::for_key(settings, key, step).wrap_err("cannot build adjustment")
}

pub fn get(stores: &Stores, key: Option<&str>, out: &mut impl Write) -> eyre::Result<()> {
    match key {
        Some(key) => {
            let value = stores
                .settings_for(key)?
                .get(key)
                .ok_or_else(|| eyre!("unknown key {key:?}"))?;
            writeln!(out, "{value}")?;
        }

        None => {
            for settings in stores.all() {
                for schema in settings.schema().keys {
                    if let Some(value) = settings.get(schema.name) {
                        writeln!(out, "{} = {value}", schema.name)?;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Parse `raw` for `key` and store it. Ranged keys go through their
/// adjustment and are clamped. Returns the stored value.
pub fn set(stores: &Stores, key: &str, raw: &str) -> eyre::Result<Value> {
    let settings = stores.settings_for(key)?;
    let schema = settings
        .schema()
        .key(key)
        .ok_or_else(|| eyre!("unknown key {key:?}"))?;

    if let RangeInfo::Range { .. } = schema.range {
        let number: f64 = raw
            .parse()
            .wrap_err_with(|| format!("{key} expects a number, got {raw:?}"))?;
        let applied = adjustment(settings, key)?.set_value(settings, number)?;
        if applied != number {
            tracing::info!(key, requested = number, applied, "value clamped");
        }
    } else {
        let value = schema
            .kind
            .parse(raw)
            .ok_or_else(|| eyre!("{key} expects a {}, got {raw:?}", schema.kind))?;
        settings.set(key, value)?;
    }

    settings
        .get(key)
        .ok_or_else(|| eyre!("unknown key {key:?}"))
}

/// Reset one key, or every key of both stores.
pub fn reset(stores: &Stores, key: Option<&str>) -> eyre::Result<()> {
    match key {
        Some(key) => stores.settings_for(key)?.reset(key)?,
        None => {
            LogoConfig::default().save(&stores.logo)?;
            for schema in stores.desktop.0.schema().keys {
                stores.desktop.0.reset(schema.name)?;
            }
        }
    }
    Ok(())
}

pub fn step(stores: &Stores, key: &str, step: Step) -> eyre::Result<f64> {
    let settings = stores.settings_for(key)?;
    Ok(adjustment(settings, key)?.step(settings, step)?)
}

pub fn list(stores: &Stores, out: &mut impl Write) -> eyre::Result<()> {
    for settings in stores.all() {
        let schema = settings.schema();
        writeln!(out, "[{}] version {}", schema.id, schema.version)?;

        for key in schema.keys {
            let range = match key.range {
                RangeInfo::Type => String::new(),
                RangeInfo::Range { min, max } => format!(" [{min}, {max}]"),
                RangeInfo::Enum(choices) => format!(" {{{}}}", choices.join(", ")),
            };
            writeln!(
                out,
                "  {} ({}{range}) default {}: {}",
                key.name,
                key.kind,
                key.default.to_value(),
                key.summary
            )?;
        }
    }
    Ok(())
}
