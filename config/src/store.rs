// SPDX-License-Identifier: MPL-2.0

//! Schema-checked key/value store with change notification.
//!
//! Reads never fail: unset, undecodable or out-of-range values resolve to the
//! schema default. Writes go through the backend and then notify subscribers
//! synchronously. Changes made by other processes reach subscribers through
//! [`Settings::notify`], which the event loop calls from its config watcher.

use crate::schema::{KeySchema, Schema, Value, ValueKind};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown key {key:?} in schema {schema}")]
    UnknownKey { schema: &'static str, key: String },

    #[error("value {value} is not valid for key {key:?}")]
    InvalidValue { key: String, value: Value },

    #[error("failed to decode stored value for {key:?}: {reason}")]
    Decode { key: String, reason: String },

    #[error("settings backend error: {0}")]
    Backend(String),
}

/// Storage for raw values. Implementations only persist; type and range
/// checking happens in [`Settings`].
pub trait Backend {
    /// `Ok(None)` when the key has no stored value.
    fn read(&self, key: &str, kind: ValueKind) -> Result<Option<Value>, SettingsError>;

    fn write(&self, key: &str, value: &Value) -> Result<(), SettingsError>;

    /// The underlying cosmic-config handle, for installing watch sources.
    fn cosmic_config(&self) -> Option<&cosmic_config::Config> {
        None
    }
}

/// In-process backend storing each key as RON text, mirroring the
/// one-file-per-key layout cosmic-config uses on disk.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw RON text without validation.
    pub fn insert_raw(&self, key: &str, ron_text: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_owned(), ron_text.to_owned());
    }
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, text: &str) -> Result<T, SettingsError> {
    ron::from_str(text).map_err(|why| SettingsError::Decode {
        key: key.to_owned(),
        reason: why.to_string(),
    })
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str, kind: ValueKind) -> Result<Option<Value>, SettingsError> {
        let entries = self.entries.borrow();
        let Some(text) = entries.get(key) else {
            return Ok(None);
        };

        let value = match kind {
            ValueKind::Bool => Value::Bool(decode(key, text)?),
            ValueKind::Uint => Value::Uint(decode(key, text)?),
            ValueKind::Double => Value::Double(decode(key, text)?),
            ValueKind::String => Value::String(decode(key, text)?),
        };

        Ok(Some(value))
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), SettingsError> {
        let encoded = match value {
            Value::Bool(v) => ron::to_string(v),
            Value::Uint(v) => ron::to_string(v),
            Value::Double(v) => ron::to_string(v),
            Value::String(v) => ron::to_string(v),
        }
        .map_err(|why| SettingsError::Backend(why.to_string()))?;

        self.entries.borrow_mut().insert(key.to_owned(), encoded);
        Ok(())
    }
}

/// Backend persisting through cosmic-config.
#[derive(Debug, Clone)]
pub struct CosmicBackend(pub cosmic_config::Config);

impl CosmicBackend {
    pub fn new(name: &str, version: u64) -> Result<Self, SettingsError> {
        cosmic_config::Config::new(name, version)
            .map(Self)
            .map_err(|why| SettingsError::Backend(format!("{why:?}")))
    }
}

/// Whether `err` only means the key was never written.
fn is_missing(err: &cosmic_config::Error) -> bool {
    match err {
        cosmic_config::Error::NoConfigDirectory | cosmic_config::Error::NotFound => true,
        cosmic_config::Error::GetKey(_, io) => io.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

impl Backend for CosmicBackend {
    fn read(&self, key: &str, kind: ValueKind) -> Result<Option<Value>, SettingsError> {
        use cosmic_config::ConfigGet;

        let value = match kind {
            ValueKind::Bool => self.0.get::<bool>(key).map(Value::Bool),
            ValueKind::Uint => self.0.get::<u32>(key).map(Value::Uint),
            ValueKind::Double => self.0.get::<f64>(key).map(Value::Double),
            ValueKind::String => self.0.get::<String>(key).map(Value::String),
        };

        match value {
            Ok(value) => Ok(Some(value)),
            Err(why) if is_missing(&why) => {
                tracing::debug!(key, ?why, "no stored value");
                Ok(None)
            }
            Err(why) => Err(SettingsError::Decode {
                key: key.to_owned(),
                reason: format!("{why:?}"),
            }),
        }
    }

    fn write(&self, key: &str, value: &Value) -> Result<(), SettingsError> {
        use cosmic_config::ConfigSet;

        match value {
            Value::Bool(v) => self.0.set(key, *v),
            Value::Uint(v) => self.0.set(key, *v),
            Value::Double(v) => self.0.set(key, *v),
            Value::String(v) => self.0.set(key, v.as_str()),
        }
        .map_err(|why| SettingsError::Backend(format!("{why:?}")))
    }

    fn cosmic_config(&self) -> Option<&cosmic_config::Config> {
        Some(&self.0)
    }
}

/// Which change notifications a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    Any,
    Key(String),
}

impl KeyFilter {
    fn matches(&self, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Key(wanted) => wanted == key,
        }
    }
}

/// Handle returned by [`Settings::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Rc<RefCell<dyn FnMut(&str)>>;

struct Subscriber {
    id: SubscriptionId,
    filter: KeyFilter,
    callback: Callback,
}

struct Inner {
    schema: &'static Schema,
    backend: Box<dyn Backend>,
    subscribers: RefCell<Vec<Subscriber>>,
    next_id: Cell<u64>,
}

/// Shared handle to a schema-backed store. Clones observe the same values
/// and subscribers.
#[derive(Clone)]
pub struct Settings {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("schema", &self.inner.schema.id)
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn new(schema: &'static Schema, backend: impl Backend + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                schema,
                backend: Box::new(backend),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    #[must_use]
    pub fn in_memory(schema: &'static Schema) -> Self {
        Self::new(schema, MemoryBackend::new())
    }

    /// Open the cosmic-config store named after the schema.
    pub fn cosmic(schema: &'static Schema) -> Result<Self, SettingsError> {
        CosmicBackend::new(schema.id, schema.version).map(|backend| Self::new(schema, backend))
    }

    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.inner.schema
    }

    #[must_use]
    pub fn cosmic_config(&self) -> Option<&cosmic_config::Config> {
        self.inner.backend.cosmic_config()
    }

    fn key_schema(&self, key: &str) -> Result<&'static KeySchema, SettingsError> {
        self.inner
            .schema
            .key(key)
            .ok_or_else(|| SettingsError::UnknownKey {
                schema: self.inner.schema.id,
                key: key.to_owned(),
            })
    }

    /// Current value of `key`, or its schema default. `None` only for keys
    /// the schema does not declare.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let Ok(schema) = self.key_schema(key) else {
            tracing::error!(schema = self.inner.schema.id, key, "read of undeclared key");
            return None;
        };

        let value = match self.inner.backend.read(key, schema.kind) {
            Ok(Some(value)) if schema.accepts(&value) => value,
            Ok(Some(value)) => {
                tracing::warn!(key, %value, "stored value rejected by schema, using default");
                schema.default.to_value()
            }
            Ok(None) => schema.default.to_value(),
            Err(why) => {
                tracing::warn!(key, %why, "unreadable stored value, using default");
                schema.default.to_value()
            }
        };

        Some(value)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or_default()
    }

    #[must_use]
    pub fn get_uint(&self, key: &str) -> u32 {
        self.get(key).and_then(|v| v.as_uint()).unwrap_or_default()
    }

    #[must_use]
    pub fn get_double(&self, key: &str) -> f64 {
        self.get(key).and_then(|v| v.as_double()).unwrap_or_default()
    }

    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    /// The schema's built-in default, independent of any stored override.
    #[must_use]
    pub fn default_value(&self, key: &str) -> Option<Value> {
        self.inner.schema.key(key).map(|k| k.default.to_value())
    }

    /// Validate, persist and notify.
    pub fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let schema = self.key_schema(key)?;
        if !schema.accepts(&value) {
            return Err(SettingsError::InvalidValue {
                key: key.to_owned(),
                value,
            });
        }

        self.inner.backend.write(key, &value)?;
        tracing::debug!(key, %value, "setting written");
        self.notify(&[key]);
        Ok(())
    }

    /// Restore the schema default.
    pub fn reset(&self, key: &str) -> Result<(), SettingsError> {
        let default = self.key_schema(key)?.default.to_value();
        self.set(key, default)
    }

    pub fn subscribe<F>(&self, filter: KeyFilter, callback: F) -> SubscriptionId
    where
        F: FnMut(&str) + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        self.inner.subscribers.borrow_mut().push(Subscriber {
            id,
            filter,
            callback: Rc::new(RefCell::new(callback)),
        });

        id
    }

    /// Returns `false` when `id` is not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Deliver change notifications for `keys`. Keys outside the schema are
    /// still delivered; subscribers ignore what they do not track.
    pub fn notify<S: AsRef<str>>(&self, keys: &[S]) {
        for key in keys {
            let key = key.as_ref();
            let callbacks: Vec<Callback> = self
                .inner
                .subscribers
                .borrow()
                .iter()
                .filter(|s| s.filter.matches(key))
                .map(|s| s.callback.clone())
                .collect();

            for callback in callbacks {
                match callback.try_borrow_mut() {
                    Ok(mut callback) => (&mut *callback)(key),
                    Err(_) => tracing::warn!(key, "skipping re-entrant settings callback"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, RangeInfo};

    static TEST_SCHEMA: Schema = Schema {
        id: "test.store",
        version: 1,
        keys: &[
            KeySchema {
                name: "size",
                kind: ValueKind::Double,
                default: DefaultValue::Double(7.5),
                range: RangeInfo::Range { min: 0.0, max: 100.0 },
                summary: "",
            },
            KeySchema {
                name: "name",
                kind: ValueKind::String,
                default: DefaultValue::Str("logo.png"),
                range: RangeInfo::Type,
                summary: "",
            },
        ],
    };

    #[test]
    fn unset_and_corrupt_values_read_as_default() {
        let backend = MemoryBackend::new();
        backend.insert_raw("name", "not ron (");
        let settings = Settings::new(&TEST_SCHEMA, backend);

        assert_eq!(settings.get_double("size"), 7.5);
        assert_eq!(settings.get_string("name"), "logo.png");
        assert_eq!(settings.get("missing"), None);
    }

    #[test]
    fn only_missing_keys_count_as_unset() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(is_missing(&cosmic_config::Error::GetKey("size".into(), missing)));
        assert!(is_missing(&cosmic_config::Error::NotFound));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(!is_missing(&cosmic_config::Error::GetKey("size".into(), denied)));
        assert!(!is_missing(&cosmic_config::Error::InvalidName("size".into())));
    }

    #[test]
    fn out_of_range_stored_value_reads_as_default() {
        let backend = MemoryBackend::new();
        backend.insert_raw("size", "250.0");
        let settings = Settings::new(&TEST_SCHEMA, backend);

        assert_eq!(settings.get_double("size"), 7.5);
    }

    #[test]
    fn set_validates_and_round_trips_through_ron() {
        let settings = Settings::in_memory(&TEST_SCHEMA);

        settings.set("size", Value::Double(50.0)).unwrap();
        assert_eq!(settings.get_double("size"), 50.0);
        assert!(matches!(
            settings.set("size", Value::Double(101.0)),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings.set("size", Value::Uint(5)),
            Err(SettingsError::InvalidValue { .. })
        ));

        settings.reset("size").unwrap();
        assert_eq!(settings.get_double("size"), 7.5);
        assert_eq!(settings.default_value("size"), Some(Value::Double(7.5)));
    }

    #[test]
    fn subscribers_follow_their_filter() {
        let settings = Settings::in_memory(&TEST_SCHEMA);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let any = {
            let seen = seen.clone();
            settings.subscribe(KeyFilter::Any, move |key| {
                seen.borrow_mut().push(format!("any:{key}"));
            })
        };
        let only_size = {
            let seen = seen.clone();
            settings.subscribe(KeyFilter::Key("size".into()), move |key| {
                seen.borrow_mut().push(format!("size:{key}"));
            })
        };

        settings.set("name", Value::String("other.png".into())).unwrap();
        settings.notify(&["size", "unrelated"]);

        assert_eq!(
            *seen.borrow(),
            ["any:name", "any:size", "size:size", "any:unrelated"]
        );

        assert!(settings.unsubscribe(any));
        assert!(settings.unsubscribe(only_size));
        assert!(!settings.unsubscribe(only_size));
        assert_eq!(settings.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_may_subscribe_while_notified() {
        let settings = Settings::in_memory(&TEST_SCHEMA);
        let inner = settings.clone();
        settings.subscribe(KeyFilter::Any, move |_| {
            inner.subscribe(KeyFilter::Any, |_| {});
        });

        settings.notify(&["size"]);
        assert_eq!(settings.subscriber_count(), 2);
    }
}
