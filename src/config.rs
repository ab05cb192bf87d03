//! Global option layer.

use crate::option::{OptionBag, OptionKey, OptionValue};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone, Default)]
struct Layer {
    options: OptionBag,
    /// Names outside the closed key set. Kept for inspection, never resolved onto views.
    extra: BTreeMap<String, OptionValue>,
}

/// A global option layer.
///
/// There is one process-wide instance ([`Config::global`]); separate instances can be created
/// to resolve views against an isolated layer. Writes take a lock; reads clone a snapshot, so a
/// view under construction never observes a half-applied patch.
pub struct Config {
    layer: RwLock<Layer>,
}

static GLOBAL: Config = Config::new();

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    pub const fn new() -> Config {
        Config {
            layer: parking_lot::const_rwlock(Layer {
                options: OptionBag::new(),
                extra: BTreeMap::new(),
            }),
        }
    }

    /// The process-wide layer.
    pub fn global() -> &'static Config {
        &GLOBAL
    }

    /// Sets one option.
    ///
    /// Unrecognized names are stored but never show up in a view's effective options.
    pub fn set(&self, name: &str, value: impl Into<OptionValue>) {
        let value = value.into();
        let mut layer = self.layer.write();
        match name.parse::<OptionKey>() {
            Ok(key) => {
                debug!(key = %key, "configured option");
                layer.options.insert(key, value);
            }
            Err(_) => {
                debug!(name, "stored unrecognized option; it will not resolve onto views");
                layer.extra.insert(name.to_owned(), value);
            }
        }
    }

    /// Sets every option in the patch, under a single write.
    pub fn merge<I, K, V>(&self, patch: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut layer = self.layer.write();
        for (name, value) in patch {
            let name = name.as_ref();
            match name.parse::<OptionKey>() {
                Ok(key) => {
                    layer.options.insert(key, value);
                }
                Err(_) => {
                    debug!(name, "stored unrecognized option; it will not resolve onto views");
                    layer.extra.insert(name.to_owned(), value.into());
                }
            }
        }
    }

    /// Merges a JSON object of plain values.
    ///
    /// Returns false, changing nothing, if `patch` is not an object.
    pub fn merge_json(&self, patch: &Value) -> bool {
        match patch.as_object() {
            Some(object) => {
                self.merge(object.iter().map(|(name, value)| (name, value.clone())));
                true
            }
            None => {
                debug!("ignoring non-object configuration patch");
                false
            }
        }
    }

    /// Returns a stored value, including unrecognized ones.
    pub fn get(&self, name: &str) -> Option<OptionValue> {
        let layer = self.layer.read();
        match name.parse::<OptionKey>() {
            Ok(key) => layer.options.get(key).cloned(),
            Err(_) => layer.extra.get(name).cloned(),
        }
    }

    /// The recognized part of the layer, as fed into resolution.
    pub fn snapshot(&self) -> OptionBag {
        self.layer.read().options.clone()
    }

    /// Drops every override.
    pub fn reset(&self) {
        *self.layer.write() = Layer::default();
    }
}

/// Sets one option on the process-wide layer.
pub fn configure(name: &str, value: impl Into<OptionValue>) {
    Config::global().set(name, value);
}

/// Merges a patch into the process-wide layer.
pub fn configure_with<I, K, V>(patch: I)
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<OptionValue>,
{
    Config::global().merge(patch);
}
