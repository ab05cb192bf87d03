//! View options and the option cascade.
//!
//! Every view resolves its effective options from three layers, later layers winning key by key:
//!
//! 1. the global layer, stored in a [`Config`](crate::Config),
//! 2. the class layer, declared on a [`ViewClass`](crate::ViewClass),
//! 3. the instance layer, given when the view is created.
//!
//! Underneath all three sits the built-in default of every key. Only the closed set of
//! [`OptionKey`]s ever resolves onto a view.

use crate::deferred::{self, Deferred, Promise};
use crate::element::{Content, Element};
use crate::error::HookResult;
use crate::render::Paint;
use crate::template::{Fetch, Template};
use crate::view::View;
use core::fmt;
use core::str::FromStr;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The closed set of option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    Prefix,
    Deferred,
    Fetch,
    Partial,
    Html,
    Append,
    When,
    Render,
    Serialize,
    Template,
    Manage,
}

impl OptionKey {
    pub const ALL: [OptionKey; 11] = [
        OptionKey::Prefix,
        OptionKey::Deferred,
        OptionKey::Fetch,
        OptionKey::Partial,
        OptionKey::Html,
        OptionKey::Append,
        OptionKey::When,
        OptionKey::Render,
        OptionKey::Serialize,
        OptionKey::Template,
        OptionKey::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::Prefix => "prefix",
            OptionKey::Deferred => "deferred",
            OptionKey::Fetch => "fetch",
            OptionKey::Partial => "partial",
            OptionKey::Html => "html",
            OptionKey::Append => "append",
            OptionKey::When => "when",
            OptionKey::Render => "render",
            OptionKey::Serialize => "serialize",
            OptionKey::Template => "template",
            OptionKey::Manage => "manage",
        }
    }

    /// Whether the built-in default of this key is a hook.
    pub fn is_hook(self) -> bool {
        !matches!(self, OptionKey::Prefix | OptionKey::Manage)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name outside the closed key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl FromStr for OptionKey {
    type Err = UnknownKey;

    fn from_str(name: &str) -> Result<OptionKey, UnknownKey> {
        OptionKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| UnknownKey(name.to_owned()))
    }
}

pub type DeferredFn = dyn Fn() -> Deferred<View> + Send + Sync;
pub type FetchFn = dyn Fn(&str) -> HookResult<Fetch> + Send + Sync;
pub type SerializeFn = dyn Fn(&Value) -> HookResult<Value> + Send + Sync;
pub type TemplateFn = dyn Fn(&Value) -> HookResult<String> + Send + Sync;
pub type InsertFn = dyn Fn(&Element, Content) -> HookResult<()> + Send + Sync;
pub type PartialFn = dyn Fn(&Element, &str, &Element, &InsertFn) -> HookResult<()> + Send + Sync;
pub type WhenFn = dyn Fn(Vec<Promise<View>>) -> Promise<Vec<View>> + Send + Sync;
pub type RenderFn = dyn Fn(Paint) + Send + Sync;

/// An invocable option value. There is one variant per hook signature.
#[derive(Clone)]
pub enum Hook {
    /// Creates the deferred a render pass settles.
    Deferred(Arc<DeferredFn>),
    /// Loads a template from its locator.
    Fetch(Arc<FetchFn>),
    /// Turns view data into template data.
    Serialize(Arc<SerializeFn>),
    /// A compiled template.
    Template(Arc<TemplateFn>),
    /// Places a child element at a named placeholder of its parent, using the insertion hook
    /// (`html` or `append`) chosen by the child's placement.
    Partial(Arc<PartialFn>),
    /// Replaces an element's content.
    Html(Arc<InsertFn>),
    /// Adds to an element's content.
    Append(Arc<InsertFn>),
    /// Aggregates child render promises.
    When(Arc<WhenFn>),
    /// Wraps a whole render pass.
    Render(Arc<RenderFn>),
}

impl Hook {
    pub fn deferred(f: impl Fn() -> Deferred<View> + Send + Sync + 'static) -> Hook {
        Hook::Deferred(Arc::new(f))
    }

    pub fn fetch(f: impl Fn(&str) -> HookResult<Fetch> + Send + Sync + 'static) -> Hook {
        Hook::Fetch(Arc::new(f))
    }

    pub fn serialize(f: impl Fn(&Value) -> HookResult<Value> + Send + Sync + 'static) -> Hook {
        Hook::Serialize(Arc::new(f))
    }

    pub fn template(f: impl Fn(&Value) -> HookResult<String> + Send + Sync + 'static) -> Hook {
        Hook::Template(Arc::new(f))
    }

    pub fn partial(
        f: impl Fn(&Element, &str, &Element, &InsertFn) -> HookResult<()> + Send + Sync + 'static,
    ) -> Hook {
        Hook::Partial(Arc::new(f))
    }

    pub fn html(f: impl Fn(&Element, Content) -> HookResult<()> + Send + Sync + 'static) -> Hook {
        Hook::Html(Arc::new(f))
    }

    pub fn append(f: impl Fn(&Element, Content) -> HookResult<()> + Send + Sync + 'static) -> Hook {
        Hook::Append(Arc::new(f))
    }

    pub fn when(
        f: impl Fn(Vec<Promise<View>>) -> Promise<Vec<View>> + Send + Sync + 'static,
    ) -> Hook {
        Hook::When(Arc::new(f))
    }

    pub fn render(f: impl Fn(Paint) + Send + Sync + 'static) -> Hook {
        Hook::Render(Arc::new(f))
    }

    /// The key this hook naturally belongs to.
    pub fn key(&self) -> OptionKey {
        match self {
            Hook::Deferred(_) => OptionKey::Deferred,
            Hook::Fetch(_) => OptionKey::Fetch,
            Hook::Serialize(_) => OptionKey::Serialize,
            Hook::Template(_) => OptionKey::Template,
            Hook::Partial(_) => OptionKey::Partial,
            Hook::Html(_) => OptionKey::Html,
            Hook::Append(_) => OptionKey::Append,
            Hook::When(_) => OptionKey::When,
            Hook::Render(_) => OptionKey::Render,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Hook({})", self.key())
    }
}

/// A resolved or configured option value.
///
/// Values are stored as given; a plain value in a hook slot is not coerced. What the pipeline
/// does with it is up to the step that reads the slot.
#[derive(Clone, Debug)]
pub enum OptionValue {
    Hook(Hook),
    Plain(Value),
}

impl OptionValue {
    pub fn is_invocable(&self) -> bool {
        matches!(self, OptionValue::Hook(_))
    }

    pub fn as_hook(&self) -> Option<&Hook> {
        match self {
            OptionValue::Hook(hook) => Some(hook),
            OptionValue::Plain(_) => None,
        }
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            OptionValue::Hook(_) => None,
            OptionValue::Plain(value) => Some(value),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_plain().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_plain().and_then(Value::as_bool)
    }
}

impl From<Hook> for OptionValue {
    fn from(hook: Hook) -> Self {
        OptionValue::Hook(hook)
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        OptionValue::Plain(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Plain(Value::from(value))
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Plain(Value::from(value))
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Plain(Value::from(value))
    }
}

/// One layer of option overrides. Absent keys fall through to the layer below.
#[derive(Clone, Debug, Default)]
pub struct OptionBag {
    values: BTreeMap<OptionKey, OptionValue>,
}

impl OptionBag {
    pub const fn new() -> OptionBag {
        OptionBag {
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: OptionKey, value: impl Into<OptionValue>) -> Option<OptionValue> {
        self.values.insert(key, value.into())
    }

    /// Inserts a hook under its own key.
    pub fn insert_hook(&mut self, hook: Hook) -> Option<OptionValue> {
        self.values.insert(hook.key(), OptionValue::Hook(hook))
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.values.get(&key)
    }

    pub fn remove(&mut self, key: OptionKey) -> Option<OptionValue> {
        self.values.remove(&key)
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> + '_ {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    /// Overwrites keys present in `other`; keys absent from `other` are left alone.
    pub fn overlay(&mut self, other: &OptionBag) {
        for (key, value) in &other.values {
            self.values.insert(*key, value.clone());
        }
    }
}

/// The effective options of a view: every key of the closed set, resolved.
#[derive(Clone, Debug)]
pub struct Options {
    values: BTreeMap<OptionKey, OptionValue>,
}

impl Options {
    pub fn get(&self, key: OptionKey) -> &OptionValue {
        // resolution always starts from a full default set
        &self.values[&key]
    }

    /// Looks an option up by name. Names outside the closed set never resolve.
    pub fn get_by_name(&self, name: &str) -> Option<&OptionValue> {
        name.parse::<OptionKey>()
            .ok()
            .map(|key| self.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> + '_ {
        self.values.iter().map(|(key, value)| (*key, value))
    }

    /// The template prefix, if the slot holds a string.
    pub fn prefix(&self) -> Option<&str> {
        self.get(OptionKey::Prefix).as_str()
    }

    /// Whether `manage` resolved to true.
    pub fn manage(&self) -> bool {
        self.get(OptionKey::Manage).as_bool().unwrap_or(false)
    }
}

/// Returns the built-in default of every key.
pub fn defaults() -> OptionBag {
    let mut bag = OptionBag::new();
    bag.insert(OptionKey::Prefix, "");
    bag.insert(OptionKey::Manage, false);
    bag.insert_hook(Hook::deferred(Deferred::new));
    bag.insert_hook(Hook::fetch(|path| Ok(Fetch::from(path))));
    bag.insert_hook(Hook::serialize(|data| Ok(data.clone())));
    bag.insert_hook(Hook::template(|data| Ok(Template::text_of(data))));
    bag.insert_hook(Hook::partial(|root, name, el, insert| {
        insert(&root.placeholder(name), Content::Element(el.clone()))
    }));
    bag.insert_hook(Hook::html(|el, content| {
        el.set_content(content);
        Ok(())
    }));
    bag.insert_hook(Hook::append(|el, content| {
        el.append(content);
        Ok(())
    }));
    bag.insert_hook(Hook::when(deferred::when));
    bag.insert_hook(Hook::render(|paint| paint.paint()));
    bag
}

/// Resolves effective options from the global, class and instance layers.
///
/// Pure: none of the layers is modified.
pub fn resolve(global: &OptionBag, class: &OptionBag, instance: &OptionBag) -> Options {
    let mut bag = defaults();
    bag.overlay(global);
    bag.overlay(class);
    bag.overlay(instance);
    Options { values: bag.values }
}
