//! Views, view classes and the layers they are built from.

use crate::config::Config;
use crate::deferred::{Deferred, Promise};
use crate::element::{Element, Placement};
use crate::option::{self, Hook, OptionBag, OptionKey, OptionValue, Options};
use core::fmt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// A unique identifier for a view.
///
/// (this is just a UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(Uuid);

impl ViewId {
    pub(crate) fn new() -> ViewId {
        ViewId(Uuid::new_v4())
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Where a view is in its current render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderState {
    Idle,
    Fetching,
    Templating,
    Inserting,
    RenderingChildren,
    Settled,
    Failed,
}

/// Options and base-view fields for one layer (class or instance).
///
/// Names in the closed option set go to the cascade; every other name is a base-view field and
/// passes through to the view untouched. Plain values land in the fields, hooks in a separate
/// map read back with [`View::field_hook`].
#[derive(Clone, Debug, Default)]
pub struct ViewOptions {
    options: OptionBag,
    fields: Map<String, Value>,
    hooks: BTreeMap<String, Hook>,
}

impl ViewOptions {
    pub fn new() -> ViewOptions {
        ViewOptions::default()
    }

    /// Sets an option or, for unrecognized names, a field.
    pub fn set(mut self, name: &str, value: impl Into<OptionValue>) -> ViewOptions {
        let value = value.into();
        match name.parse::<OptionKey>() {
            Ok(key) => {
                self.options.insert(key, value);
            }
            Err(_) => match value {
                OptionValue::Plain(value) => {
                    self.hooks.remove(name);
                    self.fields.insert(name.to_owned(), value);
                }
                OptionValue::Hook(hook) => {
                    self.fields.remove(name);
                    self.hooks.insert(name.to_owned(), hook);
                }
            },
        }
        self
    }

    /// Sets a hook under its own key.
    pub fn hook(mut self, hook: Hook) -> ViewOptions {
        self.options.insert_hook(hook);
        self
    }

    /// Sets a base-view field, even if its name is also an option name.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> ViewOptions {
        self.hooks.remove(name);
        self.fields.insert(name.to_owned(), value.into());
        self
    }

    /// Sets the model the view serializes.
    pub fn data(self, data: impl Into<Value>) -> ViewOptions {
        self.field("data", data)
    }

    pub fn options(&self) -> &OptionBag {
        &self.options
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Hooks set under names outside the closed option set.
    pub fn hooks(&self) -> &BTreeMap<String, Hook> {
        &self.hooks
    }

    /// Overlays `other` onto this layer, key by key.
    fn overlay(&mut self, other: &ViewOptions) {
        self.options.overlay(&other.options);
        for (name, value) in &other.fields {
            self.hooks.remove(name);
            self.fields.insert(name.clone(), value.clone());
        }
        for (name, hook) in &other.hooks {
            self.fields.remove(name);
            self.hooks.insert(name.clone(), hook.clone());
        }
    }
}

/// A view class: the class-level layer of the cascade.
#[derive(Clone, Debug)]
pub struct ViewClass {
    /// Layout classes are always managed; plain classes only if `manage` resolves to true.
    layout: bool,
    layer: ViewOptions,
}

impl ViewClass {
    /// A plain view class.
    pub fn new(layer: ViewOptions) -> ViewClass {
        ViewClass {
            layout: false,
            layer,
        }
    }

    /// A class whose views always take part in composition.
    pub fn layout(layer: ViewOptions) -> ViewClass {
        ViewClass { layout: true, layer }
    }

    /// Derives a subclass; its layer overlays this one.
    pub fn extend(&self, layer: ViewOptions) -> ViewClass {
        let mut merged = self.layer.clone();
        merged.overlay(&layer);
        ViewClass {
            layout: self.layout,
            layer: merged,
        }
    }

    pub fn layer(&self) -> &ViewOptions {
        &self.layer
    }

    /// Creates a view, resolving against the process-wide config.
    pub fn create(&self, instance: ViewOptions) -> View {
        self.create_in(Config::global(), instance)
    }

    /// Creates a view, resolving against `config`.
    ///
    /// Does not fetch or render anything.
    pub fn create_in(&self, config: &Config, instance: ViewOptions) -> View {
        let options = option::resolve(&config.snapshot(), &self.layer.options, &instance.options);
        let managed = self.layout || options.manage();

        let mut layer = self.layer.clone();
        layer.overlay(&instance);
        let ViewOptions { fields, hooks, .. } = layer;

        let node = Node {
            id: ViewId::new(),
            managed,
            options,
            el: Element::new(),
            fields: Mutex::new(fields),
            hooks,
            state: Mutex::new(NodeState {
                phase: RenderState::Idle,
                pass: 0,
                pending: None,
                children: Vec::new(),
                parent: None,
            }),
        };
        tracing::trace!(view = %node.id, managed, "created view");
        View {
            node: Arc::new(node),
        }
    }
}

impl Default for ViewClass {
    fn default() -> Self {
        ViewClass::layout(ViewOptions::new())
    }
}

/// A child at a placeholder.
#[derive(Clone, Debug)]
pub(crate) struct Child {
    pub(crate) name: String,
    pub(crate) view: View,
    pub(crate) placement: Placement,
}

pub(crate) struct NodeState {
    pub(crate) phase: RenderState,
    /// Incremented for every pass and every disposal; continuations of older passes compare
    /// against it and stop.
    pub(crate) pass: u64,
    pub(crate) pending: Option<Deferred<View>>,
    pub(crate) children: Vec<Child>,
    pub(crate) parent: Option<Weak<Node>>,
}

pub(crate) struct Node {
    pub(crate) id: ViewId,
    pub(crate) managed: bool,
    pub(crate) options: Options,
    pub(crate) el: Element,
    pub(crate) fields: Mutex<Map<String, Value>>,
    pub(crate) hooks: BTreeMap<String, Hook>,
    pub(crate) state: Mutex<NodeState>,
}

/// A handle to a composable view.
///
/// Handles are cheap to clone and compare by identity.
#[derive(Clone)]
pub struct View {
    pub(crate) node: Arc<Node>,
}

impl View {
    /// Creates a layout view from instance options alone.
    pub fn layout(instance: ViewOptions) -> View {
        ViewClass::default().create(instance)
    }

    pub(crate) fn from_node(node: Arc<Node>) -> View {
        View { node }
    }

    pub fn id(&self) -> ViewId {
        self.node.id
    }

    /// Whether the view takes part in composition and rendering.
    pub fn is_managed(&self) -> bool {
        self.node.managed
    }

    /// The effective options.
    pub fn options(&self) -> &Options {
        &self.node.options
    }

    /// The element this view renders into.
    pub fn el(&self) -> &Element {
        &self.node.el
    }

    /// A base-view field.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.node.fields.lock().get(name).cloned()
    }

    /// A hook passed through under a name outside the closed option set.
    pub fn field_hook(&self, name: &str) -> Option<&Hook> {
        self.node.hooks.get(name)
    }

    pub fn set_field(&self, name: &str, value: impl Into<Value>) {
        self.node.fields.lock().insert(name.to_owned(), value.into());
    }

    /// The model `serialize` reads.
    pub fn data(&self) -> Value {
        self.field("data").unwrap_or(Value::Null)
    }

    pub fn set_data(&self, data: impl Into<Value>) {
        self.set_field("data", data);
    }

    pub fn state(&self) -> RenderState {
        self.node.state.lock().phase
    }

    /// The promise of the pass in flight, if any.
    pub fn pending(&self) -> Option<Promise<View>> {
        self.node
            .state
            .lock()
            .pending
            .as_ref()
            .map(Deferred::promise)
    }

    /// Whether both handles refer to the same view.
    pub fn ptr_eq(&self, other: &View) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl PartialEq for View {
    fn eq(&self, other: &View) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for View {}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("View")
            .field("id", &self.node.id)
            .field("managed", &self.node.managed)
            .field("state", &self.state())
            .finish()
    }
}
