//! View composition library.
//!
//! # Conceptual overview
//! Perch arranges views into a tree: every view renders its own template into an element, and
//! parents place their children's elements at named placeholders inside their own.
//!
//! ## Options
//! What a view does at each step of rendering is decided by its options. Options come from three
//! layers, merged key by key with later layers winning: the global layer (a [`Config`]), the
//! class layer (a [`ViewClass`]), and the instance layer given when the view is created. Below
//! all of them sit built-in defaults, so every view has a value for every key.
//!
//! The set of option keys is closed (see [`OptionKey`]). Most keys are *hooks*: functions that
//! implement one step of rendering and can be swapped out, e.g. to fetch templates from disk or
//! to mirror elements into a real document. Names outside the closed set may be configured
//! globally for forward compatibility, but they never resolve onto a view; on a class or
//! instance they become plain fields of the view instead.
//!
//! ## Rendering
//! Rendering is asynchronous and driven by [`Promise`]s. A render pass fetches the template,
//! applies it to the serialized view data, inserts the result into the view's element, and then
//! renders every child and places the children in the order they were attached. The pass settles
//! only after all children have settled. Fetching may take arbitrarily long; everything else
//! happens synchronously whenever the promise it waits on settles.
//!
//! Only one pass per view is in flight at a time. Starting another one supersedes the first:
//! its promise rejects with [`RenderError::Superseded`] and whatever it was still going to do is
//! dropped.
//!
//! ## Composition
//! Views are nested with [`View::set_view`] and friends. Nesting is ownership: replacing or
//! removing a child disposes it, and a view can only have one parent at a time. Only *managed*
//! views take part: views of [layout classes](ViewClass::layout) always are, plain views only if
//! their `manage` option resolves to true.

mod config;
mod deferred;
mod element;
mod error;
mod option;
mod render;
mod template;
mod tree;
mod view;

pub use config::{configure, configure_with, Config};
pub use deferred::{when, Deferred, Promise};
pub use element::{Content, Element, Placement};
pub use error::{CompositionError, HookError, HookResult, RenderError};
pub use option::{
    defaults, resolve, DeferredFn, FetchFn, Hook, InsertFn, OptionBag, OptionKey, OptionValue,
    Options, PartialFn, RenderFn, SerializeFn, TemplateFn, UnknownKey, WhenFn,
};
pub use render::Paint;
pub use template::{Fetch, Template};
pub use view::{RenderState, View, ViewClass, ViewId, ViewOptions};
