//! The render pipeline.
//!
//! One pass over a view runs, in order:
//!
//! 1. **fetch**: resolve the template. A locator is prefixed and handed to `fetch`; a compiled
//!    template or a plain value needs no fetching.
//! 2. **template**: `serialize` the view data and apply the template to it.
//! 3. **insert**: put the content into the view's element with `html`.
//! 4. **children**: render every child, place each one with `partial` once it and its earlier
//!    siblings have settled, and wait for all of them with `when`.
//!
//! The whole sequence is handed to the `render` hook as a [`Paint`]; nothing happens until the
//! hook invokes it. Passes are superseded rather than cancelled: starting a new pass rejects the
//! previous pass's promise with [`RenderError::Superseded`], and the previous pass stops at its
//! next step without touching the view.

use crate::deferred::{Deferred, Promise};
use crate::element::{Content, Placement};
use crate::error::RenderError;
use crate::option::{Hook, OptionKey, OptionValue};
use crate::template::Template;
use crate::view::{Child, RenderState, View, ViewId};
use core::fmt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// The deferred body of a render pass, handed to the `render` hook.
///
/// Must be invoked exactly once for the pass to make progress; dropping it leaves the pass
/// pending forever.
pub struct Paint {
    view: ViewId,
    job: Option<Box<dyn FnOnce() + Send>>,
}

impl Paint {
    fn new(view: ViewId, job: impl FnOnce() + Send + 'static) -> Paint {
        Paint {
            view,
            job: Some(Box::new(job)),
        }
    }

    /// The view being painted.
    pub fn view(&self) -> ViewId {
        self.view
    }

    /// Runs the pass.
    pub fn paint(mut self) {
        if let Some(job) = self.job.take() {
            job();
        }
    }
}

impl Drop for Paint {
    fn drop(&mut self) {
        if self.job.is_some() {
            warn!(view = %self.view, "render hook dropped its paint; the render pass will never settle");
        }
    }
}

impl fmt::Debug for Paint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Paint")
            .field("view", &self.view)
            .field("painted", &self.job.is_none())
            .finish()
    }
}

fn invalid(key: OptionKey, expected: &'static str) -> RenderError {
    RenderError::InvalidOption { key, expected }
}

impl View {
    /// Starts a render pass.
    ///
    /// The returned promise resolves with this view once its content and every child's content
    /// are in place, or rejects with the first error.
    pub fn render(&self) -> Promise<View> {
        if !self.is_managed() {
            return Promise::rejected(RenderError::Unmanaged(self.id()));
        }

        let deferred = match self.options().get(OptionKey::Deferred) {
            OptionValue::Hook(Hook::Deferred(make)) => make(),
            _ => return Promise::rejected(invalid(OptionKey::Deferred, "a deferred factory")),
        };
        let promise = deferred.promise();
        let pass = self.begin_pass(deferred.clone());

        let render = match self.options().get(OptionKey::Render) {
            OptionValue::Hook(Hook::Render(render)) => Arc::clone(render),
            _ => {
                self.finish(pass, Err(invalid(OptionKey::Render, "a render hook")), &deferred);
                return promise;
            }
        };

        let view = self.clone();
        render(Paint::new(self.id(), move || view.run(pass, deferred)));
        promise
    }

    /// Registers a new pass and supersedes the one in flight.
    fn begin_pass(&self, deferred: Deferred<View>) -> u64 {
        let (pass, stale) = {
            let mut state = self.node.state.lock();
            state.pass += 1;
            state.phase = RenderState::Idle;
            (state.pass, state.pending.replace(deferred))
        };
        if let Some(stale) = stale {
            if stale.reject(RenderError::Superseded) {
                debug!(view = %self.id(), pass, "superseded render pass in flight");
            }
        }
        debug!(view = %self.id(), pass, "render pass started");
        pass
    }

    pub(crate) fn is_current(&self, pass: u64) -> bool {
        self.node.state.lock().pass == pass
    }

    /// Moves the current pass to `phase`; fails if the pass has been superseded.
    fn enter(&self, pass: u64, phase: RenderState) -> Result<(), RenderError> {
        let mut state = self.node.state.lock();
        if state.pass != pass {
            return Err(RenderError::Superseded);
        }
        state.phase = phase;
        trace!(view = %self.id(), pass, ?phase, "render step");
        Ok(())
    }

    /// Settles a pass. Stale passes only reject their own promise.
    fn finish(&self, pass: u64, result: Result<(), RenderError>, deferred: &Deferred<View>) {
        let current = {
            let mut state = self.node.state.lock();
            if state.pass == pass {
                state.phase = match result {
                    Ok(()) => RenderState::Settled,
                    Err(_) => RenderState::Failed,
                };
                state.pending = None;
                true
            } else {
                false
            }
        };

        if !current {
            deferred.reject(RenderError::Superseded);
            return;
        }
        match result {
            Ok(()) => {
                debug!(view = %self.id(), pass, "render pass settled");
                deferred.resolve(self.clone());
            }
            Err(error) => {
                debug!(view = %self.id(), pass, %error, "render pass failed");
                deferred.reject(error);
            }
        }
    }

    /// The body handed to the `render` hook.
    fn run(self, pass: u64, deferred: Deferred<View>) {
        let fetched = match self
            .enter(pass, RenderState::Fetching)
            .and_then(|()| self.fetch_template())
        {
            Ok(fetched) => fetched,
            Err(error) => return self.finish(pass, Err(error), &deferred),
        };

        fetched.then(move |result| {
            let content = result
                .and_then(|template| {
                    self.enter(pass, RenderState::Templating)?;
                    self.apply_template(&template)
                })
                .and_then(|content| {
                    self.enter(pass, RenderState::Inserting)?;
                    self.insert(content)
                })
                .and_then(|()| self.enter(pass, RenderState::RenderingChildren));
            match content {
                Ok(()) => self.render_children(pass, deferred),
                Err(error) => self.finish(pass, Err(error), &deferred),
            }
        });
    }

    /// Resolves the `template` option into a (possibly pending) template.
    fn fetch_template(&self) -> Result<Promise<Template>, RenderError> {
        let options = self.options();
        let locator = match options.get(OptionKey::Template) {
            OptionValue::Hook(Hook::Template(compiled)) => {
                return Ok(Promise::resolved(Template::Compiled(Arc::clone(compiled))))
            }
            OptionValue::Hook(_) => {
                return Err(invalid(OptionKey::Template, "a compiled template or a locator"))
            }
            OptionValue::Plain(Value::String(name)) => name,
            OptionValue::Plain(content) => {
                return Ok(Promise::resolved(Template::Markup(Template::text_of(content))))
            }
        };

        let prefix = match options.get(OptionKey::Prefix) {
            OptionValue::Plain(Value::String(prefix)) => prefix.as_str(),
            OptionValue::Plain(Value::Null) => "",
            _ => return Err(invalid(OptionKey::Prefix, "a string")),
        };
        let locator = format!("{}{}", prefix, locator);
        trace!(view = %self.id(), %locator, "fetching template");

        match options.get(OptionKey::Fetch) {
            OptionValue::Hook(Hook::Fetch(fetch)) => match fetch(&locator) {
                Ok(fetched) => Ok(fetched.into_promise()),
                Err(error) => Err(RenderError::fetch(&locator, error)),
            },
            OptionValue::Plain(value) => Ok(Promise::resolved(Template::Markup(
                Template::text_of(value),
            ))),
            OptionValue::Hook(_) => Err(invalid(OptionKey::Fetch, "a fetch hook")),
        }
    }

    /// Serializes the view data and applies the template to it.
    fn apply_template(&self, template: &Template) -> Result<String, RenderError> {
        let data = self.data();
        let context = match self.options().get(OptionKey::Serialize) {
            OptionValue::Hook(Hook::Serialize(serialize)) => {
                serialize(&data).map_err(|error| RenderError::Template(error.to_string()))?
            }
            OptionValue::Plain(value) => value.clone(),
            OptionValue::Hook(_) => return Err(invalid(OptionKey::Serialize, "a serialize hook")),
        };
        template
            .apply(&context)
            .map_err(|error| RenderError::Template(error.to_string()))
    }

    /// Puts the content into this view's own element.
    fn insert(&self, content: String) -> Result<(), RenderError> {
        match self.options().get(OptionKey::Html) {
            OptionValue::Hook(Hook::Html(html)) => html(self.el(), Content::Markup(content))
                .map_err(|error| RenderError::Insertion(error.to_string())),
            _ => Err(invalid(OptionKey::Html, "an html hook")),
        }
    }

    /// Places a settled child's element at its placeholder.
    fn place(&self, child: &Child) -> Result<(), RenderError> {
        let options = self.options();
        let (key, slot) = match child.placement {
            Placement::Replace => (OptionKey::Html, options.get(OptionKey::Html)),
            Placement::Append => (OptionKey::Append, options.get(OptionKey::Append)),
        };
        let insert = match slot {
            OptionValue::Hook(Hook::Html(insert)) | OptionValue::Hook(Hook::Append(insert)) => {
                Arc::clone(insert)
            }
            _ => return Err(invalid(key, "an insertion hook")),
        };
        match options.get(OptionKey::Partial) {
            OptionValue::Hook(Hook::Partial(partial)) => {
                partial(self.el(), &child.name, child.view.el(), &*insert)
                    .map_err(|error| RenderError::Insertion(error.to_string()))
            }
            _ => Err(invalid(OptionKey::Partial, "a partial hook")),
        }
    }

    fn render_children(self, pass: u64, deferred: Deferred<View>) {
        let children = self.node.state.lock().children.clone();
        let queue = Arc::new(Mutex::new(PlacementQueue::new(children.len())));
        let mut pending = Vec::with_capacity(children.len());
        for (index, child) in children.into_iter().enumerate() {
            let rendering = child.view.render();
            pending.push(self.settle_child(pass, index, child, rendering, Arc::clone(&queue)));
        }

        let all = match self.options().get(OptionKey::When) {
            OptionValue::Hook(Hook::When(when)) => when(pending),
            _ => Promise::rejected(invalid(OptionKey::When, "a when hook")),
        };
        all.then(move |result| self.finish(pass, result.map(drop), &deferred));
    }

    /// Queues a child for placement once `rendering` settles.
    ///
    /// If the child's pass is superseded by a newer one while it is still attached, the newer
    /// pass is followed instead. A child removed mid-pass is skipped.
    fn settle_child(
        &self,
        pass: u64,
        index: usize,
        child: Child,
        rendering: Promise<View>,
        queue: Arc<Mutex<PlacementQueue>>,
    ) -> Promise<View> {
        let settled = Deferred::new();
        let promise = settled.promise();
        let parent = self.clone();

        rendering.then(move |result| {
            let result = match result {
                Ok(rendered) => parent
                    .advance(pass, &queue, index, Queued::Ready(child))
                    .map(|()| rendered),
                Err(RenderError::Superseded) if parent.holds(&child) => {
                    if let Some(newer) = child.view.pending() {
                        return parent
                            .settle_child(pass, index, child, newer, queue)
                            .then(move |result| {
                                settled.settle(result);
                            });
                    }
                    Err(RenderError::Superseded)
                }
                Err(RenderError::Superseded) => {
                    let view = child.view.clone();
                    parent
                        .advance(pass, &queue, index, Queued::Skipped)
                        .map(|()| view)
                }
                Err(error) => Err(error),
            };
            settled.settle(result);
        });
        promise
    }

    /// Records a settled child and places every child whose earlier siblings are done.
    ///
    /// Children are placed in the order they were attached, regardless of the order in which
    /// they settle.
    fn advance(
        &self,
        pass: u64,
        queue: &Mutex<PlacementQueue>,
        index: usize,
        entry: Queued,
    ) -> Result<(), RenderError> {
        let ready = queue.lock().settle(index, entry);
        for child in ready {
            if self.is_current(pass) && self.holds(&child) {
                self.place(&child)?;
            }
        }
        Ok(())
    }
}

enum Queued {
    Waiting,
    Ready(Child),
    Skipped,
}

/// Children of one pass, in attachment order, waiting to be placed.
struct PlacementQueue {
    entries: Vec<Queued>,
    next: usize,
}

impl PlacementQueue {
    fn new(len: usize) -> PlacementQueue {
        PlacementQueue {
            entries: (0..len).map(|_| Queued::Waiting).collect(),
            next: 0,
        }
    }

    /// Fills in entry `index` and drains the settled prefix.
    fn settle(&mut self, index: usize, entry: Queued) -> Vec<Child> {
        self.entries[index] = entry;
        let mut ready = Vec::new();
        while let Some(entry) = self.entries.get_mut(self.next) {
            match std::mem::replace(entry, Queued::Skipped) {
                Queued::Waiting => {
                    *entry = Queued::Waiting;
                    break;
                }
                Queued::Ready(child) => ready.push(child),
                Queued::Skipped => {}
            }
            self.next += 1;
        }
        ready
    }
}
