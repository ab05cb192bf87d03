//! Nesting views at named placeholders.

use crate::element::Placement;
use crate::error::{CompositionError, RenderError};
use crate::view::{Child, RenderState, View};
use std::sync::Arc;
use tracing::debug;

impl View {
    /// Puts `view` at placeholder `name`, disposing whatever was there.
    ///
    /// A view that already has a parent is moved, not copied. Returns the new child.
    pub fn set_view(&self, name: &str, view: View) -> Result<View, CompositionError> {
        self.check_child(&view)?;
        self.attach(name, view.clone(), Placement::Replace);
        Ok(view)
    }

    /// Adds `view` at placeholder `name`, after any views already there.
    pub fn insert_view(&self, name: &str, view: View) -> Result<View, CompositionError> {
        self.check_child(&view)?;
        self.attach(name, view.clone(), Placement::Append);
        Ok(view)
    }

    /// Sets several placeholders at once.
    ///
    /// Either every entry is installed or, if one is rejected, none is. Placeholders not named
    /// in `views` keep their children.
    pub fn set_views<I, K>(&self, views: I) -> Result<(), CompositionError>
    where
        I: IntoIterator<Item = (K, View)>,
        K: AsRef<str>,
    {
        let views: Vec<(K, View)> = views.into_iter().collect();
        for (_, view) in &views {
            self.check_child(view)?;
        }
        for (name, view) in views {
            self.attach(name.as_ref(), view, Placement::Replace);
        }
        Ok(())
    }

    /// The first child at placeholder `name`.
    pub fn get_view(&self, name: &str) -> Option<View> {
        self.node
            .state
            .lock()
            .children
            .iter()
            .find(|child| child.name == name)
            .map(|child| child.view.clone())
    }

    /// Every child at placeholder `name`, in insertion order.
    pub fn get_views(&self, name: &str) -> Vec<View> {
        self.node
            .state
            .lock()
            .children
            .iter()
            .filter(|child| child.name == name)
            .map(|child| child.view.clone())
            .collect()
    }

    /// Every child, with its placeholder name.
    pub fn children(&self) -> Vec<(String, View)> {
        self.node
            .state
            .lock()
            .children
            .iter()
            .map(|child| (child.name.clone(), child.view.clone()))
            .collect()
    }

    /// Disposes and detaches every child at placeholder `name`.
    pub fn remove_view(&self, name: &str) -> Vec<View> {
        let removed: Vec<View> = {
            let mut state = self.node.state.lock();
            let (removed, kept): (Vec<Child>, Vec<Child>) = state
                .children
                .drain(..)
                .partition(|child| child.name == name);
            state.children = kept;
            removed.into_iter().map(|child| child.view).collect()
        };
        for view in &removed {
            self.el().remove(view.el());
            view.node.state.lock().parent = None;
            view.supersede_tree();
        }
        removed
    }

    /// Supersedes any pass in flight here and below, and detaches from the parent.
    pub fn dispose(&self) {
        if let Some(parent) = self.parent() {
            parent.detach(self);
        }
        self.supersede_tree();
    }

    /// The view this one is nested in.
    pub fn parent(&self) -> Option<View> {
        self.node
            .state
            .lock()
            .parent
            .as_ref()
            .and_then(|parent| parent.upgrade())
            .map(View::from_node)
    }

    /// Whether `child` is still nested here, at the same placeholder and with the same placement.
    pub(crate) fn holds(&self, child: &Child) -> bool {
        self.node.state.lock().children.iter().any(|held| {
            held.name == child.name && held.view == child.view && held.placement == child.placement
        })
    }

    fn check_child(&self, view: &View) -> Result<(), CompositionError> {
        if !view.is_managed() {
            return Err(CompositionError::Unmanaged(view.id()));
        }
        let mut ancestor = Some(self.clone());
        while let Some(current) = ancestor {
            if current == *view {
                return Err(CompositionError::Cycle {
                    parent: self.id(),
                    child: view.id(),
                });
            }
            ancestor = current.parent();
        }
        Ok(())
    }

    fn attach(&self, name: &str, view: View, placement: Placement) {
        if let Some(previous) = view.parent() {
            // re-parenting keeps the view alive
            previous.detach(&view);
        }

        let replaced: Vec<View> = if placement == Placement::Replace {
            self.remove_view(name)
        } else {
            Vec::new()
        };

        {
            let mut state = self.node.state.lock();
            state.children.push(Child {
                name: name.to_owned(),
                view: view.clone(),
                placement,
            });
        }
        view.node.state.lock().parent = Some(Arc::downgrade(&self.node));
        debug!(parent = %self.id(), child = %view.id(), name, replaced = replaced.len(), "attached view");
    }

    /// Unlinks a child without disposing it.
    fn detach(&self, view: &View) {
        self.node
            .state
            .lock()
            .children
            .retain(|child| child.view != *view);
        self.el().remove(view.el());
        view.node.state.lock().parent = None;
    }

    fn supersede_tree(&self) {
        let (stale, children) = {
            let mut state = self.node.state.lock();
            let stale = state.pending.take();
            if stale.is_some() {
                state.pass += 1;
                state.phase = RenderState::Idle;
            }
            let children: Vec<View> = state.children.iter().map(|child| child.view.clone()).collect();
            (stale, children)
        };
        if let Some(stale) = stale {
            debug!(view = %self.id(), "disposed view with a render pass in flight");
            stale.reject(RenderError::Superseded);
        }
        for child in children {
            child.supersede_tree();
        }
    }
}
