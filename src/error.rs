//! Errors.

use crate::option::OptionKey;
use crate::view::ViewId;
use std::error::Error;
use thiserror::Error;

/// The error type user hooks may return.
///
/// The pipeline converts it into the [`RenderError`] variant of the step the hook belongs to.
pub type HookError = Box<dyn Error + Send + Sync>;

/// Result type for user hooks.
pub type HookResult<T> = Result<T, HookError>;

/// Reasons a render pass can fail.
///
/// Rejections fan out to every subscriber of a promise, so this type is cheap to clone and only
/// carries messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// `fetch` returned an error or its promise rejected.
    #[error("failed to fetch template `{locator}`: {message}")]
    Fetch { locator: String, message: String },

    /// `serialize` or the template itself failed.
    #[error("failed to render template: {0}")]
    Template(String),

    /// `partial`, `html` or `append` failed.
    #[error("failed to insert content: {0}")]
    Insertion(String),

    /// An option slot did not hold what the pipeline needed at that step.
    #[error("option `{key}` is not usable here: expected {expected}")]
    InvalidOption {
        key: OptionKey,
        expected: &'static str,
    },

    /// The view does not take part in composition.
    #[error("view {0} is not managed")]
    Unmanaged(ViewId),

    /// A newer pass started (or the view was disposed) before this one settled.
    #[error("render pass was superseded")]
    Superseded,
}

impl RenderError {
    /// A fetch failure for `locator`.
    pub fn fetch(locator: &str, error: impl ToString) -> RenderError {
        RenderError::Fetch {
            locator: locator.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Errors from mutating the view tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// Only managed views can be nested.
    #[error("view {0} is not managed and cannot be nested")]
    Unmanaged(ViewId),

    /// The child is the parent itself or one of its ancestors.
    #[error("view {child} cannot be nested inside {parent}: it would create a cycle")]
    Cycle { parent: ViewId, child: ViewId },
}
