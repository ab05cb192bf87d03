//! Fetched templates.

use crate::deferred::Promise;
use crate::error::HookResult;
use crate::option::TemplateFn;
use core::fmt;
use serde_json::Value;
use std::sync::Arc;

/// What `fetch` produces: finished markup, or a compiled template still waiting for data.
#[derive(Clone)]
pub enum Template {
    Markup(String),
    Compiled(Arc<TemplateFn>),
}

impl Template {
    pub fn compiled(f: impl Fn(&Value) -> HookResult<String> + Send + Sync + 'static) -> Template {
        Template::Compiled(Arc::new(f))
    }

    /// Produces the final content for the given template data.
    pub fn apply(&self, data: &Value) -> HookResult<String> {
        match self {
            Template::Markup(markup) => Ok(markup.clone()),
            Template::Compiled(template) => template(data),
        }
    }

    /// Renders a plain value as text: strings verbatim, null as nothing, anything else as JSON.
    pub fn text_of(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Template::Markup(markup) => f.debug_tuple("Markup").field(markup).finish(),
            Template::Compiled(_) => f.write_str("Compiled(..)"),
        }
    }
}

impl From<&str> for Template {
    fn from(markup: &str) -> Self {
        Template::Markup(markup.to_owned())
    }
}

impl From<String> for Template {
    fn from(markup: String) -> Self {
        Template::Markup(markup)
    }
}

/// The result of a `fetch` hook.
#[derive(Clone, Debug)]
pub enum Fetch {
    /// The template is available right away.
    Ready(Template),
    /// The template arrives later.
    Pending(Promise<Template>),
}

impl Fetch {
    /// Normalizes to a promise.
    pub fn into_promise(self) -> Promise<Template> {
        match self {
            Fetch::Ready(template) => Promise::resolved(template),
            Fetch::Pending(promise) => promise,
        }
    }
}

impl From<Template> for Fetch {
    fn from(template: Template) -> Self {
        Fetch::Ready(template)
    }
}

impl From<&str> for Fetch {
    fn from(markup: &str) -> Self {
        Fetch::Ready(markup.into())
    }
}

impl From<String> for Fetch {
    fn from(markup: String) -> Self {
        Fetch::Ready(markup.into())
    }
}

impl From<Promise<Template>> for Fetch {
    fn from(promise: Promise<Template>) -> Self {
        Fetch::Pending(promise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_templates() {
        let greeting = Template::compiled(|data| {
            let name = data["name"].as_str().ok_or("missing name")?;
            Ok(format!("hello {}", name))
        });
        assert_eq!(greeting.apply(&json!({ "name": "perch" })).unwrap(), "hello perch");
        assert!(greeting.apply(&json!({})).is_err());
        assert_eq!(Template::from("<p></p>").apply(&json!(1)).unwrap(), "<p></p>");
    }

    #[test]
    fn plain_text() {
        assert_eq!(Template::text_of(&json!(null)), "");
        assert_eq!(Template::text_of(&json!("hi")), "hi");
        assert_eq!(Template::text_of(&json!({ "a": 1 })), r#"{"a":1}"#);
    }
}
