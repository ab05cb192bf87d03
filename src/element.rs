//! In-memory element tree.
//!
//! Stands in for the host's markup tree: every view renders into an [`Element`], and parents
//! place child elements at named placeholders inside their own. Hosts that mirror into a real
//! document can do so from the `html`, `append` and `partial` hooks.

use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// Something an element can hold.
#[derive(Clone, Debug)]
pub enum Content {
    Markup(String),
    Element(Element),
}

impl From<String> for Content {
    fn from(markup: String) -> Self {
        Content::Markup(markup)
    }
}

impl From<&str> for Content {
    fn from(markup: &str) -> Self {
        Content::Markup(markup.to_owned())
    }
}

impl From<Element> for Content {
    fn from(element: Element) -> Self {
        Content::Element(element)
    }
}

/// How a child element is placed at a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Replace whatever the placeholder holds.
    Replace,
    /// Add after whatever the placeholder holds.
    Append,
}

#[derive(Default)]
struct ElementData {
    /// Set on placeholder elements.
    name: Option<String>,
    contents: Vec<Content>,
}

/// A shared handle to a node in the element tree.
#[derive(Clone, Default)]
pub struct Element {
    data: Arc<Mutex<ElementData>>,
}

impl Element {
    pub fn new() -> Element {
        Element::default()
    }

    fn named(name: &str) -> Element {
        Element {
            data: Arc::new(Mutex::new(ElementData {
                name: Some(name.to_owned()),
                contents: Vec::new(),
            })),
        }
    }

    /// Whether both handles refer to the same element.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// The placeholder name, if this is a placeholder.
    pub fn name(&self) -> Option<String> {
        self.data.lock().name.clone()
    }

    /// Replaces all contents, including placeholders.
    pub fn set_content(&self, content: Content) {
        let mut data = self.data.lock();
        data.contents.clear();
        if !self.would_contain_itself(&content) {
            data.contents.push(content);
        }
    }

    /// Adds content after the existing contents.
    pub fn append(&self, content: Content) {
        if !self.would_contain_itself(&content) {
            self.data.lock().contents.push(content);
        }
    }

    fn would_contain_itself(&self, content: &Content) -> bool {
        match content {
            Content::Element(element) => element.ptr_eq(self),
            Content::Markup(_) => false,
        }
    }

    /// Finds the placeholder called `name`, creating it at the end if there is none.
    ///
    /// The empty name addresses the element itself.
    pub fn placeholder(&self, name: &str) -> Element {
        if name.is_empty() {
            return self.clone();
        }
        if let Some(found) = self.find_placeholder(name) {
            return found;
        }
        let placeholder = Element::named(name);
        self.data
            .lock()
            .contents
            .push(Content::Element(placeholder.clone()));
        placeholder
    }

    /// Depth-first search for a placeholder.
    pub fn find_placeholder(&self, name: &str) -> Option<Element> {
        let children = self.child_elements();
        for child in children {
            if child.name().as_deref() == Some(name) {
                return Some(child);
            }
            if let Some(found) = child.find_placeholder(name) {
                return Some(found);
            }
        }
        None
    }

    /// Detaches `element` from wherever it sits below this element.
    ///
    /// Returns false if it was not found.
    pub fn remove(&self, element: &Element) -> bool {
        let removed = {
            let mut data = self.data.lock();
            let before = data.contents.len();
            data.contents.retain(|content| match content {
                Content::Element(child) => !child.ptr_eq(element),
                Content::Markup(_) => true,
            });
            data.contents.len() != before
        };
        removed || self.child_elements().iter().any(|child| child.remove(element))
    }

    /// Whether `element` sits anywhere below this element.
    pub fn contains(&self, element: &Element) -> bool {
        self.child_elements()
            .iter()
            .any(|child| child.ptr_eq(element) || child.contains(element))
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().contents.is_empty()
    }

    /// Serializes the element's contents. Placeholders are transparent.
    pub fn markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        let contents = self.data.lock().contents.clone();
        for content in contents {
            match content {
                Content::Markup(markup) => out.push_str(&markup),
                Content::Element(element) => element.write_markup(out),
            }
        }
    }

    fn child_elements(&self) -> Vec<Element> {
        self.data
            .lock()
            .contents
            .iter()
            .filter_map(|content| match content {
                Content::Element(element) => Some(element.clone()),
                Content::Markup(_) => None,
            })
            .collect()
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name())
            .field("markup", &self.markup())
            .finish()
    }
}
