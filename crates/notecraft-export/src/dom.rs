//! Owned snapshot of an HTML subtree
//!
//! Export works on detached copies, so the tree is a plain owned value:
//! cloning it is a deep clone and dropping it releases everything.

use crate::types::{ExportError, Result};
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};

/// Elements whose end tag is never serialized
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
    /// Rendered box size in CSS pixels, when captured from a live document
    pub measured: Option<(u32, u32)>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
            measured: None,
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_child(Node::Text(text.into()))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_ascii_lowercase(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Iterate over child elements, skipping text
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Visit every descendant element (not `self`) in document order
    pub fn for_each_descendant_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Node::Element(el) = child {
                f(el);
                el.for_each_descendant_mut(f);
            }
        }
    }

    /// Collect references to every descendant element with the given tag
    pub fn descendants_by_tag<'a>(&'a self, tag: &str, out: &mut Vec<&'a Element>) {
        for el in self.child_elements() {
            if el.is(tag) {
                out.push(el);
            }
            el.descendants_by_tag(tag, out);
        }
    }

    /// Concatenated text content of the subtree
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// True when the subtree has no elements and only whitespace text
    pub fn is_blank(&self) -> bool {
        self.children.iter().all(|child| match child {
            Node::Element(_) => false,
            Node::Text(text) => text.trim().is_empty(),
        })
    }

    /// Serialize the element and its subtree as HTML
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// Parse an HTML fragment or document into a `div` wrapping the body's children
pub fn parse_fragment(html: &str) -> Result<Element> {
    let document = kuchiki::parse_html().one(html);
    let body = document
        .select_first("body")
        .map_err(|()| ExportError::Preparation("HTML has no body element".to_string()))?;

    let mut root = Element::new("div");
    for child in body.as_node().children() {
        if let Some(node) = convert_node(&child) {
            root.children.push(node);
        }
    }
    Ok(root)
}

fn convert_node(node: &NodeRef) -> Option<Node> {
    match node.data() {
        NodeData::Element(el) => {
            let mut element = Element::new(&*el.name.local);
            let attrs = el.attributes.borrow();
            for (k, v) in attrs.map.iter() {
                element
                    .attrs
                    .push(((*k.local).to_ascii_lowercase(), v.value.clone()));
            }
            drop(attrs);
            element.measured = snapshot_size(&element);
            for child in node.children() {
                if let Some(converted) = convert_node(&child) {
                    element.children.push(converted);
                }
            }
            Some(Node::Element(element))
        }
        NodeData::Text(text) => Some(Node::Text(text.borrow().clone())),
        _ => None,
    }
}

/// Rendered box size recorded in a captured snapshot.
///
/// Inline `width`/`height` pixel styles win over `data-width`/`data-height`.
fn snapshot_size(el: &Element) -> Option<(u32, u32)> {
    let mut width = el.attr("data-width").and_then(parse_pixels);
    let mut height = el.attr("data-height").and_then(parse_pixels);

    if let Some(style) = el.attr("style") {
        for declaration in style.split(';') {
            let Some((name, value)) = declaration.split_once(':') else {
                continue;
            };
            match name.trim().to_ascii_lowercase().as_str() {
                "width" => width = parse_pixels(value).or(width),
                "height" => height = parse_pixels(value).or(height),
                _ => {}
            }
        }
    }

    Some((width?, height?))
}

/// `12`, `12px` or `12.6px`, rounded; other units are not measurements
fn parse_pixels(value: &str) -> Option<u32> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Element(child) => collect_text(child, out),
            Node::Text(text) => out.push_str(text),
        }
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (k, v) in &el.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        escape_html(v, true, out);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        return;
    }

    let raw_text = matches!(el.tag.as_str(), "style" | "script");
    for child in &el.children {
        match child {
            Node::Element(child) => write_element(child, out),
            Node::Text(text) if raw_text => out.push_str(text),
            Node::Text(text) => escape_html(text, false, out),
        }
    }

    out.push_str("</");
    out.push_str(&el.tag);
    out.push('>');
}

fn escape_html(input: &str, attr: bool, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
