//! Tree-source abstraction.
//!
//! The extractor never touches a concrete DOM; it works against the
//! [`MarkupNode`] capability trait. Two adapters are provided: one over
//! [`scraper`]'s HTML tree, and [`SimpleNode`], a small owned tree used in
//! tests and as a pre-parsed form for profile documents.

use itertools::Itertools;
use oxiri::Iri;
use scraper::{ElementRef, Html};

use crate::Error;

/// Capabilities the extractor needs from an element of a parsed tree.
///
/// Implementations are cheap handles (`Copy`/`Rc`) into a tree owned
/// elsewhere; cloning a node must not clone the subtree.
pub trait MarkupNode: Clone {
    /// Local element name.
    fn name(&self) -> &str;

    /// Raw attribute value, if the attribute is present.
    fn attr(&self, name: &str) -> Option<&str>;

    /// `xmlns:*` declarations carried by this element, as
    /// `(prefix, namespace IRI)` pairs.
    fn namespace_declarations(&self) -> Vec<(String, String)>;

    /// Element-type children in document order. Text and other node types
    /// are not exposed; they only contribute through [`Self::text_content`]
    /// and [`Self::inner_markup`].
    fn element_children(&self) -> Vec<Self>;

    fn has_element_children(&self) -> bool {
        !self.element_children().is_empty()
    }

    /// Concatenated text content of the whole subtree.
    fn text_content(&self) -> String;

    /// Serialized inner markup of the element (tags, attributes and text,
    /// excluding the element itself). `inject_namespaces` are in-scope
    /// namespace declarations the serializer adds to top-level child
    /// elements that do not already declare them, so the fragment stands
    /// alone.
    fn inner_markup(&self, inject_namespaces: &[(String, String)]) -> String;
}

impl<'a> MarkupNode for ElementRef<'a> {
    fn name(&self) -> &str {
        self.value().name()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn namespace_declarations(&self) -> Vec<(String, String)> {
        // foreign content carries a real `xmlns` prefix; in plain HTML the
        // parser stores the whole `xmlns:p` as the local name
        self.value()
            .attrs
            .iter()
            .filter_map(|(qn, value)| {
                if qn.prefix.as_deref() == Some("xmlns") {
                    Some((qn.local.to_string(), value.to_string()))
                } else {
                    qn.local
                        .strip_prefix("xmlns:")
                        .map(|prefix| (prefix.to_string(), value.to_string()))
                }
            })
            .collect()
    }

    fn element_children(&self) -> Vec<Self> {
        self.children().filter_map(ElementRef::wrap).collect()
    }

    fn has_element_children(&self) -> bool {
        self.children().any(|child| child.value().is_element())
    }

    fn text_content(&self) -> String {
        self.text().join("")
    }

    fn inner_markup(&self, inject_namespaces: &[(String, String)]) -> String {
        if inject_namespaces.is_empty() {
            return self.inner_html();
        }

        let mut out = String::new();
        for child in self.children() {
            if let Some(el) = ElementRef::wrap(child) {
                let declared: Vec<String> = el.namespace_declarations()
                    .into_iter()
                    .map(|(prefix, _)| prefix)
                    .collect();
                let mut decls = String::new();
                for (prefix, iri) in inject_namespaces {
                    if !declared.iter().any(|d| d == prefix) {
                        decls.push_str(" xmlns:");
                        decls.push_str(prefix);
                        decls.push_str("=\"");
                        escape_attr(iri, &mut decls);
                        decls.push('"');
                    }
                }
                // the serialized element starts `<name`, insert right after
                let mut html = el.html();
                html.insert_str(1 + el.value().name().len(), &decls);
                out.push_str(&html);
            } else if let Some(text) = child.value().as_text() {
                escape_text(text, &mut out);
            } else if let Some(comment) = child.value().as_comment() {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
        }
        out
    }
}

/// Effective base IRI of an HTML document: an `html>head>base[href]`
/// declaration wins over the caller-supplied fallback. Applied once at the
/// root parse step, never per element.
pub fn html_document_base(document: &Html, fallback: Iri<String>) -> Result<Iri<String>, Error> {
    let selector =
        scraper::selector::Selector::parse("html>head>base").expect("static selector is valid");

    if let Some(base_el) = document.select(&selector).next() {
        if let Some(href) = base_el.attr("href") {
            return Iri::parse(href.to_string()).map_err(|source| Error::iri(source, href));
        }
    }

    Ok(fallback)
}

/// An owned, immutable element tree.
///
/// Built with [`SimpleElement`]; handles are reference-counted so
/// [`MarkupNode::element_children`] stays cheap.
#[derive(Clone)]
pub struct SimpleNode {
    inner: std::rc::Rc<ElementData>,
}

struct ElementData {
    name: String,
    attrs: indexmap::IndexMap<String, String>,
    children: Vec<SimpleChild>,
}

enum SimpleChild {
    Element(SimpleNode),
    Text(String),
}

/// Builder for [`SimpleNode`] trees.
#[derive(Default)]
pub struct SimpleElement {
    name: String,
    attrs: indexmap::IndexMap<String, String>,
    children: Vec<SimpleChild>,
}

impl SimpleElement {
    pub fn new(name: impl Into<String>) -> Self {
        SimpleElement {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(SimpleChild::Text(text.into()));
        self
    }

    pub fn child(mut self, child: SimpleElement) -> Self {
        self.children.push(SimpleChild::Element(child.build()));
        self
    }

    pub fn build(self) -> SimpleNode {
        SimpleNode {
            inner: std::rc::Rc::new(ElementData {
                name: self.name,
                attrs: self.attrs,
                children: self.children,
            }),
        }
    }
}

impl SimpleNode {
    fn serialize_into(&self, out: &mut String, inject: &[(String, String)]) {
        out.push('<');
        out.push_str(&self.inner.name);
        for (prefix, iri) in inject {
            let attr_name = format!("xmlns:{prefix}");
            if !self.inner.attrs.contains_key(&attr_name) {
                out.push(' ');
                out.push_str(&attr_name);
                out.push_str("=\"");
                escape_attr(iri, out);
                out.push('"');
            }
        }
        for (name, value) in &self.inner.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_attr(value, out);
            out.push('"');
        }
        out.push('>');
        for child in &self.inner.children {
            match child {
                // namespaces are only injected at the top level of the
                // serialized fragment
                SimpleChild::Element(el) => el.serialize_into(out, &[]),
                SimpleChild::Text(text) => escape_text(text, out),
            }
        }
        out.push_str("</");
        out.push_str(&self.inner.name);
        out.push('>');
    }
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

impl MarkupNode for SimpleNode {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.inner.attrs.get(name).map(String::as_str)
    }

    fn namespace_declarations(&self) -> Vec<(String, String)> {
        self.inner
            .attrs
            .iter()
            .filter_map(|(name, value)| {
                name.strip_prefix("xmlns:")
                    .map(|prefix| (prefix.to_string(), value.clone()))
            })
            .collect()
    }

    fn element_children(&self) -> Vec<Self> {
        self.inner
            .children
            .iter()
            .filter_map(|child| match child {
                SimpleChild::Element(el) => Some(el.clone()),
                SimpleChild::Text(_) => None,
            })
            .collect()
    }

    fn has_element_children(&self) -> bool {
        self.inner
            .children
            .iter()
            .any(|child| matches!(child, SimpleChild::Element(_)))
    }

    fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    fn inner_markup(&self, inject_namespaces: &[(String, String)]) -> String {
        let mut out = String::new();
        for child in &self.inner.children {
            match child {
                SimpleChild::Element(el) => el.serialize_into(&mut out, inject_namespaces),
                SimpleChild::Text(text) => escape_text(text, &mut out),
            }
        }
        out
    }
}

fn collect_text(node: &SimpleNode, out: &mut String) {
    for child in &node.inner.children {
        match child {
            SimpleChild::Element(el) => collect_text(el, out),
            SimpleChild::Text(text) => out.push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_node_text_concatenates_subtree() {
        let node = SimpleElement::new("h2")
            .text("E = mc")
            .child(SimpleElement::new("sup").text("2"))
            .build();

        assert_eq!(node.text_content(), "E = mc2");
    }

    #[test]
    fn simple_node_inner_markup_preserves_tags() {
        let node = SimpleElement::new("h2")
            .text("E = mc")
            .child(SimpleElement::new("sup").text("2"))
            .build();

        assert_eq!(node.inner_markup(&[]), "E = mc<sup>2</sup>");
    }

    #[test]
    fn inner_markup_injects_namespaces_on_top_level_children() {
        let node = SimpleElement::new("div")
            .child(SimpleElement::new("p").child(SimpleElement::new("b").text("x")))
            .build();

        let inject = [("ex".to_string(), "http://example.org/ns#".to_string())];
        assert_eq!(
            node.inner_markup(&inject),
            r#"<p xmlns:ex="http://example.org/ns#"><b>x</b></p>"#
        );
    }

    #[test]
    fn inner_markup_escapes_text_and_attributes() {
        let node = SimpleElement::new("div")
            .child(SimpleElement::new("span").attr("title", "a\"b").text("1 < 2"))
            .build();

        assert_eq!(
            node.inner_markup(&[]),
            r#"<span title="a&quot;b">1 &lt; 2</span>"#
        );
    }

    #[test]
    fn scraper_adapter_exposes_children_and_text() {
        let html = Html::parse_document("<html><body><div about=\"urn:x\">a<span>b</span></div></body></html>");
        let root = html.root_element();
        assert_eq!(MarkupNode::name(&root), "html");

        let body = root.element_children().into_iter().nth(1).unwrap();
        let div = body.element_children().into_iter().next().unwrap();
        assert_eq!(MarkupNode::attr(&div, "about"), Some("urn:x"));
        assert_eq!(div.text_content(), "ab");
        assert!(div.has_element_children());
    }

    #[test]
    fn scraper_adapter_collects_xmlns_declarations() {
        let html = Html::parse_document(
            r#"<html><body><div xmlns:ex="http://example.org/ns#"></div></body></html>"#,
        );
        let root = html.root_element();
        let body = root.element_children().into_iter().nth(1).unwrap();
        let div = body.element_children().into_iter().next().unwrap();

        assert_eq!(
            div.namespace_declarations(),
            vec![("ex".to_string(), "http://example.org/ns#".to_string())]
        );
    }

    #[test]
    fn scraper_inner_markup_injects_missing_namespaces() {
        let html =
            Html::parse_document("<html><body><div>E = mc<sup>2</sup></div></body></html>");
        let root = html.root_element();
        let body = root.element_children().into_iter().nth(1).unwrap();
        let div = body.element_children().into_iter().next().unwrap();

        let inject = [("ex".to_string(), "http://example.org/ns#".to_string())];
        assert_eq!(
            div.inner_markup(&inject),
            r#"E = mc<sup xmlns:ex="http://example.org/ns#">2</sup>"#
        );
    }

    #[test]
    fn scraper_inner_markup_keeps_existing_declarations() {
        let html = Html::parse_document(
            r#"<html><body><div><p xmlns:ex="http://other.example/">x</p></div></body></html>"#,
        );
        let root = html.root_element();
        let body = root.element_children().into_iter().nth(1).unwrap();
        let div = body.element_children().into_iter().next().unwrap();

        let inject = [("ex".to_string(), "http://example.org/ns#".to_string())];
        assert_eq!(
            div.inner_markup(&inject),
            r#"<p xmlns:ex="http://other.example/">x</p>"#
        );
    }

    #[test]
    fn html_base_declaration_wins_over_fallback() {
        let html = Html::parse_document(
            "<html><head><base href=\"http://example.org/docs/\"></head><body></body></html>",
        );
        let fallback = Iri::parse("http://fallback.invalid/".to_string()).unwrap();
        let base = html_document_base(&html, fallback).unwrap();
        assert_eq!(base.as_str(), "http://example.org/docs/");
    }
}
