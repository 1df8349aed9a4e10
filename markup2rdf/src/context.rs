//! The evaluation context threaded down the element tree.
//!
//! A context is created once at the root and derived once per element
//! subtree. Shared payloads (`Rc` maps) are copy-on-write: an element that
//! needs to add a mapping clones the map first, so a published context is
//! never mutated under a sibling subtree.

use std::rc::Rc;

use icu::locale::LanguageIdentifier;
use indexmap::IndexMap;
use oxiri::Iri;
use oxrdf::{NamedNode, NamedOrBlankNode};

/// A deferred relation whose object (or subject, for reverse relations) is
/// not yet known. Completed by the nearest descendant that establishes a
/// subject, then discarded.
#[derive(Debug, Clone)]
pub(crate) struct PendingRelation {
    pub predicate: NamedNode,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Reverse,
}

#[derive(Clone)]
pub(crate) struct EvaluationContext {
    /// Absolute IRI relative references resolve against. Fixed at the root
    /// parse step; never overridden per element.
    pub base: Iri<String>,

    /// Subject children inherit when they do not establish their own.
    pub parent_subject: Rc<NamedOrBlankNode>,

    /// Most specific subject/object established by the parent; the fallback
    /// new-subject, and the hanging point for chained descendants.
    pub parent_object: Option<Rc<NamedOrBlankNode>>,

    /// Prefix → namespace IRI. Prefixes are lower-cased at registration.
    pub uri_mappings: Rc<curie::PrefixMapping>,

    /// Relations awaiting a descendant subject. Owned by the context handed
    /// to children; consumed exactly once, never inherited further down.
    pub incomplete_triples: Vec<PendingRelation>,

    /// In-scope language tag.
    pub language: Option<Rc<LanguageIdentifier>>,

    /// Bare term → IRI, looked up case-insensitively.
    pub term_mappings: Rc<IndexMap<String, NamedNode>>,

    /// IRI prefix applied to bare terms missing from `term_mappings`.
    pub default_vocabulary: Option<NamedNode>,

    /// In-scope `xmlns:*` declarations, kept for rich-markup literal
    /// serialization.
    pub xml_namespaces: Rc<IndexMap<String, String>>,
}

/// The locally computed values an element contributes to its children's
/// context. Produced by the traversal, consumed by
/// [`EvaluationContext::derive_child`].
pub(crate) struct ChildScope {
    pub skip: bool,
    pub new_subject: Option<Rc<NamedOrBlankNode>>,
    pub current_object_resource: Option<Rc<NamedOrBlankNode>>,
    pub incomplete_triples: Vec<PendingRelation>,
    pub uri_mappings: Rc<curie::PrefixMapping>,
    pub term_mappings: Rc<IndexMap<String, NamedNode>>,
    pub language: Option<Rc<LanguageIdentifier>>,
    pub default_vocabulary: Option<NamedNode>,
    pub xml_namespaces: Rc<IndexMap<String, String>>,
}

impl EvaluationContext {
    pub(crate) fn initial(base: Iri<String>) -> Self {
        let uri_mappings = Rc::new(crate::initial_prefixes());
        let term_mappings = Rc::new(crate::initial_terms());

        // resolve the base against itself to strip any fragment, so it can
        // serve directly as the implicit-subject value
        let base = base.resolve("").expect("empty reference always resolves");

        Self {
            parent_subject: Rc::new(
                oxrdf::NamedNode::new_unchecked(base.as_str().to_string()).into(),
            ),
            base,
            parent_object: None,
            uri_mappings,
            incomplete_triples: Vec::new(),
            language: None,
            term_mappings,
            default_vocabulary: None,
            xml_namespaces: Rc::new(IndexMap::new()),
        }
    }

    /// Derive the context passed to the element's children.
    ///
    /// A skipped element passes the inherited subject, object and pending
    /// relations through untouched; only its mapping/language/vocabulary
    /// updates take effect. Any other element publishes its new subject and
    /// object resource and replaces the pending-relation list with its own.
    pub(crate) fn derive_child(&self, scope: ChildScope) -> EvaluationContext {
        if scope.skip {
            EvaluationContext {
                uri_mappings: scope.uri_mappings,
                term_mappings: scope.term_mappings,
                language: scope.language,
                default_vocabulary: scope.default_vocabulary,
                xml_namespaces: scope.xml_namespaces,
                ..self.clone()
            }
        } else {
            EvaluationContext {
                base: self.base.clone(),
                parent_subject: scope
                    .new_subject
                    .clone()
                    .unwrap_or_else(|| self.parent_subject.clone()),
                parent_object: Some(
                    scope
                        .current_object_resource
                        .or(scope.new_subject)
                        .unwrap_or_else(|| self.parent_subject.clone()),
                ),
                uri_mappings: scope.uri_mappings,
                incomplete_triples: scope.incomplete_triples,
                language: scope.language,
                term_mappings: scope.term_mappings,
                default_vocabulary: scope.default_vocabulary,
                xml_namespaces: scope.xml_namespaces,
            }
        }
    }
}
