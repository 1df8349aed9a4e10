//! The recursive extraction state machine.
//!
//! Visits the element tree depth-first with an [`EvaluationContext`]; at
//! each element it refreshes mappings, resolves the subject-establishing
//! attributes, emits type/relation/literal triples, completes pending
//! relations inherited from ancestors, and derives the context its
//! children receive.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use icu::locale::LanguageIdentifier;
use oxiri::Iri;
use oxrdf::vocab::rdf;
use oxrdf::{NamedNode, NamedOrBlankNode, Triple};
use vec1::{Size0Error, Vec1};

use crate::context::{ChildScope, Direction, EvaluationContext, PendingRelation};
use crate::mappings::{self, ProfileResolver};
use crate::report::{Report, ReportKind, Severity};
use crate::resolve::{BnodeFactory, Resolver, TermResolution};
use crate::sink::TripleSink;
use crate::tree::MarkupNode;
use crate::{literal, Error, Options};

/// Host-language hooks the traversal consults.
pub trait HostLanguage {
    /// Whether this element takes the document base as its implicit
    /// subject when no attribute establishes one.
    fn implicit_subject(&self, name: &str, is_root: bool) -> bool;

    /// Vocabulary restored by an empty `vocab` attribute.
    fn default_vocabulary(&self) -> Option<NamedNode> {
        None
    }
}

/// HTML host rules: the root and the `head`/`body` containers are
/// implicit-subject elements.
pub struct HtmlHost;

impl HostLanguage for HtmlHost {
    fn implicit_subject(&self, name: &str, is_root: bool) -> bool {
        is_root || matches!(name, "head" | "body")
    }
}

/// Host rules for generic trees: only the document root is an
/// implicit-subject element.
pub struct GenericHost;

impl HostLanguage for GenericHost {
    fn implicit_subject(&self, _name: &str, is_root: bool) -> bool {
        is_root
    }
}

/// An attribute that is absent, present-but-unresolvable, or resolved.
pub(crate) enum Attr<T> {
    Missing,
    Empty,
    Value(T),
}

impl<T> Attr<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Attr::Missing => Attr::Missing,
            Attr::Empty => Attr::Empty,
            Attr::Value(v) => Attr::Value(f(v)),
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Attr::Missing)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Attr::Value(v) => Some(v),
            Attr::Missing | Attr::Empty => None,
        }
    }
}

fn attr1<N: MarkupNode>(
    element: &N,
    name: &str,
    proj: impl Fn(&str) -> Option<NamedOrBlankNode>,
) -> Attr<NamedOrBlankNode> {
    match element.attr(name) {
        None => Attr::Missing,
        Some(v) => match proj(v) {
            None => Attr::Empty,
            Some(v) => Attr::Value(v),
        },
    }
}

fn attr_iri<N: MarkupNode>(
    element: &N,
    name: &str,
    proj: impl Fn(&str) -> Option<NamedNode>,
) -> Attr<NamedNode> {
    match element.attr(name) {
        None => Attr::Missing,
        Some(v) => match proj(v) {
            None => Attr::Empty,
            Some(v) => Attr::Value(v),
        },
    }
}

fn attr_many<N: MarkupNode>(
    element: &N,
    name: &str,
    proj: impl Fn(&str) -> Vec<NamedOrBlankNode>,
) -> Attr<Vec1<NamedOrBlankNode>> {
    match element.attr(name) {
        None => Attr::Missing,
        Some(v) => match Vec1::try_from_vec(proj(v)) {
            Err(Size0Error) => Attr::Empty,
            Ok(v) => Attr::Value(v),
        },
    }
}

fn subject_of(node: &NamedOrBlankNode) -> oxrdf::Subject {
    match node {
        NamedOrBlankNode::NamedNode(n) => n.clone().into(),
        NamedOrBlankNode::BlankNode(b) => b.clone().into(),
    }
}

fn term_of(node: &NamedOrBlankNode) -> oxrdf::Term {
    match node {
        NamedOrBlankNode::NamedNode(n) => n.clone().into(),
        NamedOrBlankNode::BlankNode(b) => b.clone().into(),
    }
}

pub(crate) struct Extractor<'a, S: TripleSink> {
    sink: RefCell<&'a mut S>,
    reports: RefCell<Vec<Report>>,
    bnodes: RefCell<BnodeFactory>,
    strict: bool,
    profiles: Option<&'a ProfileResolver<'a>>,
    trace: Option<&'a dyn Fn(&str)>,
    path: RefCell<Vec<String>>,
}

impl<'a, S: TripleSink> Extractor<'a, S> {
    pub fn new(options: &'a Options<'a>, sink: &'a mut S) -> Self {
        Extractor {
            sink: RefCell::new(sink),
            reports: RefCell::new(Vec::new()),
            bnodes: RefCell::new(BnodeFactory::new()),
            strict: options.strict,
            profiles: options.profiles.as_ref(),
            trace: options.trace,
            path: RefCell::new(Vec::new()),
        }
    }

    pub fn run<N: MarkupNode>(
        self,
        root: &N,
        base: Iri<String>,
        host: &dyn HostLanguage,
    ) -> Result<Vec<Report>, Error> {
        let context = EvaluationContext::initial(base);
        self.process_element(&context, root, host, true)?;
        Ok(self.reports.into_inner())
    }

    fn trace(&self, message: impl FnOnce() -> String) {
        if let Some(trace) = self.trace {
            trace(&message());
        }
    }

    fn emit(&self, triple: Triple) {
        self.sink.borrow_mut().emit(triple);
    }

    fn report(&self, severity: Severity, kind: ReportKind, message: String) {
        self.reports.borrow_mut().push(Report {
            severity,
            kind,
            message,
            path: self.path.borrow().clone(),
        });
    }

    /// Filter resolved predicate-position values down to IRIs. A blank
    /// node here is a malformed statement: fatal in strict mode, reported
    /// and dropped otherwise.
    fn predicates(
        &self,
        attr: &str,
        values: Vec<NamedOrBlankNode>,
    ) -> Result<Vec<NamedNode>, Error> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            match value {
                NamedOrBlankNode::NamedNode(iri) => out.push(iri),
                NamedOrBlankNode::BlankNode(node) => {
                    let cause = format!("@{attr} cannot use a blank node ({node}) as a predicate");
                    self.report(Severity::Error, ReportKind::MalformedStatement, cause.clone());
                    if self.strict {
                        return Err(Error::MalformedStatement {
                            path: self.path.borrow().clone(),
                            cause,
                        });
                    }
                }
            }
        }
        Ok(out)
    }

    fn process_element<N: MarkupNode>(
        &self,
        eval: &EvaluationContext,
        element: &N,
        host: &dyn HostLanguage,
        is_root: bool,
    ) -> Result<(), Error> {
        self.path.borrow_mut().push(element.name().to_string());
        let result = self.element_steps(eval, element, host, is_root);
        self.path.borrow_mut().pop();
        result
    }

    fn element_steps<N: MarkupNode>(
        &self,
        eval: &EvaluationContext,
        element: &N,
        host: &dyn HostLanguage,
        is_root: bool,
    ) -> Result<(), Error> {
        self.trace(|| format!("visiting <{}>", self.path.borrow().join(">")));

        // 1. refresh mappings and vocabulary for this subtree
        let report_mapping = |kind: ReportKind, message: String| {
            self.report(Severity::Warning, kind, message);
        };
        let augmented = mappings::augment(
            element,
            eval,
            self.profiles,
            host.default_vocabulary(),
            &report_mapping,
        );

        // 2. language, XML-namespaced attribute winning
        let mut language = eval.language.clone();
        if let Some(lang) = element.attr("xml:lang").or_else(|| element.attr("lang")) {
            if lang.is_empty() {
                language = None;
            } else {
                match LanguageIdentifier::from_str(lang) {
                    Ok(parsed) => language = Some(Rc::new(parsed)),
                    Err(err) => self.report(
                        Severity::Warning,
                        ReportKind::InvalidLanguage,
                        format!("invalid language tag `{lang}`: {err}"),
                    ),
                }
            }
        }

        let resolver = Resolver {
            base: &eval.base,
            uri_mappings: &*augmented.uri_mappings,
            term_mappings: &*augmented.term_mappings,
            default_vocabulary: augmented.default_vocabulary.as_ref(),
            bnodes: &self.bnodes,
        };

        // 3. resolve the attribute values
        let about = attr1(element, "about", |v| {
            resolver.identifier(v, TermResolution::Forbidden)
        })
        .map(Rc::new);
        let resource = attr1(element, "resource", |v| {
            resolver.identifier(v, TermResolution::Forbidden)
        })
        .map(Rc::new);
        let href = attr_iri(element, "href", |v| resolver.iri(v));
        let src = attr_iri(element, "src", |v| resolver.iri(v));

        let type_of = attr_many(element, "typeof", |v| {
            resolver.many_identifiers(v, TermResolution::Allowed)
        });

        let rel_present = element.attr("rel").is_some() || element.attr("rev").is_some();
        let rel_predicates = match element.attr("rel") {
            None => Vec::new(),
            Some(v) => {
                self.predicates("rel", resolver.many_identifiers(v, TermResolution::Allowed))?
            }
        };
        let rev_predicates = match element.attr("rev") {
            None => Vec::new(),
            Some(v) => {
                self.predicates("rev", resolver.many_identifiers(v, TermResolution::Allowed))?
            }
        };

        let property_present = element.attr("property").is_some();
        let properties = match element.attr("property") {
            None => Vec::new(),
            Some(v) => self.predicates(
                "property",
                resolver.many_identifiers(v, TermResolution::Allowed),
            )?,
        };

        let content = element.attr("content");
        let datatype: Attr<NamedNode> = match element.attr("datatype") {
            None => Attr::Missing,
            Some("") => Attr::Empty,
            Some(v) => match resolver.identifier(v, TermResolution::Allowed) {
                Some(NamedOrBlankNode::NamedNode(iri)) => Attr::Value(iri),
                Some(NamedOrBlankNode::BlankNode(node)) => {
                    let cause =
                        format!("@datatype cannot use a blank node ({node}) as a datatype");
                    self.report(Severity::Error, ReportKind::MalformedStatement, cause.clone());
                    if self.strict {
                        return Err(Error::MalformedStatement {
                            path: self.path.borrow().clone(),
                            cause,
                        });
                    }
                    Attr::Missing
                }
                // unresolvable values behave as if the attribute is absent
                None => Attr::Missing,
            },
        };

        let wrap = |n: NamedNode| Rc::new(NamedOrBlankNode::from(n));

        // 4. establish new subject (and object resource, with @rel/@rev)
        let mut skip = false;
        let mut new_subject: Option<Rc<NamedOrBlankNode>>;
        let mut current_object_resource: Option<Rc<NamedOrBlankNode>> = None;

        if !rel_present {
            new_subject = about
                .value()
                .cloned()
                .or_else(|| src.value().cloned().map(wrap))
                .or_else(|| resource.value().cloned())
                .or_else(|| href.value().cloned().map(wrap));

            if new_subject.is_none() {
                if host.implicit_subject(element.name(), is_root) {
                    self.trace(|| "using base as implicit subject".to_string());
                    new_subject = Some(wrap(NamedNode::new_unchecked(
                        eval.base.as_str().to_string(),
                    )));
                } else if type_of.is_present() {
                    let minted = self.bnodes.borrow_mut().fresh();
                    self.trace(|| format!("minted {minted} as typed subject"));
                    new_subject = Some(Rc::new(minted.into()));
                } else {
                    new_subject = eval.parent_object.clone();
                    if !property_present {
                        self.trace(|| "no relevant attributes, skipping element".to_string());
                        skip = true;
                    }
                }
            }
        } else {
            new_subject = about
                .value()
                .cloned()
                .or_else(|| src.value().cloned().map(wrap));

            if new_subject.is_none() {
                if host.implicit_subject(element.name(), is_root) {
                    new_subject = Some(wrap(NamedNode::new_unchecked(
                        eval.base.as_str().to_string(),
                    )));
                } else if type_of.is_present() {
                    new_subject = Some(Rc::new(self.bnodes.borrow_mut().fresh().into()));
                } else {
                    new_subject = eval.parent_object.clone();
                }
            }

            current_object_resource = resource
                .value()
                .cloned()
                .or_else(|| href.value().cloned().map(wrap));
        }

        // 5. type triples
        if let (Some(subject), Attr::Value(types)) = (&new_subject, &type_of) {
            for type_value in types.iter() {
                self.emit(Triple::new(
                    subject_of(subject),
                    rdf::TYPE.into_owned(),
                    term_of(type_value),
                ));
            }
        }

        // 6. relation triples, or pending relations awaiting a descendant
        //    subject
        let mut pending: Vec<PendingRelation> = Vec::new();
        if rel_present {
            if let Some(object) = current_object_resource.clone() {
                if let Some(subject) = &new_subject {
                    for predicate in &rel_predicates {
                        self.emit(Triple::new(
                            subject_of(subject),
                            predicate.clone(),
                            term_of(&object),
                        ));
                    }
                    for predicate in &rev_predicates {
                        self.emit(Triple::new(
                            subject_of(&object),
                            predicate.clone(),
                            term_of(subject),
                        ));
                    }
                }
            } else {
                let minted = self.bnodes.borrow_mut().fresh();
                self.trace(|| {
                    format!("no object resource, deferring relations under {minted}")
                });
                current_object_resource = Some(Rc::new(minted.into()));
                pending.extend(rel_predicates.iter().cloned().map(|predicate| {
                    PendingRelation {
                        predicate,
                        direction: Direction::Forward,
                    }
                }));
                pending.extend(rev_predicates.iter().cloned().map(|predicate| {
                    PendingRelation {
                        predicate,
                        direction: Direction::Reverse,
                    }
                }));
            }
        }

        // 7. literal triples: one shared literal for every property token
        let mut subtree_consumed = false;
        if !properties.is_empty() {
            let namespaces: Vec<(String, String)> = augmented
                .xml_namespaces
                .iter()
                .map(|(prefix, iri)| (prefix.clone(), iri.clone()))
                .collect();
            let classified = literal::classify(
                element,
                &datatype,
                content,
                language.as_deref(),
                &namespaces,
            );
            subtree_consumed = classified.subtree_consumed;

            if let Some(subject) = &new_subject {
                for predicate in &properties {
                    self.emit(Triple::new(
                        subject_of(subject),
                        predicate.clone(),
                        classified.literal.clone(),
                    ));
                }
            }
        }

        // 8. complete relations deferred by an ancestor; consumed here,
        //    never propagated further down
        if !skip {
            if let Some(subject) = &new_subject {
                for pending in &eval.incomplete_triples {
                    match pending.direction {
                        Direction::Forward => self.emit(Triple::new(
                            subject_of(&eval.parent_subject),
                            pending.predicate.clone(),
                            term_of(subject),
                        )),
                        Direction::Reverse => self.emit(Triple::new(
                            subject_of(subject),
                            pending.predicate.clone(),
                            term_of(&eval.parent_subject),
                        )),
                    }
                }
            }
        }

        // 9. recurse, unless the subtree was consumed as a literal value
        if subtree_consumed {
            return Ok(());
        }

        let child_context = eval.derive_child(ChildScope {
            skip,
            new_subject,
            current_object_resource,
            incomplete_triples: pending,
            uri_mappings: augmented.uri_mappings,
            term_mappings: augmented.term_mappings,
            language,
            default_vocabulary: augmented.default_vocabulary,
            xml_namespaces: augmented.xml_namespaces,
        });

        for child in element.element_children() {
            self.process_element(&child_context, &child, host, false)?;
        }

        Ok(())
    }
}
