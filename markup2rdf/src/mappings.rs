//! Per-element mapping extraction and profile/context documents.
//!
//! An element may change the in-scope mappings four ways, applied in order
//! so that later declarations overwrite earlier ones for the same key:
//! externally-loaded `profile` references, `xmlns:*` declarations, the
//! `prefix` attribute, and the `vocab` attribute.

use std::rc::Rc;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use itertools::Itertools;
use oxrdf::{NamedNode, Term};

use crate::context::EvaluationContext;
use crate::report::ReportKind;
use crate::sink::Statements;
use crate::tree::MarkupNode;
use crate::vocab;

/// A frozen snapshot of the mappings declared by one profile document.
#[derive(Debug, Default, Clone)]
pub struct ProfileContext {
    pub prefixes: Vec<(String, String)>,
    pub terms: Vec<(String, NamedNode)>,
    pub vocabulary: Option<NamedNode>,
}

/// Failure to obtain one profile document. Never fatal to a traversal: the
/// reference is skipped and reported.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("profile load failed: {message}")]
pub struct ProfileError {
    pub message: String,
}

impl ProfileError {
    pub fn new(message: impl Into<String>) -> Self {
        ProfileError {
            message: message.into(),
        }
    }
}

/// Produces the statements of a profile document given its IRI.
///
/// Typically a nested use of this same extraction process over a fetched
/// document, but any pre-parsed source works.
pub trait ProfileLoader {
    fn load(&self, iri: &str) -> Result<Statements, ProfileError>;
}

/// Process-wide cache of extracted profile contexts, keyed by reference
/// IRI. Populated lazily, never evicted. Shareable across parses; a
/// concurrent duplicate load resolves by first-insert-wins.
#[derive(Default)]
pub struct ProfileCache {
    entries: Mutex<IndexMap<String, Arc<ProfileContext>>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, iri: &str) -> Option<Arc<ProfileContext>> {
        self.entries
            .lock()
            .expect("profile cache lock poisoned")
            .get(iri)
            .cloned()
    }

    fn store(&self, iri: &str, context: ProfileContext) -> Arc<ProfileContext> {
        let mut entries = self.entries.lock().expect("profile cache lock poisoned");
        entries
            .entry(iri.to_string())
            .or_insert_with(|| Arc::new(context))
            .clone()
    }
}

/// Cache plus loader, injected through [`crate::Options`].
pub struct ProfileResolver<'a> {
    pub cache: &'a ProfileCache,
    pub loader: &'a dyn ProfileLoader,
}

impl ProfileResolver<'_> {
    fn resolve(&self, iri: &str) -> Result<Arc<ProfileContext>, ProfileError> {
        if let Some(cached) = self.cache.lookup(iri) {
            return Ok(cached);
        }
        let statements = self.loader.load(iri)?;
        Ok(self.cache.store(iri, extract_profile_context(&statements)))
    }
}

/// Derive prefix/term/vocabulary mappings from a profile document's
/// statements.
///
/// Statements are grouped by subject; a subject contributes iff it carries
/// exactly one literal `rdfa:uri` value, at least one of `rdfa:term` /
/// `rdfa:prefix`, and no multiple values for any of these predicates. A
/// single literal `rdfa:vocabulary` on any subject sets the vocabulary;
/// subjects are visited in lexicographic order of subject identity and the
/// last declaration wins, keeping the outcome deterministic.
pub fn extract_profile_context(statements: &Statements) -> ProfileContext {
    #[derive(Default)]
    struct Slots {
        uri: Vec<Option<String>>,
        term: Vec<Option<String>>,
        prefix: Vec<Option<String>>,
        vocabulary: Vec<Option<String>>,
    }

    fn literal_value(term: &Term) -> Option<String> {
        match term {
            Term::Literal(literal) => Some(literal.value().to_string()),
            _ => None,
        }
    }

    fn single<'a>(values: &'a [Option<String>]) -> Option<&'a str> {
        match values {
            [Some(value)] => Some(value.as_str()),
            _ => None,
        }
    }

    let mut subjects: IndexMap<String, Slots> = IndexMap::new();
    for triple in statements {
        let predicate = triple.predicate.as_ref();
        let relevant = [
            vocab::rdfa::URI,
            vocab::rdfa::TERM,
            vocab::rdfa::PREFIX,
            vocab::rdfa::VOCABULARY,
        ];
        if !relevant.contains(&predicate) {
            continue;
        }

        let value = literal_value(&triple.object);
        let slots = subjects.entry(triple.subject.to_string()).or_default();
        if predicate == vocab::rdfa::URI {
            slots.uri.push(value);
        } else if predicate == vocab::rdfa::TERM {
            slots.term.push(value);
        } else if predicate == vocab::rdfa::PREFIX {
            slots.prefix.push(value);
        } else {
            slots.vocabulary.push(value);
        }
    }

    subjects.sort_keys();

    let mut profile = ProfileContext::default();
    for slots in subjects.values() {
        if let Some(vocabulary) = single(&slots.vocabulary) {
            if let Ok(node) = NamedNode::new(vocabulary.to_string()) {
                profile.vocabulary = Some(node);
            }
        }

        let conflicted =
            slots.uri.len() > 1 || slots.term.len() > 1 || slots.prefix.len() > 1;
        if conflicted {
            continue;
        }
        let Some(uri) = single(&slots.uri) else {
            continue;
        };
        let Ok(uri_node) = NamedNode::new(uri.to_string()) else {
            continue;
        };

        if let Some(prefix) = single(&slots.prefix) {
            if prefix != "_" {
                profile
                    .prefixes
                    .push((prefix.to_ascii_lowercase(), uri.to_string()));
            }
        }
        if let Some(term) = single(&slots.term) {
            profile.terms.push((term.to_string(), uri_node));
        }
    }

    profile
}

/// The mappings in force for one element's subtree.
pub(crate) struct Augmented {
    pub uri_mappings: Rc<curie::PrefixMapping>,
    pub term_mappings: Rc<IndexMap<String, NamedNode>>,
    pub default_vocabulary: Option<NamedNode>,
    pub xml_namespaces: Rc<IndexMap<String, String>>,
}

/// Scan one element for mapping changes and produce the augmented (never
/// replaced) mappings for its subtree. The inherited maps are cloned only
/// when something is actually added, so untouched subtrees share storage.
pub(crate) fn augment<N: MarkupNode>(
    element: &N,
    ctx: &EvaluationContext,
    profiles: Option<&ProfileResolver<'_>>,
    host_default_vocabulary: Option<NamedNode>,
    report: &dyn Fn(ReportKind, String),
) -> Augmented {
    let mut prefix_additions: Vec<(String, String)> = Vec::new();
    let mut term_additions: Vec<(String, NamedNode)> = Vec::new();
    let mut vocabulary_override: Option<Option<NamedNode>> = None;
    let mut namespace_additions: Vec<(String, String)> = Vec::new();

    // 1. external profile references
    if let Some(references) = element.attr("profile") {
        for reference in references.split_ascii_whitespace() {
            if reference == ctx.base.as_str() {
                // self-reference guard: a document may not profile itself
                continue;
            }
            let Some(resolver) = profiles else {
                report(
                    ReportKind::ProfileSkipped,
                    format!("profile reference <{reference}> skipped: no loader configured"),
                );
                continue;
            };
            match resolver.resolve(reference) {
                Ok(profile) => {
                    prefix_additions.extend(profile.prefixes.iter().cloned());
                    term_additions.extend(profile.terms.iter().cloned());
                    if let Some(vocabulary) = &profile.vocabulary {
                        vocabulary_override = Some(Some(vocabulary.clone()));
                    }
                }
                Err(err) => {
                    report(
                        ReportKind::ProfileLoadFailure,
                        format!("profile reference <{reference}> skipped: {err}"),
                    );
                }
            }
        }
    }

    // 2. namespace declarations, overriding profile-provided entries
    for (prefix, iri) in element.namespace_declarations() {
        prefix_additions.push((prefix.to_ascii_lowercase(), iri.clone()));
        namespace_additions.push((prefix, iri));
    }

    // 3. @prefix pairs: `NCName':' URI`
    if let Some(pairs) = element.attr("prefix") {
        for (prefix, iri) in pairs.split_ascii_whitespace().tuples() {
            match prefix.strip_suffix(':') {
                Some(name) if rxml_validation::validate_ncname(name).is_ok() => {
                    prefix_additions.push((name.to_ascii_lowercase(), iri.to_string()));
                }
                _ => {
                    report(
                        ReportKind::InvalidPrefixDeclaration,
                        format!("@prefix token `{prefix}` must be `NCName:`; pair skipped"),
                    );
                }
            }
        }
    }

    // 4. @vocab
    if let Some(vocabulary) = element.attr("vocab") {
        if vocabulary.is_empty() {
            vocabulary_override = Some(host_default_vocabulary);
        } else if let Ok(resolved) = ctx.base.resolve(vocabulary) {
            vocabulary_override = Some(Some(NamedNode::new_unchecked(resolved.into_inner())));
        }
    }

    let uri_mappings = if prefix_additions.is_empty() {
        ctx.uri_mappings.clone()
    } else {
        let mut mappings = (*ctx.uri_mappings).clone();
        for (prefix, iri) in &prefix_additions {
            if mappings.add_prefix(prefix, iri).is_err() {
                report(
                    ReportKind::InvalidPrefixDeclaration,
                    format!("prefix `{prefix}` is reserved and cannot be redeclared"),
                );
            }
        }
        Rc::new(mappings)
    };

    let term_mappings = if term_additions.is_empty() {
        ctx.term_mappings.clone()
    } else {
        let mut terms = (*ctx.term_mappings).clone();
        for (term, iri) in term_additions {
            terms.insert(term, iri);
        }
        Rc::new(terms)
    };

    let xml_namespaces = if namespace_additions.is_empty() {
        ctx.xml_namespaces.clone()
    } else {
        let mut namespaces = (*ctx.xml_namespaces).clone();
        for (prefix, iri) in namespace_additions {
            namespaces.insert(prefix, iri);
        }
        Rc::new(namespaces)
    };

    Augmented {
        uri_mappings,
        term_mappings,
        default_vocabulary: vocabulary_override
            .unwrap_or_else(|| ctx.default_vocabulary.clone()),
        xml_namespaces,
    }
}

#[cfg(test)]
mod tests {
    use oxiri::Iri;
    use oxrdf::{Literal, Triple};

    use super::*;
    use crate::sink::TripleSink;
    use crate::tree::SimpleElement;

    fn ctx() -> EvaluationContext {
        EvaluationContext::initial(Iri::parse("http://example.org/doc".to_string()).unwrap())
    }

    fn no_report(_: ReportKind, _: String) {
        panic!("unexpected report");
    }

    fn profile_statement(subject: &str, predicate: oxrdf::NamedNodeRef, value: &str) -> Triple {
        Triple::new(
            NamedNode::new_unchecked(subject),
            predicate.into_owned(),
            Literal::new_simple_literal(value),
        )
    }

    #[test]
    fn prefix_attribute_registers_lower_cased_pairs() {
        let element = SimpleElement::new("div")
            .attr("prefix", "DC: http://purl.org/dc/elements/1.1/ ex: http://example.org/ns#")
            .build();

        let augmented = augment(&element, &ctx(), None, None, &no_report);
        let expanded = augmented
            .uri_mappings
            .expand_curie(&curie::Curie::new(Some("dc"), "title"))
            .unwrap();
        assert_eq!(expanded, "http://purl.org/dc/elements/1.1/title");
    }

    #[test]
    fn malformed_prefix_pair_is_skipped_with_report() {
        let element = SimpleElement::new("div")
            .attr("prefix", "dc http://purl.org/dc/elements/1.1/")
            .build();

        let reports = std::cell::RefCell::new(Vec::new());
        let report = |kind: ReportKind, message: String| {
            reports.borrow_mut().push((kind, message));
        };
        let augmented = augment(&element, &ctx(), None, None, &report);

        assert!(
            augmented
                .uri_mappings
                .expand_curie(&curie::Curie::new(Some("dc"), "title"))
                // initial context still maps dc
                .is_ok_and(|iri| iri.starts_with("http://purl.org/dc/terms/"))
        );
        assert_eq!(reports.borrow().len(), 1);
        assert_eq!(reports.borrow()[0].0, ReportKind::InvalidPrefixDeclaration);
    }

    #[test]
    fn prefix_name_that_is_not_an_ncname_is_skipped_with_report() {
        let element = SimpleElement::new("div")
            .attr(
                "prefix",
                "1x: http://example.org/one# ex: http://example.org/ns#",
            )
            .build();

        let reports = std::cell::RefCell::new(Vec::new());
        let report = |kind: ReportKind, message: String| {
            reports.borrow_mut().push((kind, message));
        };
        let augmented = augment(&element, &ctx(), None, None, &report);

        assert!(
            augmented
                .uri_mappings
                .expand_curie(&curie::Curie::new(Some("1x"), "a"))
                .is_err()
        );
        // the conforming pair in the same attribute still registers
        assert_eq!(
            augmented
                .uri_mappings
                .expand_curie(&curie::Curie::new(Some("ex"), "a"))
                .unwrap(),
            "http://example.org/ns#a"
        );
        assert_eq!(reports.borrow().len(), 1);
        assert_eq!(reports.borrow()[0].0, ReportKind::InvalidPrefixDeclaration);
    }

    #[test]
    fn xmlns_declaration_overrides_inherited_mapping() {
        let element = SimpleElement::new("div")
            .attr("xmlns:dc", "http://purl.org/dc/elements/1.1/")
            .build();

        let augmented = augment(&element, &ctx(), None, None, &no_report);
        let expanded = augmented
            .uri_mappings
            .expand_curie(&curie::Curie::new(Some("dc"), "title"))
            .unwrap();
        assert_eq!(expanded, "http://purl.org/dc/elements/1.1/title");
        assert_eq!(
            augmented.xml_namespaces.get("dc").map(String::as_str),
            Some("http://purl.org/dc/elements/1.1/")
        );
    }

    #[test]
    fn vocab_attribute_sets_and_resets_default_vocabulary() {
        let with_vocab = SimpleElement::new("div")
            .attr("vocab", "http://schema.org/")
            .build();
        let augmented = augment(&with_vocab, &ctx(), None, None, &no_report);
        assert_eq!(
            augmented.default_vocabulary.as_ref().map(|v| v.as_str()),
            Some("http://schema.org/")
        );

        let mut inherited = ctx();
        inherited.default_vocabulary = Some(NamedNode::new_unchecked("http://schema.org/"));
        let reset = SimpleElement::new("div").attr("vocab", "").build();
        let augmented = augment(&reset, &inherited, None, None, &no_report);
        assert_eq!(augmented.default_vocabulary, None);
    }

    #[test]
    fn untouched_element_shares_inherited_mappings() {
        let element = SimpleElement::new("div").build();
        let context = ctx();
        let augmented = augment(&element, &context, None, None, &no_report);
        assert!(Rc::ptr_eq(&augmented.uri_mappings, &context.uri_mappings));
        assert!(Rc::ptr_eq(&augmented.term_mappings, &context.term_mappings));
    }

    #[test]
    fn context_extraction_registers_prefixes_and_terms() {
        let mut statements = Statements::new();
        statements.emit(profile_statement(
            "http://p.example/#1",
            vocab::rdfa::URI,
            "http://example.org/vocab/",
        ));
        statements.emit(profile_statement("http://p.example/#1", vocab::rdfa::PREFIX, "EXV"));
        statements.emit(profile_statement(
            "http://p.example/#2",
            vocab::rdfa::URI,
            "http://example.org/vocab/name",
        ));
        statements.emit(profile_statement("http://p.example/#2", vocab::rdfa::TERM, "name"));

        let profile = extract_profile_context(&statements);
        assert_eq!(
            profile.prefixes,
            vec![("exv".to_string(), "http://example.org/vocab/".to_string())]
        );
        assert_eq!(profile.terms.len(), 1);
        assert_eq!(profile.terms[0].0, "name");
        assert_eq!(profile.terms[0].1.as_str(), "http://example.org/vocab/name");
    }

    #[test]
    fn context_extraction_skips_conflicting_subjects() {
        let mut statements = Statements::new();
        statements.emit(profile_statement(
            "http://p.example/#1",
            vocab::rdfa::URI,
            "http://example.org/a/",
        ));
        statements.emit(profile_statement(
            "http://p.example/#1",
            vocab::rdfa::URI,
            "http://example.org/b/",
        ));
        statements.emit(profile_statement("http://p.example/#1", vocab::rdfa::PREFIX, "ex"));

        let profile = extract_profile_context(&statements);
        assert!(profile.prefixes.is_empty());
    }

    #[test]
    fn context_extraction_skips_underscore_prefix() {
        let mut statements = Statements::new();
        statements.emit(profile_statement(
            "http://p.example/#1",
            vocab::rdfa::URI,
            "http://example.org/a/",
        ));
        statements.emit(profile_statement("http://p.example/#1", vocab::rdfa::PREFIX, "_"));

        let profile = extract_profile_context(&statements);
        assert!(profile.prefixes.is_empty());
    }

    #[test]
    fn vocabulary_conflicts_resolve_by_subject_order_last_wins() {
        let mut statements = Statements::new();
        statements.emit(profile_statement(
            "http://p.example/#b",
            vocab::rdfa::VOCABULARY,
            "http://vocab.example/b/",
        ));
        statements.emit(profile_statement(
            "http://p.example/#a",
            vocab::rdfa::VOCABULARY,
            "http://vocab.example/a/",
        ));

        let profile = extract_profile_context(&statements);
        // lexicographic subject order: #a then #b, last wins
        assert_eq!(
            profile.vocabulary.as_ref().map(|v| v.as_str()),
            Some("http://vocab.example/b/")
        );
    }

    struct FixedLoader {
        statements: Statements,
        calls: std::cell::Cell<usize>,
    }

    impl ProfileLoader for FixedLoader {
        fn load(&self, _iri: &str) -> Result<Statements, ProfileError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.statements.clone())
        }
    }

    #[test]
    fn profile_cache_loads_each_reference_once() {
        let mut statements = Statements::new();
        statements.emit(profile_statement(
            "http://p.example/#1",
            vocab::rdfa::URI,
            "http://example.org/vocab/",
        ));
        statements.emit(profile_statement("http://p.example/#1", vocab::rdfa::PREFIX, "exv"));

        let loader = FixedLoader {
            statements,
            calls: std::cell::Cell::new(0),
        };
        let cache = ProfileCache::new();
        let resolver = ProfileResolver {
            cache: &cache,
            loader: &loader,
        };

        let first = resolver.resolve("http://p.example/profile").unwrap();
        let second = resolver.resolve("http://p.example/profile").unwrap();
        assert_eq!(loader.calls.get(), 1);
        assert_eq!(first.prefixes, second.prefixes);
    }

    #[test]
    fn self_referencing_profile_is_ignored() {
        let element = SimpleElement::new("div")
            .attr("profile", "http://example.org/doc")
            .build();

        // would panic via no_report if the self-reference were followed,
        // since no loader is configured
        let augmented = augment(&element, &ctx(), None, None, &no_report);
        assert!(augmented.default_vocabulary.is_none());
    }
}
