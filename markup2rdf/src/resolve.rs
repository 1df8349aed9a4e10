//! Token resolution: safe CURIE / term / CURIE / IRI, in that order.
//!
//! The precedence encoded here is load-bearing for interoperability:
//! a bracketed safe CURIE is never reinterpreted as an IRI, a term-mapping
//! hit wins over the default vocabulary, and a failed (non-bracketed) CURIE
//! falls through to relative-IRI resolution against the base.

use std::cell::RefCell;

use curie::Curie;
use indexmap::IndexMap;
use oxiri::Iri;
use oxrdf::{BlankNode, NamedNode, NamedOrBlankNode};

/// Mints blank nodes for one document parse.
///
/// Explicit `_:name` references map to one stable node per distinct name;
/// anonymous mints are fresh. All labels are factory-issued counters so a
/// parse is deterministic and explicit names can never collide with
/// generated ones.
#[derive(Default)]
pub(crate) struct BnodeFactory {
    named: IndexMap<String, BlankNode>,
    counter: u64,
}

impl BnodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> BlankNode {
        let label = format!("b{}", self.counter);
        self.counter += 1;
        BlankNode::new_unchecked(label)
    }

    pub fn named(&mut self, name: &str) -> BlankNode {
        if let Some(node) = self.named.get(name) {
            return node.clone();
        }
        let node = self.fresh();
        self.named.insert(name.to_string(), node.clone());
        node
    }
}

/// Whether the attribute being resolved permits bare terms.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermResolution {
    Allowed,
    Forbidden,
}

/// Token resolver over one element's in-scope mappings.
pub(crate) struct Resolver<'a> {
    pub base: &'a Iri<String>,
    pub uri_mappings: &'a curie::PrefixMapping,
    pub term_mappings: &'a IndexMap<String, NamedNode>,
    pub default_vocabulary: Option<&'a NamedNode>,
    pub bnodes: &'a RefCell<BnodeFactory>,
}

struct NotTerm;

enum CurieFailure {
    NotCurie,
    Unresolvable,
}

impl Resolver<'_> {
    /// Resolve a single token to an identifier, or `None` if it must be
    /// ignored.
    pub fn identifier(&self, token: &str, terms: TermResolution) -> Option<NamedOrBlankNode> {
        if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            // a safe CURIE resolves via prefix lookup or not at all
            return self.curie(inner).ok();
        }

        if terms == TermResolution::Allowed {
            match self.term(token) {
                // a term outcome is final, even when it is "ignore"
                Ok(resolved) => return resolved.map(NamedOrBlankNode::from),
                Err(NotTerm) => {}
            }
        }

        match self.curie(token) {
            Ok(resolved) => Some(resolved),
            Err(_) => self.relative_iri(token).map(NamedOrBlankNode::from),
        }
    }

    /// Resolve a whitespace-separated attribute value, dropping
    /// unresolvable tokens.
    pub fn many_identifiers(&self, value: &str, terms: TermResolution) -> Vec<NamedOrBlankNode> {
        value
            .split_ascii_whitespace()
            .filter_map(|token| self.identifier(token, terms))
            .collect()
    }

    /// Resolve an IRI-only attribute (`href`/`src`). An empty value is
    /// never treated as a relative reference.
    pub fn iri(&self, value: &str) -> Option<NamedNode> {
        if value.is_empty() {
            return None;
        }
        self.relative_iri(value)
    }

    fn term(&self, token: &str) -> Result<Option<NamedNode>, NotTerm> {
        // term ::= NCNameStartChar termChar*
        // termChar ::= (NameChar - ':') | '/'
        let is_term = !token.is_empty()
            && !token.starts_with('/')
            && token
                .split('/')
                .all(|segment| rxml_validation::validate_ncname(segment).is_ok());
        if !is_term {
            return Err(NotTerm);
        }

        // a term-mapping hit wins over the default vocabulary
        if let Some(iri) = self.term_mappings.get(token) {
            return Ok(Some(iri.clone()));
        }
        if let Some((_, iri)) = self
            .term_mappings
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(token))
        {
            return Ok(Some(iri.clone()));
        }

        if let Some(vocab) = self.default_vocabulary {
            let mut iri = vocab.as_str().to_string();
            iri.push_str(token);
            return Ok(NamedNode::new(iri).ok());
        }

        Ok(None)
    }

    fn curie(&self, token: &str) -> Result<NamedOrBlankNode, CurieFailure> {
        let Some((prefix, local)) = token.split_once(':') else {
            return Err(CurieFailure::NotCurie);
        };

        if prefix == "_" {
            if local.is_empty() {
                return Ok(self.bnodes.borrow_mut().fresh().into());
            }
            return Ok(self.bnodes.borrow_mut().named(local).into());
        }

        // prefixes are matched case-insensitively; the mapping table only
        // holds lower-cased keys
        let prefix = prefix.to_ascii_lowercase();
        let curie = Curie::new(Some(prefix.as_str()), local);
        match self.uri_mappings.expand_curie(&curie) {
            Ok(iri) => {
                // a prefix may map to a relative IRI; resolve in case
                match self.base.resolve(&iri) {
                    Ok(resolved) => Ok(NamedNode::new_unchecked(resolved.into_inner()).into()),
                    Err(_) => Err(CurieFailure::Unresolvable),
                }
            }
            Err(_) => Err(CurieFailure::Unresolvable),
        }
    }

    fn relative_iri(&self, value: &str) -> Option<NamedNode> {
        self.base
            .resolve(value)
            .ok()
            .map(|iri| NamedNode::new_unchecked(iri.into_inner()))
    }
}
