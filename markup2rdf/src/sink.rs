//! Triple sink.
//!
//! The extractor emits into a [`TripleSink`]; the stock implementation is
//! [`Statements`], an ordered collection. Nothing is deduplicated: duplicate
//! statements are legal and iteration order is emission order (document
//! order of extraction).

use oxrdf::Triple;

/// Receiver for extracted statements.
pub trait TripleSink {
    fn emit(&mut self, triple: Triple);
}

/// An ordered, duplicate-preserving statement collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statements {
    triples: Vec<Triple>,
}

impl Statements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }

    pub fn as_slice(&self) -> &[Triple] {
        &self.triples
    }

    pub fn into_vec(self) -> Vec<Triple> {
        self.triples
    }
}

impl TripleSink for Statements {
    fn emit(&mut self, triple: Triple) {
        self.triples.push(triple);
    }
}

impl IntoIterator for Statements {
    type Item = Triple;
    type IntoIter = std::vec::IntoIter<Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Statements {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;

    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for Statements {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Statements {
            triples: iter.into_iter().collect(),
        }
    }
}
