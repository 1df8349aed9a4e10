//! Extract RDF statements from attribute-annotated markup.
//!
//! Works over any element tree exposing the [`tree::MarkupNode`] capability
//! surface; adapters for [`scraper`] HTML documents and a small owned tree
//! ([`tree::SimpleNode`]) are included. The annotation attributes understood
//! are `about`, `rel`, `rev`, `property`, `typeof`, `resource`, `href`,
//! `src`, `content`, `datatype`, `vocab`, `prefix`, `profile` and `xmlns:*`.
//!
//! Extraction is deterministic: statements come out in document order,
//! duplicates preserved, and generated blank node labels are stable across
//! runs over the same input.
//!
//! ```
//! use markup2rdf::tree::SimpleElement;
//! use markup2rdf::{extract, Options};
//!
//! let doc = SimpleElement::new("doc")
//!     .attr("prefix", "dc: http://purl.org/dc/elements/1.1/")
//!     .child(
//!         SimpleElement::new("item")
//!             .attr("about", "urn:example:book")
//!             .attr("property", "dc:title")
//!             .text("Thud"),
//!     )
//!     .build();
//!
//! let extraction = extract(Some(&doc), "http://example.org/", &Options::default())?;
//! assert_eq!(extraction.statements.len(), 1);
//! # Ok::<(), markup2rdf::Error>(())
//! ```

use indexmap::IndexMap;
use oxiri::Iri;

mod context;
mod error;
mod literal;
pub mod mappings;
mod report;
mod resolve;
pub mod sink;
pub mod tree;
pub mod vocab;
mod walk;

pub use error::Error;
pub use mappings::{
    extract_profile_context, ProfileCache, ProfileContext, ProfileError, ProfileLoader,
    ProfileResolver,
};
pub use report::{Report, ReportKind, Severity};
pub use sink::{Statements, TripleSink};
pub use walk::{GenericHost, HostLanguage, HtmlHost};

use tree::MarkupNode;
use walk::Extractor;

/// Extraction options. The default is lax processing with no profile
/// loader and no tracing.
#[derive(Default)]
pub struct Options<'a> {
    /// Abort on malformed statements instead of reporting and dropping
    /// them, and on a missing root element.
    pub strict: bool,
    /// Loader and cache for `profile` references. Without one, profile
    /// references are reported and skipped.
    pub profiles: Option<ProfileResolver<'a>>,
    /// Receives a line per traversal decision, for debugging.
    pub trace: Option<&'a dyn Fn(&str)>,
}

/// The outcome of a successful extraction.
#[derive(Debug, Default)]
pub struct Extraction {
    pub statements: Statements,
    pub reports: Vec<Report>,
}

/// Extract statements from an element tree rooted at `root`.
///
/// `base` is the absolute IRI relative references resolve against; any
/// fragment is discarded. `root` is an `Option` so callers holding a
/// possibly-empty document can pass its root lookup straight through: a
/// missing root is an error in strict mode and an empty result otherwise.
pub fn extract<N: MarkupNode>(
    root: Option<&N>,
    base: &str,
    options: &Options<'_>,
) -> Result<Extraction, Error> {
    extract_with_host(root, base, options, &GenericHost)
}

/// [`extract`] with explicit host-language rules.
pub fn extract_with_host<N: MarkupNode>(
    root: Option<&N>,
    base: &str,
    options: &Options<'_>,
    host: &dyn HostLanguage,
) -> Result<Extraction, Error> {
    let mut statements = Statements::new();
    let reports = extract_into(root, base, options, host, &mut statements)?;
    Ok(Extraction {
        statements,
        reports,
    })
}

/// Extract into a caller-supplied sink, returning the reports.
pub fn extract_into<N: MarkupNode, S: TripleSink>(
    root: Option<&N>,
    base: &str,
    options: &Options<'_>,
    host: &dyn HostLanguage,
    sink: &mut S,
) -> Result<Vec<Report>, Error> {
    let base = Iri::parse(base.to_string()).map_err(|source| Error::iri(source, base))?;
    let Some(root) = root else {
        if options.strict {
            return Err(Error::MissingRoot);
        }
        return Ok(Vec::new());
    };
    Extractor::new(options, sink).run(root, base, host)
}

/// Parse an HTML document and extract its statements.
///
/// `location` is the document's retrieval IRI; an `<html><head><base href>`
/// declaration overrides it as the base. A base declaration that does not
/// parse as an IRI is fatal in strict mode; lax mode reports it and keeps
/// `location`. HTML host rules apply: the root, `head` and `body` elements
/// take the base as their implicit subject.
pub fn extract_html(
    document: &str,
    location: &str,
    options: &Options<'_>,
) -> Result<Extraction, Error> {
    let html = scraper::Html::parse_document(document);
    let location =
        Iri::parse(location.to_string()).map_err(|source| Error::iri(source, location))?;

    let mut reports = Vec::new();
    let base = match tree::html_document_base(&html, location.clone()) {
        Ok(base) => base,
        Err(err) if options.strict => return Err(err),
        Err(err) => {
            reports.push(Report {
                severity: Severity::Warning,
                kind: ReportKind::InvalidBaseDeclaration,
                message: format!("ignoring base declaration: {err}"),
                path: vec!["html".to_string(), "head".to_string(), "base".to_string()],
            });
            location
        }
    };

    let mut statements = Statements::new();
    let mut run_reports = Extractor::new(options, &mut statements).run(
        &html.root_element(),
        base,
        &HtmlHost,
    )?;
    reports.append(&mut run_reports);
    Ok(Extraction {
        statements,
        reports,
    })
}

/// The prefix mappings every extraction starts from.
///
/// The W3C-maintained initial context, plus the empty prefix bound to the
/// XHTML vocabulary.
// https://www.w3.org/2011/rdfa-context/rdfa-1.1
pub fn initial_prefixes() -> curie::PrefixMapping {
    let mut mapping = curie::PrefixMapping::default();
    for (prefix, iri) in [
        ("", "http://www.w3.org/1999/xhtml/vocab#"),
        // W3C documents
        ("as", "https://www.w3.org/ns/activitystreams#"),
        ("csvw", "http://www.w3.org/ns/csvw#"),
        ("dcat", "http://www.w3.org/ns/dcat#"),
        ("dqv", "http://www.w3.org/ns/dqv#"),
        ("duv", "http://www.w3.org/ns/duv#"),
        ("grddl", "http://www.w3.org/2003/g/data-view#"),
        ("jsonld", "http://json-ld.org/vocab#"),
        ("ma", "http://www.w3.org/ns/ma-ont#"),
        ("org", "http://www.w3.org/ns/org#"),
        ("owl", "http://www.w3.org/2002/07/owl#"),
        ("prov", "http://www.w3.org/ns/prov#"),
        ("qb", "http://purl.org/linked-data/cube#"),
        ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
        ("rdfa", "http://www.w3.org/ns/rdfa#"),
        ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
        ("rif", "http://www.w3.org/2007/rif#"),
        ("rr", "http://www.w3.org/ns/r2rml#"),
        ("sd", "http://www.w3.org/ns/sparql-service-description#"),
        ("skos", "http://www.w3.org/2004/02/skos/core#"),
        ("skosxl", "http://www.w3.org/2008/05/skos-xl#"),
        ("sosa", "http://www.w3.org/ns/sosa/"),
        ("ssn", "http://www.w3.org/ns/ssn/"),
        ("time", "http://www.w3.org/2006/time#"),
        ("void", "http://rdfs.org/ns/void#"),
        ("wdr", "http://www.w3.org/2007/05/powder#"),
        ("wdrs", "http://www.w3.org/2007/05/powder-s#"),
        ("xhv", "http://www.w3.org/1999/xhtml/vocab#"),
        ("xml", "http://www.w3.org/XML/1998/namespace"),
        ("xsd", "http://www.w3.org/2001/XMLSchema#"),
        // widely deployed
        ("cc", "http://creativecommons.org/ns#"),
        ("ctag", "http://commontag.org/ns#"),
        ("dc", "http://purl.org/dc/terms/"),
        ("dc11", "http://purl.org/dc/elements/1.1/"),
        ("dcterms", "http://purl.org/dc/terms/"),
        ("foaf", "http://xmlns.com/foaf/0.1/"),
        ("gr", "http://purl.org/goodrelations/v1#"),
        ("ical", "http://www.w3.org/2002/12/cal/icaltzd#"),
        ("og", "http://ogp.me/ns#"),
        ("rev", "http://purl.org/stuff/rev#"),
        ("schema", "http://schema.org/"),
        ("schemas", "https://schema.org/"),
        ("sioc", "http://rdfs.org/sioc/ns#"),
        ("v", "http://rdf.data-vocabulary.org/#"),
        ("vcard", "http://www.w3.org/2006/vcard/ns#"),
    ] {
        mapping
            .add_prefix(prefix, iri)
            .expect("initial prefixes are valid");
    }
    mapping
}

/// The term mappings every extraction starts from.
// https://www.w3.org/2011/rdfa-context/rdfa-1.1
pub fn initial_terms() -> IndexMap<String, oxrdf::NamedNode> {
    [
        (
            "describedBy".to_string(),
            oxrdf::NamedNode::new_unchecked("http://www.w3.org/2007/05/powder-s#describedby"),
        ),
        (
            "license".to_string(),
            oxrdf::NamedNode::new_unchecked("http://www.w3.org/1999/xhtml/vocab#license"),
        ),
        (
            "role".to_string(),
            oxrdf::NamedNode::new_unchecked("http://www.w3.org/1999/xhtml/vocab#role"),
        ),
    ]
    .into_iter()
    .collect()
}
