//! Extraction from parsed HTML documents.

use markup2rdf::{extract_html, Error, Options, ReportKind};
use oxrdf::vocab::rdf;
use oxrdf::{Literal, NamedNode, Triple};
use pretty_assertions::assert_eq;

const LOCATION: &str = "http://example.org/page";

fn named(iri: &str) -> NamedNode {
    NamedNode::new_unchecked(iri)
}

#[test]
fn html_document_extracts_annotated_spans() {
    let html = r#"<html>
      <body>
        <div about="urn:photo" prefix="dc: http://purl.org/dc/elements/1.1/">
          <span property="dc:creator">Mark Birbeck</span>
        </div>
      </body>
    </html>"#;

    let extraction = extract_html(html, LOCATION, &Options::default()).unwrap();
    assert_eq!(
        extraction.statements.into_vec(),
        vec![Triple::new(
            named("urn:photo"),
            named("http://purl.org/dc/elements/1.1/creator"),
            Literal::new_simple_literal("Mark Birbeck"),
        )]
    );
}

#[test]
fn base_element_overrides_the_retrieval_location() {
    let html = r#"<html>
      <head><base href="http://example.org/docs/"></head>
      <body>
        <span about="one" property="dc11:title" content="T"></span>
      </body>
    </html>"#;

    let extraction = extract_html(html, LOCATION, &Options::default()).unwrap();
    assert_eq!(
        extraction.statements.into_vec(),
        vec![Triple::new(
            named("http://example.org/docs/one"),
            named("http://purl.org/dc/elements/1.1/title"),
            Literal::new_simple_literal("T"),
        )]
    );
}

#[test]
fn malformed_base_declaration_falls_back_to_the_location() {
    let html = r#"<html>
      <head><base href="not a valid iri"></head>
      <body>
        <span about="one" property="dc11:title" content="T"></span>
      </body>
    </html>"#;

    let extraction = extract_html(html, LOCATION, &Options::default()).unwrap();
    assert_eq!(
        extraction.statements.into_vec(),
        vec![Triple::new(
            named("http://example.org/one"),
            named("http://purl.org/dc/elements/1.1/title"),
            Literal::new_simple_literal("T"),
        )]
    );
    assert_eq!(extraction.reports.len(), 1);
    assert_eq!(
        extraction.reports[0].kind,
        ReportKind::InvalidBaseDeclaration
    );
}

#[test]
fn strict_mode_rejects_a_malformed_base_declaration() {
    let html = r#"<html>
      <head><base href="not a valid iri"></head>
      <body></body>
    </html>"#;

    let options = Options {
        strict: true,
        ..Options::default()
    };
    let err = extract_html(html, LOCATION, &options).unwrap_err();
    assert!(matches!(err, Error::IriParse { .. }));
}

#[test]
fn rich_literals_carry_in_scope_namespace_declarations() {
    let html = concat!(
        "<html><body>",
        r#"<div xmlns:ex="http://example.org/ns#" about="urn:x" property="ex:title">"#,
        "E = mc<sup>2</sup></div></body></html>",
    );

    let extraction = extract_html(html, LOCATION, &Options::default()).unwrap();
    assert_eq!(
        extraction.statements.into_vec(),
        vec![Triple::new(
            named("urn:x"),
            named("http://example.org/ns#title"),
            Literal::new_typed_literal(
                r#"E = mc<sup xmlns:ex="http://example.org/ns#">2</sup>"#,
                rdf::XML_LITERAL.into_owned(),
            ),
        )]
    );
}

#[test]
fn head_and_body_take_the_base_as_implicit_subject() {
    let html = r#"<html>
      <head>
        <link rel="foaf:maker" href="http://example.org/people/me">
      </head>
      <body property="dc11:title" content="Home"></body>
    </html>"#;

    let extraction = extract_html(html, LOCATION, &Options::default()).unwrap();
    assert_eq!(
        extraction.statements.into_vec(),
        vec![
            Triple::new(
                named(LOCATION),
                named("http://xmlns.com/foaf/0.1/maker"),
                named("http://example.org/people/me"),
            ),
            Triple::new(
                named(LOCATION),
                named("http://purl.org/dc/elements/1.1/title"),
                Literal::new_simple_literal("Home"),
            ),
        ]
    );
}

#[test]
fn extracted_statements_match_a_turtle_rendition() {
    let html = r#"<html lang="en">
      <body>
        <div about="http://example.org/people/alice" typeof="foaf:Person">
          <span property="foaf:name">Alice</span>
          <a rel="foaf:homepage" href="http://alice.example/"></a>
        </div>
      </body>
    </html>"#;

    let turtle = r#"
      @prefix foaf: <http://xmlns.com/foaf/0.1/> .
      @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
      <http://example.org/people/alice> rdf:type foaf:Person ;
        foaf:name "Alice"@en ;
        foaf:homepage <http://alice.example/> .
    "#;
    let expected: Vec<Triple> = oxttl::TurtleParser::new()
        .for_slice(turtle.as_bytes())
        .map(|triple| triple.unwrap())
        .collect();

    let extraction = extract_html(html, LOCATION, &Options::default()).unwrap();
    assert_eq!(extraction.statements.into_vec(), expected);
}
