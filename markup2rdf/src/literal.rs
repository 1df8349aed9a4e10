//! Literal classification for `property`-carrying elements.
//!
//! Decides between a plain literal, a datatype-typed literal, and a
//! rich-markup literal whose value is the element's serialized subtree.
//! When the rich-markup branch is taken the subtree has been consumed as a
//! value and the traversal must not descend into it.

use icu::locale::LanguageIdentifier;
use oxrdf::vocab::rdf;
use oxrdf::{Literal, NamedNode};

use crate::tree::MarkupNode;
use crate::walk::Attr;

pub(crate) struct ClassifiedLiteral {
    pub literal: Literal,
    /// The subtree was serialized into the value; do not recurse.
    pub subtree_consumed: bool,
}

/// Classify the object literal for an element carrying `property`.
///
/// `datatype` is the resolved attribute: `Missing` also covers a present
/// but unresolvable value, `Empty` an explicit `datatype=""`.
pub(crate) fn classify<N: MarkupNode>(
    element: &N,
    datatype: &Attr<NamedNode>,
    content: Option<&str>,
    language: Option<&LanguageIdentifier>,
    namespaces: &[(String, String)],
) -> ClassifiedLiteral {
    if let Attr::Value(datatype) = datatype {
        if datatype.as_ref() != rdf::XML_LITERAL {
            // typed literal; note that the language is not carried, the
            // value/datatype pair stands alone
            let value = content
                .map(str::to_string)
                .unwrap_or_else(|| element.text_content());
            return ClassifiedLiteral {
                literal: Literal::new_typed_literal(value, datatype.clone()),
                subtree_consumed: false,
            };
        }
    }

    let explicitly_plain = matches!(datatype, Attr::Empty);
    if content.is_some() || !element.has_element_children() || explicitly_plain {
        let value = content
            .map(str::to_string)
            .unwrap_or_else(|| element.text_content());
        return ClassifiedLiteral {
            literal: plain(value, language),
            subtree_consumed: false,
        };
    }

    // rich-markup literal: the serialized subtree is the value
    ClassifiedLiteral {
        literal: Literal::new_typed_literal(
            element.inner_markup(namespaces),
            rdf::XML_LITERAL.into_owned(),
        ),
        subtree_consumed: true,
    }
}

fn plain(value: String, language: Option<&LanguageIdentifier>) -> Literal {
    match language {
        Some(language) => {
            Literal::new_language_tagged_literal_unchecked(value, language.to_string())
        }
        None => Literal::new_simple_literal(value),
    }
}
