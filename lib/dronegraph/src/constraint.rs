//! Recognized constraint kinds and the coercion applied to their values.

use oxrdf::vocab::rdf;
use oxrdf::{Graph, NamedNode, NamedNodeRef, NamedOrBlankNode, Term, TermRef};
use rustc_hash::FxHashSet;

use crate::error::ShapeError;
use crate::model::{PropertyDescriptor, ScalarValue, local_name};
use crate::property::resolve_nested;
use crate::vocab::{landrs, shacl};

/// A constraint predicate the property resolver understands.
///
/// Any other predicate is kept as a stringified extra value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Path,
    Name,
    Order,
    Datatype,
    Class,
    NodeKind,
    MinCount,
    MaxCount,
    HasValue,
    DefaultValue,
    In,
    LanguageIn,
    MinInclusive,
    MaxInclusive,
    MinExclusive,
    MaxExclusive,
    Property,
    Severity,
    Group,
    Role,
}

impl ConstraintKind {
    const ALL: [Self; 20] = [
        Self::Path,
        Self::Name,
        Self::Order,
        Self::Datatype,
        Self::Class,
        Self::NodeKind,
        Self::MinCount,
        Self::MaxCount,
        Self::HasValue,
        Self::DefaultValue,
        Self::In,
        Self::LanguageIn,
        Self::MinInclusive,
        Self::MaxInclusive,
        Self::MinExclusive,
        Self::MaxExclusive,
        Self::Property,
        Self::Severity,
        Self::Group,
        Self::Role,
    ];

    /// The local name of the constraint predicate.
    pub fn local_name(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Name => "name",
            Self::Order => "order",
            Self::Datatype => "datatype",
            Self::Class => "class",
            Self::NodeKind => "nodeKind",
            Self::MinCount => "minCount",
            Self::MaxCount => "maxCount",
            Self::HasValue => "hasValue",
            Self::DefaultValue => "defaultValue",
            Self::In => "in",
            Self::LanguageIn => "languageIn",
            Self::MinInclusive => "minInclusive",
            Self::MaxInclusive => "maxInclusive",
            Self::MinExclusive => "minExclusive",
            Self::MaxExclusive => "maxExclusive",
            Self::Property => "property",
            Self::Severity => "severity",
            Self::Group => "group",
            Self::Role => "role",
        }
    }

    /// Finds the constraint kind of a predicate.
    ///
    /// Every kind lives in the SHACL namespace except [`ConstraintKind::Role`].
    pub fn from_predicate(predicate: NamedNodeRef<'_>) -> Option<Self> {
        if predicate == landrs::ROLE {
            return Some(Self::Role);
        }
        let name = predicate.as_str().strip_prefix(shacl::NAMESPACE)?;
        Self::ALL
            .into_iter()
            .find(|kind| *kind != Self::Role && kind.local_name() == name)
    }

    /// The coercion rule applied to values of this constraint.
    pub fn coercion(self) -> Coercion {
        match self {
            Self::In | Self::LanguageIn => Coercion::List,
            Self::MinCount | Self::MaxCount => Coercion::Count,
            Self::HasValue | Self::DefaultValue => Coercion::Scalar,
            Self::Property => Coercion::Nested,
            Self::MinInclusive => Coercion::Bound { offset: 0. },
            Self::MinExclusive => Coercion::Bound { offset: 1. },
            Self::MaxInclusive => Coercion::Bound { offset: 0. },
            Self::MaxExclusive => Coercion::Bound { offset: -1. },
            Self::Order => Coercion::Number,
            Self::Path | Self::Datatype | Self::Class => Coercion::Iri,
            Self::NodeKind | Self::Severity | Self::Group => Coercion::Term,
            Self::Name | Self::Role => Coercion::Text,
        }
    }
}

/// How the value of a constraint is converted before being stored in a [`PropertyDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coercion {
    /// RDF list of values, stringified.
    List,
    /// Non negative integer. Anything else is fatal.
    Count,
    /// Native scalar value.
    Scalar,
    /// Nested property shape.
    Nested,
    /// Numeric bound, shifted by `offset` to make it inclusive.
    Bound { offset: f64 },
    /// Any number.
    Number,
    /// IRI.
    Iri,
    /// Kept as is.
    Term,
    /// Lexical form.
    Text,
}

/// A coerced constraint value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    List(Vec<String>),
    Count(u64),
    Scalar(ScalarValue),
    Nested(Box<PropertyDescriptor>),
    Number(f64),
    Iri(NamedNode),
    Term(Term),
    Text(String),
}

impl Coercion {
    /// Coerces `value`, the object of `kind` on the property shape `property`.
    pub fn coerce(
        self,
        shapes: &Graph,
        property: &Term,
        kind: ConstraintKind,
        value: &Term,
    ) -> Result<Coerced, ShapeError> {
        self.coerce_nested(shapes, property, kind, value, &mut vec![property.clone()])
    }

    /// Same as [`coerce`](Self::coerce), `ancestors` being the property shapes `property` is nested in, itself included.
    pub(crate) fn coerce_nested(
        self,
        shapes: &Graph,
        property: &Term,
        kind: ConstraintKind,
        value: &Term,
        ancestors: &mut Vec<Term>,
    ) -> Result<Coerced, ShapeError> {
        Ok(match self {
            Self::List => Coerced::List(
                parse_list(shapes, value.clone(), property)?
                    .iter()
                    .map(term_to_string)
                    .collect(),
            ),
            Self::Count => {
                let count = match value {
                    Term::Literal(literal) => literal.value().trim().parse().ok(),
                    _ => None,
                };
                Coerced::Count(count.ok_or_else(|| {
                    ShapeError::invalid_count(
                        property.clone(),
                        if kind == ConstraintKind::MinCount {
                            "sh:minCount"
                        } else {
                            "sh:maxCount"
                        },
                        value.clone(),
                    )
                })?)
            }
            Self::Scalar => Coerced::Scalar(ScalarValue::from_term(value)),
            Self::Nested => Coerced::Nested(Box::new(resolve_nested(
                shapes, value, true, ancestors,
            )?)),
            Self::Bound { offset } => Coerced::Number(parse_number(property, kind, value)? + offset),
            Self::Number => Coerced::Number(parse_number(property, kind, value)?),
            Self::Iri => match value {
                Term::NamedNode(node) => Coerced::Iri(node.clone()),
                _ if kind == ConstraintKind::Path => {
                    return Err(ShapeError::invalid_path(property.clone(), value.clone()));
                }
                _ => {
                    return Err(ShapeError::invalid_term(
                        property.clone(),
                        format!("sh:{} must be an IRI, found {value}", kind.local_name()),
                    ));
                }
            },
            Self::Term => Coerced::Term(value.clone()),
            Self::Text => Coerced::Text(term_to_string(value)),
        })
    }
}

fn parse_number(property: &Term, kind: ConstraintKind, value: &Term) -> Result<f64, ShapeError> {
    match value {
        Term::Literal(literal) => literal.value().trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        ShapeError::invalid_term(
            property.clone(),
            format!("sh:{} must be numeric, found {value}", kind.local_name()),
        )
    })
}

/// Stringifies a term: lexical form of literals, IRI of named nodes.
pub(crate) fn term_to_string(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_owned(),
        Term::Literal(literal) => literal.value().to_owned(),
        other => other.to_string(),
    }
}

/// Converts a term into a subject if it is an IRI or a blank node.
pub(crate) fn as_node(term: &Term) -> Option<NamedOrBlankNode> {
    match term {
        Term::NamedNode(node) => Some(node.clone().into()),
        Term::BlankNode(node) => Some(node.clone().into()),
        _ => None,
    }
}

pub(crate) fn get_object(graph: &Graph, subject: &Term, predicate: NamedNodeRef<'_>) -> Option<Term> {
    match subject {
        Term::NamedNode(n) => graph
            .object_for_subject_predicate(n, predicate)
            .map(TermRef::into_owned),
        Term::BlankNode(b) => graph
            .object_for_subject_predicate(b, predicate)
            .map(TermRef::into_owned),
        _ => None,
    }
}

pub(crate) fn get_objects(graph: &Graph, subject: &Term, predicate: NamedNodeRef<'_>) -> Vec<Term> {
    match subject {
        Term::NamedNode(n) => graph
            .objects_for_subject_predicate(n, predicate)
            .map(TermRef::into_owned)
            .collect(),
        Term::BlankNode(b) => graph
            .objects_for_subject_predicate(b, predicate)
            .map(TermRef::into_owned)
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn get_string(graph: &Graph, subject: &Term, predicate: NamedNodeRef<'_>) -> Option<String> {
    match get_object(graph, subject, predicate)? {
        Term::Literal(literal) => Some(literal.value().to_owned()),
        _ => None,
    }
}

pub(crate) fn get_number(graph: &Graph, subject: &Term, predicate: NamedNodeRef<'_>) -> Option<f64> {
    match get_object(graph, subject, predicate)? {
        Term::Literal(literal) => literal.value().trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn get_boolean(graph: &Graph, subject: &Term, predicate: NamedNodeRef<'_>) -> Option<bool> {
    match get_object(graph, subject, predicate)? {
        Term::Literal(literal) => match literal.value() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Every `(predicate, object)` pair of `node`, with the pairs of nodes linked through `sh:node` appended.
///
/// `sh:node` pairs themselves are not returned. Cycles are cut.
pub(crate) fn linked_pairs(graph: &Graph, node: &Term) -> Vec<(NamedNode, Term)> {
    let mut pairs = Vec::new();
    let mut visited = FxHashSet::default();
    collect_pairs(graph, node, &mut visited, &mut pairs);
    pairs
}

fn collect_pairs(
    graph: &Graph,
    node: &Term,
    visited: &mut FxHashSet<Term>,
    pairs: &mut Vec<(NamedNode, Term)>,
) {
    if !visited.insert(node.clone()) {
        return;
    }
    let own = match node {
        Term::NamedNode(n) => graph.triples_for_subject(n).collect::<Vec<_>>(),
        Term::BlankNode(b) => graph.triples_for_subject(b).collect::<Vec<_>>(),
        _ => return,
    };
    let mut linked = Vec::new();
    for triple in own {
        if triple.predicate == shacl::NODE {
            linked.push(triple.object.into_owned());
        } else {
            pairs.push((triple.predicate.into_owned(), triple.object.into_owned()));
        }
    }
    for linked in linked {
        collect_pairs(graph, &linked, visited, pairs);
    }
}

/// Reads an RDF list starting at `head`.
pub(crate) fn parse_list(graph: &Graph, head: Term, owner: &Term) -> Result<Vec<Term>, ShapeError> {
    let mut items = Vec::new();
    let mut visited = FxHashSet::default();
    let mut current = head;
    loop {
        if let Term::NamedNode(n) = &current {
            if n.as_ref() == rdf::NIL {
                break;
            }
        }
        if !visited.insert(current.clone()) {
            return Err(ShapeError::invalid_rdf_list(owner.clone(), "Cyclic list"));
        }
        let first = get_object(graph, &current, rdf::FIRST)
            .ok_or_else(|| ShapeError::invalid_rdf_list(owner.clone(), "Missing rdf:first"))?;
        items.push(first);
        current = get_object(graph, &current, rdf::REST)
            .ok_or_else(|| ShapeError::invalid_rdf_list(owner.clone(), "Missing rdf:rest"))?;
    }
    Ok(items)
}

/// The key under which an unrecognized predicate is kept.
pub(crate) fn extra_key(predicate: &NamedNode) -> String {
    local_name(predicate.as_str()).to_owned()
}
