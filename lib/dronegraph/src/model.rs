//! Resolved shape model.
//!
//! - [`NodeKind`] - Declared or inferred category of a property value
//! - [`ScalarValue`] - Native value of `sh:hasValue` / `sh:defaultValue`
//! - [`PropertyDescriptor`] - Canonical constraint set of one property shape
//! - [`PropertyGroup`] - Display and ordering bucket of properties
//! - [`Shape`] - A resolved node shape

use oxrdf::vocab::{rdf, rdfs, xsd};
use oxrdf::{
    BlankNode, Graph, Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Term,
    TripleRef,
};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::store::TripleStore;
use crate::vocab::shacl;

/// Kind of node a property value may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Iri,
    BlankNode,
    Literal,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
    IriOrLiteral,
}

impl NodeKind {
    /// Returns the SHACL IRI of this node kind.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::Iri => shacl::IRI,
            Self::BlankNode => shacl::BLANK_NODE,
            Self::Literal => shacl::LITERAL,
            Self::BlankNodeOrIri => shacl::BLANK_NODE_OR_IRI,
            Self::BlankNodeOrLiteral => shacl::BLANK_NODE_OR_LITERAL,
            Self::IriOrLiteral => shacl::IRI_OR_LITERAL,
        }
    }

    /// Parses a node kind from its SHACL IRI.
    pub fn from_iri(iri: &str) -> Option<Self> {
        [
            Self::Iri,
            Self::BlankNode,
            Self::Literal,
            Self::BlankNodeOrIri,
            Self::BlankNodeOrLiteral,
            Self::IriOrLiteral,
        ]
        .into_iter()
        .find(|kind| kind.iri().as_str() == iri)
    }

    /// The node kind used when none is declared.
    ///
    /// `Literal` for fixed values, `BlankNodeOrIri` when nested properties exist,
    /// `IriOrLiteral` otherwise.
    pub fn infer(has_value: bool, has_nested_properties: bool) -> Self {
        if has_value {
            Self::Literal
        } else if has_nested_properties {
            Self::BlankNodeOrIri
        } else {
            Self::IriOrLiteral
        }
    }

    fn allows_blank_node(self) -> bool {
        matches!(
            self,
            Self::BlankNode | Self::BlankNodeOrIri | Self::BlankNodeOrLiteral
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(local_name(self.iri().as_str()))
    }
}

/// Severity declared on a property shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Violation,
    Warning,
    Info,
}

impl Severity {
    /// Returns the SHACL IRI of this severity.
    pub fn iri(self) -> NamedNodeRef<'static> {
        match self {
            Self::Violation => shacl::VIOLATION,
            Self::Warning => shacl::WARNING,
            Self::Info => shacl::INFO,
        }
    }

    /// Parses a severity from its SHACL IRI.
    pub fn from_iri(iri: &str) -> Option<Self> {
        [Self::Violation, Self::Warning, Self::Info]
            .into_iter()
            .find(|severity| severity.iri().as_str() == iri)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(local_name(self.iri().as_str()))
    }
}

/// A `sh:hasValue` or `sh:defaultValue` coerced to its native type.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Iri(NamedNode),
    Blank(BlankNode),
    /// Any other literal (language tagged, dates...), kept as is.
    Literal(Literal),
}

impl ScalarValue {
    /// Coerces a term using the literal datatype.
    ///
    /// Literals whose lexical form is not valid for their datatype are kept as [`ScalarValue::Literal`].
    pub fn from_term(term: &Term) -> Self {
        let Term::Literal(literal) = term else {
            return match term {
                Term::NamedNode(node) => Self::Iri(node.clone()),
                Term::BlankNode(node) => Self::Blank(node.clone()),
                other => Self::String(other.to_string()),
            };
        };
        let value = literal.value();
        let datatype = literal.datatype();
        if literal.language().is_some() {
            return Self::Literal(literal.clone());
        }
        if datatype == xsd::STRING {
            return Self::String(value.to_owned());
        }
        if datatype == xsd::BOOLEAN {
            return match value {
                "true" | "1" => Self::Boolean(true),
                "false" | "0" => Self::Boolean(false),
                _ => Self::Literal(literal.clone()),
            };
        }
        if is_integer_datatype(datatype) {
            return value
                .parse()
                .map_or_else(|_| Self::Literal(literal.clone()), Self::Integer);
        }
        if datatype == xsd::DECIMAL || datatype == xsd::DOUBLE || datatype == xsd::FLOAT {
            return value
                .parse()
                .map_or_else(|_| Self::Literal(literal.clone()), Self::Double);
        }
        Self::Literal(literal.clone())
    }

    /// Converts back into an RDF term.
    pub fn to_term(&self) -> Term {
        match self {
            Self::Boolean(value) => Literal::from(*value).into(),
            Self::Integer(value) => Literal::from(*value).into(),
            Self::Double(value) => Literal::from(*value).into(),
            Self::String(value) => Literal::new_simple_literal(value).into(),
            Self::Iri(node) => node.clone().into(),
            Self::Blank(node) => node.clone().into(),
            Self::Literal(literal) => literal.clone().into(),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
            Self::Iri(node) => f.write_str(node.as_str()),
            Self::Blank(node) => write!(f, "{node}"),
            Self::Literal(literal) => f.write_str(literal.value()),
        }
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Boolean(value) => serializer.serialize_bool(*value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Double(value) => serializer.serialize_f64(*value),
            other => serializer.collect_str(other),
        }
    }
}

fn is_integer_datatype(datatype: NamedNodeRef<'_>) -> bool {
    [
        xsd::INTEGER,
        xsd::INT,
        xsd::LONG,
        xsd::SHORT,
        xsd::BYTE,
        xsd::NON_NEGATIVE_INTEGER,
        xsd::NON_POSITIVE_INTEGER,
        xsd::POSITIVE_INTEGER,
        xsd::NEGATIVE_INTEGER,
        xsd::UNSIGNED_INT,
        xsd::UNSIGNED_LONG,
        xsd::UNSIGNED_SHORT,
        xsd::UNSIGNED_BYTE,
    ]
    .contains(&datatype)
}

/// Non-fatal problem found with a declared `sh:nodeKind`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeKindWarning {
    #[error("Property \"{property}\" has constraint \"sh:nodeKind\" with invalid value \"{declared}\". Replacing with \"{replacement}\".")]
    Invalid {
        property: String,
        declared: String,
        replacement: NodeKind,
    },
    #[error("Property \"{property}\" has constraint \"sh:nodeKind\" with value \"{declared}\" which is incompatible with constraint sh:hasValue. Replacing with \"{replacement}\".")]
    IncompatibleWithHasValue {
        property: String,
        declared: NodeKind,
        replacement: NodeKind,
    },
    #[error("Property \"{property}\" has constraint \"sh:nodeKind\" with value \"{node_kind}\" but no property shapes are provided. The blank node option will have no input fields.")]
    MissingNestedProperties {
        property: String,
        node_kind: NodeKind,
    },
    #[error("Property \"{property}\" has constraint \"sh:nodeKind\" with value \"{node_kind}\". The property shapes provided in this property will be ignored.")]
    IgnoredNestedProperties {
        property: String,
        node_kind: NodeKind,
    },
}

impl NodeKindWarning {
    /// Checks a declared node kind that is a valid SHACL node kind and returns the kind to use.
    pub(crate) fn check_declared(
        property: &str,
        declared: NodeKind,
        has_value: bool,
        has_nested_properties: bool,
        warnings: &mut Vec<Self>,
    ) -> NodeKind {
        let mut node_kind = declared;
        if has_value {
            let replacement = match declared {
                NodeKind::BlankNodeOrIri => Some(NodeKind::Iri),
                NodeKind::IriOrLiteral | NodeKind::BlankNodeOrLiteral => Some(NodeKind::Literal),
                _ => None,
            };
            if let Some(replacement) = replacement {
                warnings.push(Self::IncompatibleWithHasValue {
                    property: property.to_owned(),
                    declared,
                    replacement,
                });
                node_kind = replacement;
            }
        }
        if node_kind.allows_blank_node() && !has_nested_properties {
            warnings.push(Self::MissingNestedProperties {
                property: property.to_owned(),
                node_kind,
            });
        } else if !node_kind.allows_blank_node() && has_nested_properties {
            warnings.push(Self::IgnoredNestedProperties {
                property: property.to_owned(),
                node_kind,
            });
        }
        node_kind
    }
}

/// The normalized constraint set of one property shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// The property shape node.
    pub id: Term,
    /// `sh:path`, always set unless the path was not required.
    pub path: Option<NamedNode>,
    /// `sh:name`, defaulting to the local name of the path.
    pub name: Option<String>,
    /// `sh:order`, `None` sorts after every explicit order.
    pub order: Option<f64>,
    pub datatype: Option<NamedNode>,
    pub class: Option<NamedNode>,
    pub node_kind: NodeKind,
    pub min_count: Option<u64>,
    pub max_count: Option<u64>,
    pub has_value: Option<ScalarValue>,
    pub default_value: Option<ScalarValue>,
    /// `sh:in`, as strings.
    pub in_values: Vec<String>,
    pub language_in: Vec<String>,
    /// Lower bound, from `sh:minInclusive` or `sh:minExclusive` + 1.
    pub min: Option<f64>,
    /// Upper bound, from `sh:maxInclusive` or `sh:maxExclusive` - 1.
    pub max: Option<f64>,
    /// Nested `sh:property` shapes.
    pub properties: Vec<PropertyDescriptor>,
    pub severity: Option<Severity>,
    /// `sh:group`.
    pub group: Option<Term>,
    /// Role tag (`landrs:role`).
    pub role: Option<String>,
    /// Any other constraint, stringified and keyed by local name.
    pub extra: BTreeMap<String, String>,
    /// Node kind corrections done during resolution.
    pub warnings: Vec<NodeKindWarning>,
}

impl PropertyDescriptor {
    pub(crate) fn new(id: Term) -> Self {
        Self {
            id,
            path: None,
            name: None,
            order: None,
            datatype: None,
            class: None,
            node_kind: NodeKind::IriOrLiteral,
            min_count: None,
            max_count: None,
            has_value: None,
            default_value: None,
            in_values: Vec::new(),
            language_in: Vec::new(),
            min: None,
            max: None,
            properties: Vec::new(),
            severity: None,
            group: None,
            role: None,
            extra: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// The property name, empty if it has neither name nor path.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Links to instances of a class (`sh:class`).
    pub fn is_relational(&self) -> bool {
        self.class.is_some()
    }

    /// Holds a typed literal (`sh:datatype`).
    pub fn is_literal(&self) -> bool {
        self.datatype.is_some() && self.class.is_none()
    }
}

/// A `sh:PropertyGroup` and the properties placed in it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyGroup {
    pub id: Term,
    /// `rdfs:label`.
    pub label: Option<String>,
    pub order: Option<f64>,
    pub properties: Vec<PropertyDescriptor>,
}

/// A resolved node shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: NamedOrBlankNode,
    /// Class instantiated for this shape.
    pub target_class: NamedNode,
    /// Extra classes every instance is also typed with.
    pub secondary_classes: Vec<NamedNode>,
    pub closed: bool,
    pub ignored_properties: Vec<NamedNode>,
    /// Groups sorted by order.
    pub groups: Vec<PropertyGroup>,
    /// Ungrouped properties.
    pub properties: Vec<PropertyDescriptor>,
    /// `sh:name` of the node shape, overriding the entity label.
    pub name: Option<String>,
    /// `sh:nodeKind` of the node shape.
    pub node_kind: Option<NodeKind>,
    pub order: Option<f64>,
}

impl Shape {
    /// The entity label of instances of this shape.
    ///
    /// This is `sh:name` if set, else the local name of the target class.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| local_name(self.target_class.as_str()))
    }

    /// Iterates over grouped properties, in group order, then ungrouped ones.
    pub fn all_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.groups
            .iter()
            .flat_map(|group| &group.properties)
            .chain(&self.properties)
    }

    /// All classes an instance gets typed with.
    pub fn classes(&self) -> impl Iterator<Item = &NamedNode> {
        std::iter::once(&self.target_class).chain(&self.secondary_classes)
    }

    /// A template of the instances of this shape, with placeholders instead of values.
    ///
    /// A blank node typed with the shape classes stands for the instance. Each property gets a
    /// `"placeholder nodeKind=<kind> datatype=<datatype> <property id>"` literal at its path.
    /// Properties with nested properties get a blank node labelled with that placeholder instead,
    /// the nested properties being mapped on it.
    ///
    /// ```
    /// use dronegraph::resolve_shape;
    /// use dronegraph::vocab::shacl;
    /// use oxrdf::vocab::{rdf, xsd};
    /// use oxrdf::{BlankNode, Graph, NamedNode, Triple};
    ///
    /// let mut shapes = Graph::new();
    /// let shape = NamedNode::new("http://example.com/FlightShape")?;
    /// let flight = NamedNode::new("http://example.com/Flight")?;
    /// let name = BlankNode::default();
    /// shapes.insert(&Triple::new(shape.clone(), rdf::TYPE, shacl::NODE_SHAPE));
    /// shapes.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, flight.clone()));
    /// shapes.insert(&Triple::new(shape.clone(), shacl::PROPERTY, name.clone()));
    /// shapes.insert(&Triple::new(name.clone(), shacl::PATH, NamedNode::new("http://example.com/name")?));
    /// shapes.insert(&Triple::new(name, shacl::DATATYPE, xsd::STRING));
    ///
    /// let map = resolve_shape(&shapes, shape.as_ref().into())?.rdf_map();
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(map.triples_for_object(&flight).count(), 1);
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn rdf_map(&self) -> Graph {
        let mut map = Graph::new();
        let root = BlankNode::default();
        for class in self.classes() {
            map.insert(TripleRef::new(&root, rdf::TYPE, class));
        }
        for property in self.all_properties() {
            add_to_map(&mut map, root.as_ref().into(), property);
        }
        map
    }

    /// Predicates used on `node` that a closed shape does not allow.
    ///
    /// Always empty for open shapes. This is advisory: population never enforces closure.
    pub fn undeclared_predicates(
        &self,
        store: &impl TripleStore,
        node: NamedOrBlankNodeRef<'_>,
    ) -> Vec<NamedNode> {
        if !self.closed {
            return Vec::new();
        }
        let mut undeclared = Vec::new();
        for triple in store.triples_matching(Some(node), None, None) {
            let predicate = triple.predicate;
            let declared = predicate.as_ref() == rdf::TYPE
                || self.ignored_properties.contains(&predicate)
                || self
                    .all_properties()
                    .any(|property| property.path.as_ref() == Some(&predicate));
            if !declared && !undeclared.contains(&predicate) {
                undeclared.push(predicate);
            }
        }
        undeclared
    }
}

fn add_to_map(map: &mut Graph, subject: NamedOrBlankNodeRef<'_>, property: &PropertyDescriptor) {
    let Some(path) = &property.path else {
        return;
    };
    let mut placeholder = format!("placeholder nodeKind={}", property.node_kind);
    if let Some(datatype) = &property.datatype {
        placeholder.push_str(" datatype=");
        placeholder.push_str(datatype.as_str());
    }
    placeholder.push(' ');
    placeholder.push_str(&property.id.to_string());
    let placeholder = Literal::new_simple_literal(placeholder);
    if property.properties.is_empty() {
        map.insert(TripleRef::new(subject, path, &placeholder));
        return;
    }
    let object = BlankNode::default();
    map.insert(TripleRef::new(subject, path, &object));
    map.insert(TripleRef::new(&object, rdfs::LABEL, &placeholder));
    for nested in &property.properties {
        add_to_map(map, object.as_ref().into(), nested);
    }
}

/// Returns the segment after the last `#` or `/` of an IRI.
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().unwrap_or(iri)
}

/// Ascending order, unordered entries last.
pub(crate) fn compare_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
