//! Ready to use [`NamedNodeRef`]s for the vocabularies read by the engine.
//!
//! `rdf`, `rdfs` and `xsd` come from [`oxrdf::vocab`].

pub mod shacl {
    //! The subset of the [SHACL](https://www.w3.org/TR/shacl/) vocabulary exercised by shape resolution.
    use oxrdf::NamedNodeRef;

    /// The SHACL namespace: `http://www.w3.org/ns/shacl#`
    pub const NAMESPACE: &str = "http://www.w3.org/ns/shacl#";

    /// The class of all node shapes.
    pub const NODE_SHAPE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#NodeShape");
    /// The class of property groups.
    pub const PROPERTY_GROUP: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#PropertyGroup");

    /// Links a shape to a class whose instances are to be validated.
    pub const TARGET_CLASS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#targetClass");
    /// Links a shape to a property shape.
    pub const PROPERTY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#property");
    /// Links a shape to another node shape whose constraints are merged in.
    pub const NODE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#node");
    /// Specifies a property path for a property shape.
    pub const PATH: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#path");
    /// Whether a shape is closed.
    pub const CLOSED: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#closed");
    /// Properties allowed on a closed shape without a property shape.
    pub const IGNORED_PROPERTIES: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#ignoredProperties");
    /// The group a property shape belongs to.
    pub const GROUP: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#group");
    /// Relative ordering of properties and groups.
    pub const ORDER: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#order");
    /// Human-readable name.
    pub const NAME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#name");
    /// Expected node kind of the values.
    pub const NODE_KIND: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#nodeKind");

    /// Datatype of literal values.
    pub const DATATYPE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#datatype");
    /// Class of the values.
    pub const CLASS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#class");
    /// Fixed value.
    pub const HAS_VALUE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#hasValue");
    /// Default value of a form field.
    pub const DEFAULT_VALUE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#defaultValue");
    /// Minimum number of values.
    pub const MIN_COUNT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#minCount");
    /// Maximum number of values.
    pub const MAX_COUNT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#maxCount");
    /// Inclusive lower bound.
    pub const MIN_INCLUSIVE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#minInclusive");
    /// Exclusive upper bound.
    pub const MAX_EXCLUSIVE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#maxExclusive");
    /// Allowed values, as an RDF list.
    pub const IN: NamedNodeRef<'_> = NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#in");
    /// Severity of a property shape.
    pub const SEVERITY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#severity");

    /// Blank node kind.
    pub const BLANK_NODE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#BlankNode");
    /// IRI node kind.
    pub const IRI: NamedNodeRef<'_> = NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#IRI");
    /// Literal node kind.
    pub const LITERAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#Literal");
    /// Blank node or IRI node kind.
    pub const BLANK_NODE_OR_IRI: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#BlankNodeOrIRI");
    /// Blank node or literal node kind.
    pub const BLANK_NODE_OR_LITERAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#BlankNodeOrLiteral");
    /// IRI or literal node kind.
    pub const IRI_OR_LITERAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#IRIOrLiteral");

    /// Violation severity.
    pub const VIOLATION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#Violation");
    /// Warning severity.
    pub const WARNING: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#Warning");
    /// Info severity.
    pub const INFO: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/shacl#Info");
}

pub mod landrs {
    //! Terms of the [LANDRS](https://schema.landrs.org/schema/) schema used to organize shapes.
    use oxrdf::NamedNodeRef;

    /// The LANDRS namespace: `http://schema.landrs.org/schema/`
    pub const NAMESPACE: &str = "http://schema.landrs.org/schema/";

    /// Places a node shape in a named shape set (literal object).
    pub const SHAPE_SET: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://schema.landrs.org/schema/shapeSet");
    /// Role tag of a property shape (literal object), e.g. `"boundary"`.
    pub const ROLE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://schema.landrs.org/schema/role");
}
