//! Error types for shape resolution and graph population.

use oxrdf::{NamedNode, Term};

/// Fatal error aborting a resolution or population pass.
///
/// Recoverable outcomes (unknown shape set, constraint violations) are not errors,
/// see [`PopulateOutcome`](crate::PopulateOutcome) and [`ValidationOutcome`](crate::ValidationOutcome).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ShapeError {
    /// Neither a self-typed class nor a `sh:targetClass` resolved.
    #[error("A target class must be specified for shape {shape}")]
    MissingTargetClass { shape: Term },

    /// A property shape without `sh:path`.
    #[error("Every property must have a path associated with it: {property}")]
    MissingPath { property: Term },

    /// `sh:path` is not an IRI.
    #[error("Unsupported property path {path} on {property}: only predicate paths are supported")]
    InvalidPath { property: Term, path: Term },

    /// `sh:minCount` or `sh:maxCount` is not an integer.
    #[error("{constraint} value must be an integer on {property}: \"{value}\"")]
    InvalidCount {
        property: Term,
        constraint: &'static str,
        value: Term,
    },

    /// A property references a `sh:PropertyGroup` that does not exist.
    #[error("Property {property} references PropertyGroup {group} which does not exist")]
    UnknownGroup { property: Term, group: Term },

    /// A malformed RDF list.
    #[error("Invalid RDF list on {node}: {message}")]
    InvalidRdfList { node: Term, message: String },

    /// A term has a shape the engine cannot use.
    #[error("Invalid value for {node}: {message}")]
    InvalidTerm { node: Term, message: String },

    /// A property with severity `sh:Violation` has no value to write.
    #[error("No value provided for property '{name}' ({path}) of entity '{label}'")]
    MissingValue {
        label: String,
        name: String,
        path: NamedNode,
    },

    /// A property shape is nested in itself through `sh:property`.
    #[error("Cyclic shape reference detected: {message}")]
    CyclicReference { message: String },

    /// Nested population went deeper than the allowed limit.
    #[error("Maximum population depth ({depth}) exceeded while populating '{label}'")]
    MaxRecursionDepth { label: String, depth: usize },

    /// The triple store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error raised by a [`TripleStore`](crate::TripleStore) or a [`SharedStore`](crate::SharedStore).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A writer panicked while holding the store lock.
    #[error("The store lock has been poisoned by a panicking writer")]
    Poisoned,

    /// A generated identifier does not form a valid IRI.
    #[error("Invalid identifier IRI '{iri}': {message}")]
    InvalidIdentifier { iri: String, message: String },
}

impl ShapeError {
    /// Creates a missing target class error.
    pub fn missing_target_class(shape: impl Into<Term>) -> Self {
        Self::MissingTargetClass {
            shape: shape.into(),
        }
    }

    /// Creates a missing path error.
    pub fn missing_path(property: impl Into<Term>) -> Self {
        Self::MissingPath {
            property: property.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(property: impl Into<Term>, path: impl Into<Term>) -> Self {
        Self::InvalidPath {
            property: property.into(),
            path: path.into(),
        }
    }

    /// Creates an invalid count error.
    pub fn invalid_count(
        property: impl Into<Term>,
        constraint: &'static str,
        value: impl Into<Term>,
    ) -> Self {
        Self::InvalidCount {
            property: property.into(),
            constraint,
            value: value.into(),
        }
    }

    /// Creates an unknown group error.
    pub fn unknown_group(property: impl Into<Term>, group: impl Into<Term>) -> Self {
        Self::UnknownGroup {
            property: property.into(),
            group: group.into(),
        }
    }

    /// Creates an invalid RDF list error.
    pub fn invalid_rdf_list(node: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidRdfList {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Creates a cyclic reference error.
    pub fn cyclic_reference(message: impl Into<String>) -> Self {
        Self::CyclicReference {
            message: message.into(),
        }
    }

    /// Creates an invalid term error.
    pub fn invalid_term(node: impl Into<Term>, message: impl Into<String>) -> Self {
        Self::InvalidTerm {
            node: node.into(),
            message: message.into(),
        }
    }
}
