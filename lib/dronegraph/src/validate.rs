//! Relationship constraint validation.

use oxrdf::{Graph, NamedNode, NamedOrBlankNode, Term};
use std::fmt;
use tracing::debug;

use crate::constraint::{as_node, term_to_string};
use crate::error::ShapeError;
use crate::label::EntityDictionary;
use crate::model::local_name;
use crate::shape::{resolve_shape_set, shape_for_class};
use crate::store::TripleStore;

/// Result of a constraint pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Every declared relationship holds.
    Conforms,
    /// Some relationships do not hold.
    Violated(ConstraintReport),
    /// The constraint set resolves to no shape.
    NotFound { shape_set: String },
}

impl ValidationOutcome {
    pub fn conforms(&self) -> bool {
        matches!(self, Self::Conforms)
    }
}

/// The relationships that do not hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintReport {
    pub violations: Vec<ConstraintViolation>,
}

impl ConstraintReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for ConstraintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            f.write_str(&violation.message)?;
        }
        Ok(())
    }
}

/// `subject` is not linked through `path` to any of the `expected` entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub subject: NamedOrBlankNode,
    /// `rdfs:label` of the subject, or its identifier.
    pub subject_label: String,
    pub path: NamedNode,
    /// Entity label of the expected objects.
    pub expected_label: String,
    pub expected: Vec<NamedOrBlankNode>,
    pub message: String,
}

/// Checks that the relationships declared by the shape set `constraint_set` hold between the
/// entities of `entities`.
///
/// For each constraint shape, every entity sharing its label is a subject. For each property with
/// `sh:path` and `sh:class`, at least one entity with the label of the class must be an object of
/// `(subject, path)`. Literal entries are ignored.
pub fn validate_constraints(
    shapes: &Graph,
    store: &impl TripleStore,
    constraint_set: &str,
    entities: &EntityDictionary,
) -> Result<ValidationOutcome, ShapeError> {
    let set = resolve_shape_set(shapes, constraint_set)?;
    if set.is_empty() {
        return Ok(ValidationOutcome::NotFound {
            shape_set: constraint_set.to_owned(),
        });
    }
    let mut report = ConstraintReport::default();
    for shape in &set {
        for (label, term) in entities.matching(shape.label()) {
            let Some(subject) = as_node(term) else {
                debug!("Skipping {label}: not a node");
                continue;
            };
            for property in shape.all_properties() {
                let (Some(path), Some(class)) = (&property.path, &property.class) else {
                    continue;
                };
                let expected_label = shape_for_class(shapes, class, &set)?.map_or_else(
                    || local_name(class.as_str()).to_owned(),
                    |shape| shape.label().to_owned(),
                );
                let expected = entities
                    .matching(&expected_label)
                    .filter_map(|(_, term)| as_node(term))
                    .collect::<Vec<_>>();
                if expected.is_empty() {
                    debug!("No {expected_label} entity to check {label} against");
                    continue;
                }
                let objects = store.objects(subject.as_ref(), path.as_ref());
                if expected
                    .iter()
                    .any(|candidate| objects.contains(&Term::from(candidate.clone())))
                {
                    continue;
                }
                report.violations.push(violation(
                    store,
                    subject.clone(),
                    path.clone(),
                    expected_label,
                    expected,
                ));
            }
        }
    }
    Ok(if report.is_empty() {
        ValidationOutcome::Conforms
    } else {
        ValidationOutcome::Violated(report)
    })
}

fn violation(
    store: &impl TripleStore,
    subject: NamedOrBlankNode,
    path: NamedNode,
    expected_label: String,
    expected: Vec<NamedOrBlankNode>,
) -> ConstraintViolation {
    let subject_label = display_label(store, &subject);
    let expected_names = expected
        .iter()
        .map(|node| display_label(store, node))
        .collect::<Vec<_>>()
        .join(", ");
    let message = format!(
        "{subject_label} is not linked through {path} to any {expected_label} ({expected_names})"
    );
    ConstraintViolation {
        subject,
        subject_label,
        path,
        expected_label,
        expected,
        message,
    }
}

fn display_label(store: &impl TripleStore, node: &NamedOrBlankNode) -> String {
    store
        .label_of(node.as_ref())
        .unwrap_or_else(|| term_to_string(&Term::from(node.clone())))
}
