//! Property shape resolution.

use oxrdf::{Graph, Term};
use tracing::warn;

use crate::constraint::{Coerced, ConstraintKind, extra_key, linked_pairs, term_to_string};
use crate::error::ShapeError;
use crate::model::{NodeKind, NodeKindWarning, PropertyDescriptor, Severity, compare_order, local_name};

/// Resolves a property shape into a [`PropertyDescriptor`].
///
/// Constraints of nodes linked with `sh:node` are merged in, the property's own values winning.
/// `sh:path` is required.
pub fn resolve_property(shapes: &Graph, property: &Term) -> Result<PropertyDescriptor, ShapeError> {
    resolve_property_with(shapes, property, true)
}

/// Same as [`resolve_property`], `require_path` set to `false` allows property shapes without `sh:path`.
pub fn resolve_property_with(
    shapes: &Graph,
    property: &Term,
    require_path: bool,
) -> Result<PropertyDescriptor, ShapeError> {
    resolve_nested(shapes, property, require_path, &mut Vec::new())
}

/// Resolves `property` nested in the property shapes of `ancestors`.
///
/// A property shape nested in itself is a [`ShapeError::CyclicReference`].
pub(crate) fn resolve_nested(
    shapes: &Graph,
    property: &Term,
    require_path: bool,
    ancestors: &mut Vec<Term>,
) -> Result<PropertyDescriptor, ShapeError> {
    if ancestors.contains(property) {
        let chain = ancestors
            .iter()
            .chain([property])
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(ShapeError::cyclic_reference(format!(
            "property shape {property} is nested in itself: {chain}"
        )));
    }
    ancestors.push(property.clone());
    let descriptor = resolve_descriptor(shapes, property, require_path, ancestors);
    ancestors.pop();
    descriptor
}

fn resolve_descriptor(
    shapes: &Graph,
    property: &Term,
    require_path: bool,
    ancestors: &mut Vec<Term>,
) -> Result<PropertyDescriptor, ShapeError> {
    let mut descriptor = PropertyDescriptor::new(property.clone());
    let mut declared_node_kind = None;
    for (predicate, value) in linked_pairs(shapes, property) {
        let Some(kind) = ConstraintKind::from_predicate(predicate.as_ref()) else {
            descriptor
                .extra
                .entry(extra_key(&predicate))
                .or_insert_with(|| term_to_string(&value));
            continue;
        };
        let coerced = kind
            .coercion()
            .coerce_nested(shapes, property, kind, &value, ancestors)?;
        apply(&mut descriptor, &mut declared_node_kind, kind, coerced);
    }
    descriptor
        .properties
        .sort_by(|a, b| compare_order(a.order, b.order));

    let Some(path) = &descriptor.path else {
        if require_path {
            return Err(ShapeError::missing_path(property.clone()));
        }
        descriptor.node_kind = node_kind(&mut descriptor, declared_node_kind);
        return Ok(descriptor);
    };
    if descriptor.name.is_none() {
        descriptor.name = Some(local_name(path.as_str()).to_owned());
    }
    descriptor.node_kind = node_kind(&mut descriptor, declared_node_kind);
    Ok(descriptor)
}

/// Stores a coerced value. The first value of a single valued constraint wins, so that values
/// of the property shape itself take precedence over the ones of its `sh:node` links.
fn apply(
    descriptor: &mut PropertyDescriptor,
    declared_node_kind: &mut Option<Term>,
    kind: ConstraintKind,
    coerced: Coerced,
) {
    match (kind, coerced) {
        (ConstraintKind::In, Coerced::List(values)) => descriptor.in_values.extend(values),
        (ConstraintKind::LanguageIn, Coerced::List(values)) => {
            descriptor.language_in.extend(values)
        }
        (ConstraintKind::MinCount, Coerced::Count(count)) => {
            descriptor.min_count.get_or_insert(count);
        }
        (ConstraintKind::MaxCount, Coerced::Count(count)) => {
            descriptor.max_count.get_or_insert(count);
        }
        (ConstraintKind::HasValue, Coerced::Scalar(value)) => {
            descriptor.has_value.get_or_insert(value);
        }
        (ConstraintKind::DefaultValue, Coerced::Scalar(value)) => {
            descriptor.default_value.get_or_insert(value);
        }
        (ConstraintKind::Property, Coerced::Nested(nested)) => descriptor.properties.push(*nested),
        (ConstraintKind::MinInclusive | ConstraintKind::MinExclusive, Coerced::Number(min)) => {
            descriptor.min.get_or_insert(min);
        }
        (ConstraintKind::MaxInclusive | ConstraintKind::MaxExclusive, Coerced::Number(max)) => {
            descriptor.max.get_or_insert(max);
        }
        (ConstraintKind::Order, Coerced::Number(order)) => {
            descriptor.order.get_or_insert(order);
        }
        (ConstraintKind::Path, Coerced::Iri(path)) => {
            descriptor.path.get_or_insert(path);
        }
        (ConstraintKind::Datatype, Coerced::Iri(datatype)) => {
            descriptor.datatype.get_or_insert(datatype);
        }
        (ConstraintKind::Class, Coerced::Iri(class)) => {
            descriptor.class.get_or_insert(class);
        }
        (ConstraintKind::NodeKind, Coerced::Term(node_kind)) => {
            declared_node_kind.get_or_insert(node_kind);
        }
        (ConstraintKind::Severity, Coerced::Term(severity)) => {
            if descriptor.severity.is_none() {
                descriptor.severity = Some(match &severity {
                    Term::NamedNode(iri) => {
                        Severity::from_iri(iri.as_str()).unwrap_or(Severity::Violation)
                    }
                    _ => Severity::Violation,
                });
            }
        }
        (ConstraintKind::Group, Coerced::Term(group)) => {
            descriptor.group.get_or_insert(group);
        }
        (ConstraintKind::Name, Coerced::Text(name)) => {
            descriptor.name.get_or_insert(name);
        }
        (ConstraintKind::Role, Coerced::Text(role)) => {
            descriptor.role.get_or_insert(role);
        }
        // Each kind has a single coercion
        _ => {}
    }
}

/// Infers or checks the node kind, logging every correction.
fn node_kind(descriptor: &mut PropertyDescriptor, declared: Option<Term>) -> NodeKind {
    let has_value = descriptor.has_value.is_some();
    let has_nested_properties = !descriptor.properties.is_empty();
    let inferred = NodeKind::infer(has_value, has_nested_properties);
    let property = descriptor.name().to_owned();
    let mut warnings = Vec::new();
    let node_kind = match declared {
        None => inferred,
        Some(declared) => {
            let known = match &declared {
                Term::NamedNode(iri) => NodeKind::from_iri(iri.as_str()),
                _ => None,
            };
            if let Some(known) = known {
                NodeKindWarning::check_declared(
                    &property,
                    known,
                    has_value,
                    has_nested_properties,
                    &mut warnings,
                )
            } else {
                warnings.push(NodeKindWarning::Invalid {
                    property,
                    declared: term_to_string(&declared),
                    replacement: inferred,
                });
                inferred
            }
        }
    };
    for warning in &warnings {
        warn!("{warning}");
    }
    descriptor.warnings.extend(warnings);
    node_kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScalarValue;
    use crate::vocab::shacl;
    use oxrdf::vocab::xsd;
    use oxrdf::{BlankNode, Literal, NamedNode, Triple};

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn property_with_path(graph: &mut Graph, path: &str) -> BlankNode {
        let property = BlankNode::default();
        graph.insert(&Triple::new(property.clone(), shacl::PATH, ex(path)));
        property
    }

    #[test]
    fn name_defaults_to_path_tail() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "hasName");
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.name(), "hasName");
        assert_eq!(descriptor.order, None);
        assert_eq!(descriptor.node_kind, NodeKind::IriOrLiteral);
        assert!(descriptor.warnings.is_empty());
    }

    #[test]
    fn missing_path_is_fatal_unless_exempted() {
        let mut graph = Graph::new();
        let property = BlankNode::default();
        graph.insert(&Triple::new(property.clone(), shacl::NAME, Literal::from("orphan")));
        let property = Term::from(property);
        assert!(matches!(
            resolve_property(&graph, &property),
            Err(ShapeError::MissingPath { .. })
        ));
        let descriptor = resolve_property_with(&graph, &property, false).unwrap();
        assert_eq!(descriptor.path, None);
        assert_eq!(descriptor.name(), "orphan");
    }

    #[test]
    fn bounds_are_normalized() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "altitude");
        graph.insert(&Triple::new(
            property.clone(),
            shacl::MIN_INCLUSIVE,
            Literal::from(5),
        ));
        graph.insert(&Triple::new(
            property.clone(),
            shacl::MAX_EXCLUSIVE,
            Literal::from(10),
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.min, Some(5.));
        assert_eq!(descriptor.max, Some(9.));
    }

    #[test]
    fn has_value_is_coerced_and_infers_literal() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "count");
        graph.insert(&Triple::new(
            property.clone(),
            shacl::HAS_VALUE,
            Literal::new_typed_literal("3", xsd::INTEGER),
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.has_value, Some(ScalarValue::Integer(3)));
        assert_eq!(descriptor.node_kind, NodeKind::Literal);
    }

    #[test]
    fn nested_properties_infer_blank_node_or_iri() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "location");
        let nested = property_with_path(&mut graph, "latitude");
        graph.insert(&Triple::new(property.clone(), shacl::PROPERTY, nested));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.properties.len(), 1);
        assert_eq!(descriptor.properties[0].name(), "latitude");
        assert_eq!(descriptor.node_kind, NodeKind::BlankNodeOrIri);
    }

    #[test]
    fn property_nested_in_itself_is_an_error() {
        let mut graph = Graph::new();
        let property = ex("altitude");
        graph.insert(&Triple::new(property.clone(), shacl::PATH, ex("hasAltitude")));
        graph.insert(&Triple::new(property.clone(), shacl::PROPERTY, property.clone()));
        assert!(matches!(
            resolve_property(&graph, &property.into()),
            Err(ShapeError::CyclicReference { .. })
        ));
    }

    #[test]
    fn indirect_nesting_cycle_is_an_error() {
        let mut graph = Graph::new();
        let location = ex("location");
        let point = ex("point");
        graph.insert(&Triple::new(location.clone(), shacl::PATH, ex("hasLocation")));
        graph.insert(&Triple::new(point.clone(), shacl::PATH, ex("hasPoint")));
        graph.insert(&Triple::new(location.clone(), shacl::PROPERTY, point.clone()));
        graph.insert(&Triple::new(point, shacl::PROPERTY, location.clone()));
        let Err(ShapeError::CyclicReference { message }) = resolve_property(&graph, &location.into())
        else {
            panic!("expected a cyclic reference");
        };
        assert!(message.contains("<http://example.org/point>"));
    }

    #[test]
    fn shared_nested_property_is_not_a_cycle() {
        let mut graph = Graph::new();
        let location = property_with_path(&mut graph, "location");
        let latitude = property_with_path(&mut graph, "latitude");
        let longitude = property_with_path(&mut graph, "longitude");
        let degrees = property_with_path(&mut graph, "degrees");
        for coordinate in [&latitude, &longitude] {
            graph.insert(&Triple::new(location.clone(), shacl::PROPERTY, coordinate.clone()));
            graph.insert(&Triple::new(coordinate.clone(), shacl::PROPERTY, degrees.clone()));
        }
        let descriptor = resolve_property(&graph, &location.into()).unwrap();
        assert_eq!(descriptor.properties.len(), 2);
        assert!(
            descriptor
                .properties
                .iter()
                .all(|coordinate| coordinate.properties[0].name() == "degrees")
        );
    }

    #[test]
    fn invalid_node_kind_is_replaced() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "label");
        graph.insert(&Triple::new(
            property.clone(),
            shacl::NODE_KIND,
            ex("Whatever"),
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.node_kind, NodeKind::IriOrLiteral);
        assert!(matches!(
            descriptor.warnings.as_slice(),
            [NodeKindWarning::Invalid { .. }]
        ));
    }

    #[test]
    fn node_kind_conflicting_with_has_value_is_replaced() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "kind");
        graph.insert(&Triple::new(
            property.clone(),
            shacl::NODE_KIND,
            shacl::BLANK_NODE_OR_IRI,
        ));
        graph.insert(&Triple::new(
            property.clone(),
            shacl::HAS_VALUE,
            ex("Drone"),
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.node_kind, NodeKind::Iri);
        assert!(descriptor.warnings.iter().any(|warning| matches!(
            warning,
            NodeKindWarning::IncompatibleWithHasValue {
                replacement: NodeKind::Iri,
                ..
            }
        )));
    }

    #[test]
    fn blank_node_without_nested_properties_warns() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "geometry");
        graph.insert(&Triple::new(property.clone(), shacl::NODE_KIND, shacl::BLANK_NODE));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.node_kind, NodeKind::BlankNode);
        assert!(matches!(
            descriptor.warnings.as_slice(),
            [NodeKindWarning::MissingNestedProperties { .. }]
        ));
    }

    #[test]
    fn linked_node_constraints_are_inherited() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "startTime");
        let base = ex("TimeProperty");
        graph.insert(&Triple::new(property.clone(), shacl::NODE, base.clone()));
        graph.insert(&Triple::new(base.clone(), shacl::NAME, Literal::from("inherited")));
        graph.insert(&Triple::new(
            base,
            shacl::DATATYPE,
            xsd::DATE_TIME,
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.name(), "inherited");
        assert_eq!(descriptor.datatype, Some(xsd::DATE_TIME.into_owned()));
    }

    #[test]
    fn own_constraints_override_linked_ones() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "endTime");
        let base = ex("TimeProperty");
        graph.insert(&Triple::new(property.clone(), shacl::NODE, base.clone()));
        graph.insert(&Triple::new(property.clone(), shacl::NAME, Literal::from("end_time")));
        graph.insert(&Triple::new(
            property.clone(),
            shacl::MAX_COUNT,
            Literal::new_typed_literal("1", xsd::INTEGER),
        ));
        graph.insert(&Triple::new(base.clone(), shacl::NAME, Literal::from("time")));
        graph.insert(&Triple::new(
            base,
            shacl::MAX_COUNT,
            Literal::new_typed_literal("5", xsd::INTEGER),
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(descriptor.name(), "end_time");
        assert_eq!(descriptor.max_count, Some(1));
    }

    #[test]
    fn unknown_predicates_are_kept_as_extra() {
        let mut graph = Graph::new();
        let property = property_with_path(&mut graph, "notes");
        graph.insert(&Triple::new(
            property.clone(),
            NamedNode::new_unchecked("http://www.w3.org/ns/shacl#description"),
            Literal::from("Free text"),
        ));
        let descriptor = resolve_property(&graph, &property.into()).unwrap();
        assert_eq!(
            descriptor.extra.get("description").map(String::as_str),
            Some("Free text")
        );
    }
}
