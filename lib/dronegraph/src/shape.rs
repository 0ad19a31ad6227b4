//! Node shape resolution.

use oxrdf::vocab::{rdf, rdfs};
use oxrdf::{Graph, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Term, TermRef, TripleRef};
use rustc_hash::FxHashSet;

use crate::constraint::{as_node, get_boolean, get_number, get_object, get_objects, get_string, parse_list};
use crate::error::ShapeError;
use crate::model::{NodeKind, PropertyGroup, Shape, compare_order};
use crate::property::resolve_property;
use crate::vocab::{landrs, shacl};

/// Resolves the node shape `root`.
///
/// Nodes linked with `sh:node` are merged into the root, at any depth. The shapes graph is not modified.
pub fn resolve_shape(shapes: &Graph, root: NamedOrBlankNodeRef<'_>) -> Result<Shape, ShapeError> {
    let root_term = Term::from(root.into_owned());
    let merged = merged_nodes(shapes, &root_term);
    let objects = |predicate: NamedNodeRef<'static>| -> Vec<Term> {
        let mut values = Vec::new();
        for node in &merged {
            for value in get_objects(shapes, node, predicate) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
        values
    };
    let first = |predicate: NamedNodeRef<'static>| merged.iter().find_map(|node| get_object(shapes, node, predicate));

    let mut target_classes = objects(shacl::TARGET_CLASS)
        .into_iter()
        .filter_map(|class| match class {
            Term::NamedNode(class) => Some(class),
            _ => None,
        })
        .collect::<Vec<_>>();
    target_classes.sort();
    let self_class = shapes.contains(TripleRef::new(root, rdf::TYPE, rdfs::CLASS));
    let target_class = if self_class {
        let NamedOrBlankNodeRef::NamedNode(root) = root else {
            return Err(ShapeError::invalid_term(
                root_term,
                "A shape used as a class must be an IRI",
            ));
        };
        root.into_owned()
    } else if target_classes.is_empty() {
        return Err(ShapeError::missing_target_class(root_term));
    } else {
        target_classes.remove(0)
    };
    target_classes.retain(|class| *class != target_class);

    let closed = merged
        .iter()
        .find_map(|node| get_boolean(shapes, node, shacl::CLOSED))
        .unwrap_or(false);
    let mut ignored_properties = Vec::new();
    if closed {
        if let Some(head) = first(shacl::IGNORED_PROPERTIES) {
            for item in parse_list(shapes, head, &root_term)? {
                if let Term::NamedNode(item) = item {
                    ignored_properties.push(item);
                }
            }
        }
    }

    let node_kind = first(shacl::NODE_KIND).and_then(|kind| match kind {
        Term::NamedNode(kind) => NodeKind::from_iri(kind.as_str()),
        _ => None,
    });

    let mut groups = property_groups(shapes);
    let mut properties = Vec::new();
    for property in objects(shacl::PROPERTY) {
        let descriptor = resolve_property(shapes, &property)?;
        let Some(group_id) = descriptor.group.clone() else {
            properties.push(descriptor);
            continue;
        };
        let Some(group) = groups.iter_mut().find(|group| group.id == group_id) else {
            return Err(ShapeError::unknown_group(property, group_id));
        };
        group.properties.push(descriptor);
    }
    properties.sort_by(|a, b| compare_order(a.order, b.order));
    for group in &mut groups {
        group
            .properties
            .sort_by(|a, b| compare_order(a.order, b.order));
    }

    Ok(Shape {
        id: root.into_owned(),
        target_class,
        secondary_classes: target_classes,
        closed,
        ignored_properties,
        groups,
        properties,
        name: merged
            .iter()
            .find_map(|node| get_string(shapes, node, shacl::NAME)),
        node_kind,
        order: merged
            .iter()
            .find_map(|node| get_number(shapes, node, shacl::ORDER)),
    })
}

/// Resolves every node shape of the shape set `label`, ordered by `sh:order` then identifier.
///
/// An unknown label resolves to no shape.
pub fn resolve_shape_set(shapes: &Graph, label: &str) -> Result<Vec<Shape>, ShapeError> {
    shape_set_members(shapes, label)
        .iter()
        .map(|root| resolve_shape(shapes, root.as_ref()))
        .collect()
}

/// Finds the shape targeting `class`, looking into `preferred` first then into the whole shapes graph.
pub fn shape_for_class(
    shapes: &Graph,
    class: &NamedNode,
    preferred: &[Shape],
) -> Result<Option<Shape>, ShapeError> {
    if let Some(shape) = preferred.iter().find(|shape| shape.target_class == *class) {
        return Ok(Some(shape.clone()));
    }
    if shapes.contains(TripleRef::new(class.as_ref(), rdf::TYPE, shacl::NODE_SHAPE)) {
        return resolve_shape(shapes, class.as_ref().into()).map(Some);
    }
    let mut candidates = shapes
        .subjects_for_predicate_object(shacl::TARGET_CLASS, class.as_ref())
        .filter_map(|subject| as_node(&Term::from(subject.into_owned())))
        .collect::<Vec<_>>();
    candidates.sort_by_key(ToString::to_string);
    for candidate in candidates {
        let shape = resolve_shape(shapes, candidate.as_ref())?;
        if shape.target_class == *class {
            return Ok(Some(shape));
        }
    }
    Ok(None)
}

/// The node shapes carrying `landrs:shapeSet label`, sorted.
fn shape_set_members(shapes: &Graph, label: &str) -> Vec<NamedOrBlankNode> {
    let mut members = Vec::new();
    let mut seen = FxHashSet::default();
    for triple in shapes.triples_for_predicate(landrs::SHAPE_SET) {
        let TermRef::Literal(literal) = triple.object else {
            continue;
        };
        if literal.value() != label || literal.language().is_some() {
            continue;
        }
        let Some(subject) = as_node(&Term::from(triple.subject.into_owned())) else {
            continue;
        };
        if shapes.contains(TripleRef::new(subject.as_ref(), rdf::TYPE, shacl::NODE_SHAPE))
            && seen.insert(subject.clone())
        {
            members.push(subject);
        }
    }
    let order_of = |node: &NamedOrBlankNode| {
        get_number(shapes, &Term::from(node.clone()), shacl::ORDER)
    };
    members.sort_by(|a, b| {
        compare_order(order_of(a), order_of(b)).then_with(|| a.to_string().cmp(&b.to_string()))
    });
    members
}

/// Every shape set label declared in the shapes graph, sorted.
pub fn shape_set_labels(shapes: &Graph) -> Vec<String> {
    let mut labels = shapes
        .triples_for_predicate(landrs::SHAPE_SET)
        .filter_map(|triple| match triple.object {
            TermRef::Literal(literal) => Some(literal.value().to_owned()),
            _ => None,
        })
        .collect::<Vec<_>>();
    labels.sort();
    labels.dedup();
    labels
}

/// The root followed by every node reachable through `sh:node`, cycles cut.
fn merged_nodes(shapes: &Graph, root: &Term) -> Vec<Term> {
    let mut nodes = vec![root.clone()];
    let mut position = 0;
    while position < nodes.len() {
        for linked in get_objects(shapes, &nodes[position], shacl::NODE) {
            if !nodes.contains(&linked) {
                nodes.push(linked);
            }
        }
        position += 1;
    }
    nodes
}

/// Every `sh:PropertyGroup` of the shapes graph, sorted by order then identifier.
fn property_groups(shapes: &Graph) -> Vec<PropertyGroup> {
    let mut groups = shapes
        .subjects_for_predicate_object(rdf::TYPE, shacl::PROPERTY_GROUP)
        .map(|subject| {
            let id = Term::from(subject.into_owned());
            PropertyGroup {
                label: get_object(shapes, &id, rdfs::LABEL).and_then(|label| match label {
                    Term::Literal(label) => Some(label.value().to_owned()),
                    _ => None,
                }),
                order: get_number(shapes, &id, shacl::ORDER),
                properties: Vec::new(),
                id,
            }
        })
        .collect::<Vec<_>>();
    groups.sort_by(|a, b| {
        compare_order(a.order, b.order).then_with(|| a.id.to_string().cmp(&b.id.to_string()))
    });
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{BlankNode, Literal, Triple};

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn node_shape(graph: &mut Graph, name: &str) -> NamedNode {
        let shape = ex(name);
        graph.insert(&Triple::new(shape.clone(), rdf::TYPE, shacl::NODE_SHAPE));
        shape
    }

    fn property(graph: &mut Graph, shape: &NamedNode, path: &str) -> BlankNode {
        let property = BlankNode::default();
        graph.insert(&Triple::new(shape.clone(), shacl::PROPERTY, property.clone()));
        graph.insert(&Triple::new(property.clone(), shacl::PATH, ex(path)));
        property
    }

    #[test]
    fn missing_target_class_is_fatal() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "FlightShape");
        assert!(matches!(
            resolve_shape(&graph, shape.as_ref().into()),
            Err(ShapeError::MissingTargetClass { .. })
        ));
    }

    #[test]
    fn self_typed_class_is_the_target() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "Flight");
        graph.insert(&Triple::new(shape.clone(), rdf::TYPE, rdfs::CLASS));
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Activity")));
        let resolved = resolve_shape(&graph, shape.as_ref().into()).unwrap();
        assert_eq!(resolved.target_class, shape);
        assert_eq!(resolved.secondary_classes, [ex("Activity")]);
        assert_eq!(resolved.label(), "Flight");
    }

    #[test]
    fn first_target_class_is_primary() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "SensorShape");
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Sensor")));
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Device")));
        let resolved = resolve_shape(&graph, shape.as_ref().into()).unwrap();
        assert_eq!(resolved.target_class, ex("Device"));
        assert_eq!(resolved.secondary_classes, [ex("Sensor")]);
        assert_eq!(resolved.classes().count(), 2);
    }

    #[test]
    fn linked_node_is_merged() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "FlightShape");
        let base = ex("BaseShape");
        let deeper = ex("DeeperShape");
        graph.insert(&Triple::new(shape.clone(), shacl::NODE, base.clone()));
        graph.insert(&Triple::new(base.clone(), shacl::NODE, deeper.clone()));
        graph.insert(&Triple::new(deeper.clone(), shacl::NODE, shape.clone()));
        graph.insert(&Triple::new(deeper.clone(), shacl::TARGET_CLASS, ex("Flight")));
        property(&mut graph, &base, "hasName");
        let resolved = resolve_shape(&graph, shape.as_ref().into()).unwrap();
        assert_eq!(resolved.target_class, ex("Flight"));
        assert_eq!(resolved.properties.len(), 1);
    }

    #[test]
    fn closure_is_captured() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "FlightShape");
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Flight")));
        graph.insert(&Triple::new(shape.clone(), shacl::CLOSED, Literal::from(true)));
        let list = BlankNode::default();
        graph.insert(&Triple::new(shape.clone(), shacl::IGNORED_PROPERTIES, list.clone()));
        graph.insert(&Triple::new(list.clone(), rdf::FIRST, rdf::TYPE));
        graph.insert(&Triple::new(list, rdf::REST, rdf::NIL));
        let resolved = resolve_shape(&graph, shape.as_ref().into()).unwrap();
        assert!(resolved.closed);
        assert_eq!(resolved.ignored_properties, [rdf::TYPE.into_owned()]);
    }

    #[test]
    fn properties_are_grouped_and_ordered() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "FlightShape");
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Flight")));
        let timing = ex("Timing");
        let general = ex("General");
        for (group, order) in [(&timing, 2), (&general, 1)] {
            graph.insert(&Triple::new(group.clone(), rdf::TYPE, shacl::PROPERTY_GROUP));
            graph.insert(&Triple::new(group.clone(), shacl::ORDER, Literal::from(order)));
        }
        let end = property(&mut graph, &shape, "endTime");
        graph.insert(&Triple::new(end.clone(), shacl::GROUP, timing.clone()));
        graph.insert(&Triple::new(end, shacl::ORDER, Literal::from(2)));
        let start = property(&mut graph, &shape, "startTime");
        graph.insert(&Triple::new(start.clone(), shacl::GROUP, timing.clone()));
        graph.insert(&Triple::new(start, shacl::ORDER, Literal::from(1)));
        property(&mut graph, &shape, "notes");

        let resolved = resolve_shape(&graph, shape.as_ref().into()).unwrap();
        assert_eq!(resolved.groups.len(), 2);
        assert_eq!(resolved.groups[0].id, Term::from(general));
        assert_eq!(resolved.groups[1].id, Term::from(timing));
        let names = resolved.groups[1]
            .properties
            .iter()
            .map(|property| property.name())
            .collect::<Vec<_>>();
        assert_eq!(names, ["startTime", "endTime"]);
        assert_eq!(resolved.properties.len(), 1);
        assert_eq!(
            resolved
                .all_properties()
                .map(|property| property.name())
                .collect::<Vec<_>>(),
            ["startTime", "endTime", "notes"]
        );
    }

    #[test]
    fn unknown_group_is_fatal() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "FlightShape");
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Flight")));
        let notes = property(&mut graph, &shape, "notes");
        graph.insert(&Triple::new(notes, shacl::GROUP, ex("Missing")));
        assert!(matches!(
            resolve_shape(&graph, shape.as_ref().into()),
            Err(ShapeError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn shape_set_is_ordered() {
        let mut graph = Graph::new();
        for (name, order) in [("B", None), ("A", Some(2)), ("C", Some(1))] {
            let shape = node_shape(&mut graph, name);
            graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex(name)));
            graph.insert(&Triple::new(
                shape.clone(),
                landrs::SHAPE_SET,
                Literal::from("Flight_input"),
            ));
            if let Some(order) = order {
                graph.insert(&Triple::new(shape, shacl::ORDER, Literal::from(order)));
            }
        }
        let set = resolve_shape_set(&graph, "Flight_input").unwrap();
        assert_eq!(
            set.iter().map(Shape::label).collect::<Vec<_>>(),
            ["C", "A", "B"]
        );
        assert!(resolve_shape_set(&graph, "Nope").unwrap().is_empty());
        assert_eq!(shape_set_labels(&graph), ["Flight_input"]);
    }

    #[test]
    fn shape_for_class_falls_back_to_whole_graph() {
        let mut graph = Graph::new();
        let shape = node_shape(&mut graph, "SensorShape");
        graph.insert(&Triple::new(shape, shacl::TARGET_CLASS, ex("Sensor")));
        let found = shape_for_class(&graph, &ex("Sensor"), &[]).unwrap();
        assert_eq!(found.map(|shape| shape.target_class), Some(ex("Sensor")));
        assert!(shape_for_class(&graph, &ex("Camera"), &[]).unwrap().is_none());
    }
}
