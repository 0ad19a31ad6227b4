//! Form requirements: the boundary properties a caller must supply.

use oxrdf::{Graph, NamedOrBlankNode, Term};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Config, FieldMode};
use crate::constraint::term_to_string;
use crate::error::ShapeError;
use crate::model::{PropertyDescriptor, ScalarValue, compare_order};
use crate::shape::resolve_shape_set;
use crate::store::TripleStore;

/// One field of a dynamic input form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub node_kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_value: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Allowed values: `sh:in`, files or class instances.
    pub options: Vec<FieldOption>,
}

/// An allowed value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }
}

impl FieldDescriptor {
    fn new(descriptor: &PropertyDescriptor) -> Self {
        Self {
            name: descriptor.name().to_owned(),
            path: descriptor
                .path
                .as_ref()
                .map(|path| path.as_str().to_owned())
                .unwrap_or_default(),
            order: descriptor.order,
            datatype: descriptor
                .datatype
                .as_ref()
                .map(|datatype| datatype.as_str().to_owned()),
            class: descriptor
                .class
                .as_ref()
                .map(|class| class.as_str().to_owned()),
            node_kind: descriptor.node_kind.to_string(),
            min_count: descriptor.min_count,
            max_count: descriptor.max_count,
            min: descriptor.min,
            max: descriptor.max,
            has_value: descriptor.has_value.clone(),
            default_value: descriptor.default_value.clone(),
            severity: descriptor.severity.map(|severity| severity.to_string()),
            group: descriptor.group.as_ref().map(term_to_string),
            options: descriptor
                .in_values
                .iter()
                .map(FieldOption::same)
                .collect(),
        }
    }
}

/// Lists the fields of the boundary properties of the shape set `shape_set`.
///
/// Properties are selected by their `landrs:role` being [`Config::graph_boundary`],
/// deduplicated by name (first one wins) and sorted by order.
pub fn form_requirements(
    shapes: &Graph,
    store: &impl TripleStore,
    shape_set: &str,
    config: &Config,
) -> Result<Vec<FieldDescriptor>, ShapeError> {
    let boundary = config.graph_boundary();
    let mut seen = FxHashSet::default();
    let mut fields = Vec::new();
    for shape in resolve_shape_set(shapes, shape_set)? {
        for property in shape.all_properties() {
            if property.role.as_deref() != Some(boundary) || property.name.is_none() {
                continue;
            }
            if !seen.insert(property.name().to_owned()) {
                debug!("Skipping duplicated field {}", property.name());
                continue;
            }
            let mut field = FieldDescriptor::new(property);
            match config.field_mode(&field.name) {
                Some(FieldMode::Substitute) => {
                    if let Some(value) = config.get(&field.name) {
                        field.default_value = Some(ScalarValue::String(value.to_owned()));
                    } else {
                        warn!("Field {} is in SUBSTITUTE mode without a configured value", field.name);
                    }
                }
                Some(FieldMode::Files) => {
                    if let Some(directory) = config.get(&field.name) {
                        field.options =
                            list_files(Path::new(directory), config.file_extension(&field.name));
                    } else {
                        warn!("Field {} is in FILES mode without a configured directory", field.name);
                    }
                }
                None => (),
            }
            if let Some(class) = &property.class {
                field.options = store
                    .instances_of(class.as_ref())
                    .into_iter()
                    .map(|instance| instance_option(store, instance))
                    .collect();
            }
            fields.push(field);
        }
    }
    fields.sort_by(|a, b| compare_order(a.order, b.order));
    Ok(fields)
}

fn instance_option(store: &impl TripleStore, instance: NamedOrBlankNode) -> FieldOption {
    let value = term_to_string(&Term::from(instance.clone()));
    FieldOption {
        label: store
            .label_of(instance.as_ref())
            .unwrap_or_else(|| value.clone()),
        value,
    }
}

/// Regular files below `directory`, sorted by path, labelled by file name.
fn list_files(directory: &Path, extension: Option<&str>) -> Vec<FieldOption> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("Cannot list {}: {error}", directory.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(extension) = extension {
            if entry.path().extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
        }
        files.push(FieldOption {
            value: entry.path().display().to_string(),
            label: entry.file_name().to_string_lossy().into_owned(),
        });
    }
    files.sort_by(|a, b| a.value.cmp(&b.value));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::vocab::{landrs, shacl};
    use oxrdf::vocab::{rdf, rdfs, xsd};
    use oxrdf::{BlankNode, Literal, NamedNode, Triple};
    use std::fs;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    fn flight_input_shape(graph: &mut Graph) -> NamedNode {
        let shape = ex("FlightShape");
        graph.insert(&Triple::new(shape.clone(), rdf::TYPE, shacl::NODE_SHAPE));
        graph.insert(&Triple::new(shape.clone(), shacl::TARGET_CLASS, ex("Flight")));
        graph.insert(&Triple::new(
            shape.clone(),
            landrs::SHAPE_SET,
            Literal::from("Flight_input"),
        ));
        shape
    }

    fn boundary_property(graph: &mut Graph, shape: &NamedNode, path: &str, order: i32) -> BlankNode {
        let property = BlankNode::default();
        graph.insert(&Triple::new(shape.clone(), shacl::PROPERTY, property.clone()));
        graph.insert(&Triple::new(property.clone(), shacl::PATH, ex(path)));
        graph.insert(&Triple::new(property.clone(), shacl::ORDER, Literal::from(order)));
        graph.insert(&Triple::new(
            property.clone(),
            landrs::ROLE,
            Literal::from("boundary"),
        ));
        property
    }

    #[test]
    fn selects_boundary_properties_in_order() {
        let mut graph = Graph::new();
        let shape = flight_input_shape(&mut graph);
        boundary_property(&mut graph, &shape, "description", 2);
        boundary_property(&mut graph, &shape, "name", 1);
        let internal = BlankNode::default();
        graph.insert(&Triple::new(shape.clone(), shacl::PROPERTY, internal.clone()));
        graph.insert(&Triple::new(internal, shacl::PATH, ex("startTime")));

        let fields =
            form_requirements(&graph, &MemoryStore::new(), "Flight_input", &Config::new()).unwrap();
        assert_eq!(
            fields.iter().map(|field| field.name.as_str()).collect::<Vec<_>>(),
            ["name", "description"]
        );
    }

    #[test]
    fn duplicated_names_keep_the_first() {
        let mut graph = Graph::new();
        let shape = flight_input_shape(&mut graph);
        graph.insert(&Triple::new(shape.clone(), shacl::ORDER, Literal::from(1)));
        let first = boundary_property(&mut graph, &shape, "name", 1);
        graph.insert(&Triple::new(first, shacl::DATATYPE, xsd::STRING));
        let other = ex("MissionShape");
        graph.insert(&Triple::new(other.clone(), rdf::TYPE, shacl::NODE_SHAPE));
        graph.insert(&Triple::new(other.clone(), shacl::TARGET_CLASS, ex("Mission")));
        graph.insert(&Triple::new(other.clone(), shacl::ORDER, Literal::from(2)));
        graph.insert(&Triple::new(
            other.clone(),
            landrs::SHAPE_SET,
            Literal::from("Flight_input"),
        ));
        boundary_property(&mut graph, &other, "name", 5);

        let fields =
            form_requirements(&graph, &MemoryStore::new(), "Flight_input", &Config::new()).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].order, Some(1.));
        assert_eq!(fields[0].datatype.as_deref(), Some(xsd::STRING.as_str()));
    }

    #[test]
    fn substitute_mode_sets_default() {
        let mut graph = Graph::new();
        let shape = flight_input_shape(&mut graph);
        boundary_property(&mut graph, &shape, "description", 1);
        let config: Config = [
            ("description_mode", "SUBSTITUTE"),
            ("description", "Survey flight"),
        ]
        .into_iter()
        .collect();
        let fields = form_requirements(&graph, &MemoryStore::new(), "Flight_input", &config).unwrap();
        assert_eq!(
            fields[0].default_value,
            Some(ScalarValue::String("Survey flight".into()))
        );
    }

    #[test]
    fn files_mode_lists_files() {
        let directory = tempfile::tempdir().unwrap();
        fs::write(directory.path().join("b.txt"), "").unwrap();
        fs::write(directory.path().join("a.txt"), "").unwrap();
        fs::write(directory.path().join("notes.md"), "").unwrap();
        fs::create_dir(directory.path().join("nested")).unwrap();
        fs::write(directory.path().join("nested").join("c.txt"), "").unwrap();

        let mut graph = Graph::new();
        let shape = flight_input_shape(&mut graph);
        boundary_property(&mut graph, &shape, "mission_file", 1);
        let mut config = Config::new();
        config.insert("mission_file_mode", "FILES");
        config.insert("mission_file", directory.path().display().to_string());
        config.insert("mission_file_extension", "txt");
        let fields = form_requirements(&graph, &MemoryStore::new(), "Flight_input", &config).unwrap();
        assert_eq!(
            fields[0]
                .options
                .iter()
                .map(|option| option.label.as_str())
                .collect::<Vec<_>>(),
            ["a.txt", "b.txt", "c.txt"]
        );
    }

    #[test]
    fn class_options_use_labels() {
        let mut graph = Graph::new();
        let shape = flight_input_shape(&mut graph);
        let sensor = boundary_property(&mut graph, &shape, "sensor", 1);
        graph.insert(&Triple::new(sensor, shacl::CLASS, ex("Sensor")));

        let mut store = MemoryStore::new();
        store
            .add(ex("camera").as_ref().into(), rdf::TYPE, ex("Sensor").as_ref().into())
            .unwrap();
        store
            .add(
                ex("camera").as_ref().into(),
                rdfs::LABEL,
                Literal::from("Camera").as_ref().into(),
            )
            .unwrap();
        store
            .add(ex("lidar").as_ref().into(), rdf::TYPE, ex("Sensor").as_ref().into())
            .unwrap();
        let fields = form_requirements(&graph, &store, "Flight_input", &Config::new()).unwrap();
        assert_eq!(
            fields[0].options,
            [
                FieldOption {
                    value: ex("camera").into_string(),
                    label: "Camera".into()
                },
                FieldOption::same(ex("lidar").into_string()),
            ]
        );
    }

    #[test]
    fn serializes_as_camel_case_json() {
        let mut graph = Graph::new();
        let shape = flight_input_shape(&mut graph);
        boundary_property(&mut graph, &shape, "name", 1);
        let fields =
            form_requirements(&graph, &MemoryStore::new(), "Flight_input", &Config::new()).unwrap();
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json[0]["nodeKind"], "IRIOrLiteral");
        assert_eq!(json[0]["path"], "http://example.org/name");
    }
}
