//! Instance population: turns an entity dictionary into typed, linked graph nodes.

use oxrdf::vocab::{rdf, xsd};
use oxrdf::{BlankNode, Graph, Literal, NamedNode, NamedOrBlankNode, Term};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::config::Config;
use crate::constraint::as_node;
use crate::error::{ShapeError, StoreError};
use crate::label::{EntityDictionary, EntityLabel};
use crate::model::{NodeKind, PropertyDescriptor, ScalarValue, Severity, Shape, local_name};
use crate::shape::{resolve_shape_set, shape_for_class};
use crate::store::TripleStore;
use crate::validate::{ConstraintReport, ValidationOutcome, validate_constraints};

/// Maximum nesting of shapes created while linking relational properties.
pub const MAX_DEPTH: usize = 50;

/// Result of a population pass that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulateOutcome {
    /// Every shape of the set has been populated.
    Populated {
        /// Nodes created during the pass, in creation order.
        created: Vec<NamedOrBlankNode>,
    },
    /// The shape set resolves to no shape.
    NotFound { shape_set: String },
    /// The constraint pass of [`validate_and_populate`] failed. Nothing has been written.
    Rejected(ConstraintReport),
}

impl PopulateOutcome {
    pub fn is_populated(&self) -> bool {
        matches!(self, Self::Populated { .. })
    }
}

/// Populates the shape set `shape_set` from `entities`.
///
/// For each shape, every entry of `entities` sharing the shape label is populated, then the entry
/// `label` (or `label-<multiplicity>`) if there was none or if a multiplicity is given.
/// Existing IRI and blank node entries are reused. Other entries are replaced by new nodes.
///
/// ```
/// use dronegraph::{Config, EntityDictionary, MemoryStore, populate};
/// use oxrdf::vocab::rdf;
/// use oxrdf::{Graph, Literal, NamedNode, Triple};
///
/// let mut shapes = Graph::new();
/// let flight = NamedNode::new("http://schema.landrs.org/schema/Flight")?;
/// shapes.insert(&Triple::new(flight.clone(), rdf::TYPE, dronegraph::vocab::shacl::NODE_SHAPE));
/// shapes.insert(&Triple::new(flight.clone(), dronegraph::vocab::shacl::TARGET_CLASS, flight.clone()));
/// shapes.insert(&Triple::new(flight.clone(), dronegraph::vocab::landrs::SHAPE_SET, Literal::from("Flight_input")));
///
/// let mut store = MemoryStore::new();
/// let mut entities = EntityDictionary::new();
/// let outcome = populate(&shapes, &mut store, &mut entities, "Flight_input", None, &Config::new())?;
/// assert!(outcome.is_populated());
/// assert_eq!(entities.len(), 1);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
pub fn populate<S: TripleStore>(
    shapes: &Graph,
    store: &mut S,
    entities: &mut EntityDictionary,
    shape_set: &str,
    multiplicity: Option<usize>,
    config: &Config,
) -> Result<PopulateOutcome, ShapeError> {
    let set = resolve_shape_set(shapes, shape_set)?;
    if set.is_empty() {
        debug!("No shape in shape set {shape_set}");
        return Ok(PopulateOutcome::NotFound {
            shape_set: shape_set.to_owned(),
        });
    }
    let mut populator = Populator {
        shapes,
        set: &set,
        store,
        entities,
        config,
        multiplicity,
        seeds: FxHashMap::default(),
        created: Vec::new(),
    };
    for shape in &set {
        let labels = populator
            .entities
            .matching(shape.label())
            .map(|(label, _)| label)
            .collect::<Vec<_>>();
        for label in &labels {
            populator.populate_label(shape, label, 0)?;
        }
        if labels.is_empty() || multiplicity.is_some() {
            populator.populate_label(shape, &EntityLabel::new(shape.label(), multiplicity), 0)?;
        }
    }
    let created = populator.created;
    info!(
        "Populated shape set {shape_set}: {} shapes, {} new nodes",
        set.len(),
        created.len()
    );
    Ok(PopulateOutcome::Populated { created })
}

/// Checks the constraint set `constraint_set`, if any, then populates `shape_set`.
///
/// Run it inside [`SharedStore::transaction`](crate::SharedStore::transaction) so that no other
/// writer runs between the two passes.
pub fn validate_and_populate<S: TripleStore>(
    shapes: &Graph,
    store: &mut S,
    entities: &mut EntityDictionary,
    shape_set: &str,
    constraint_set: Option<&str>,
    multiplicity: Option<usize>,
    config: &Config,
) -> Result<PopulateOutcome, ShapeError> {
    if let Some(constraint_set) = constraint_set {
        match validate_constraints(shapes, &*store, constraint_set, entities)? {
            ValidationOutcome::Conforms => (),
            ValidationOutcome::Violated(report) => return Ok(PopulateOutcome::Rejected(report)),
            ValidationOutcome::NotFound { shape_set } => {
                return Ok(PopulateOutcome::NotFound { shape_set });
            }
        }
    }
    populate(shapes, store, entities, shape_set, multiplicity, config)
}

struct Populator<'a, S> {
    shapes: &'a Graph,
    set: &'a [Shape],
    store: &'a mut S,
    entities: &'a mut EntityDictionary,
    config: &'a Config,
    multiplicity: Option<usize>,
    /// Seeds replaced by their node during this pass, for later visits of the same label.
    seeds: FxHashMap<EntityLabel, Literal>,
    created: Vec<NamedOrBlankNode>,
}

impl<S: TripleStore> Populator<'_, S> {
    fn populate_label(
        &mut self,
        shape: &Shape,
        label: &EntityLabel,
        depth: usize,
    ) -> Result<NamedOrBlankNode, ShapeError> {
        if depth > MAX_DEPTH {
            return Err(ShapeError::MaxRecursionDepth {
                label: label.to_string(),
                depth: MAX_DEPTH,
            });
        }
        let entry = self.entities.get(label).cloned();
        let (node, seed) = match entry.as_ref().map(|term| (as_node(term), term)) {
            Some((Some(node), _)) => {
                debug!("Reusing {node} for {label}");
                (node, self.seeds.get(label).cloned())
            }
            Some((None, Term::Literal(seed))) => {
                self.seeds.insert(label.clone(), seed.clone());
                (self.create(shape, label)?, Some(seed.clone()))
            }
            _ => (self.create(shape, label)?, None),
        };
        for property in shape.all_properties() {
            self.populate_property(&node, label, property, seed.as_ref(), depth)?;
        }
        Ok(node)
    }

    fn create(&mut self, shape: &Shape, label: &EntityLabel) -> Result<NamedOrBlankNode, ShapeError> {
        let node = if shape.node_kind == Some(NodeKind::BlankNode) {
            NamedOrBlankNode::from(BlankNode::default())
        } else {
            let iri = format!("{}{}", self.config.base(), self.store.new_identifier());
            NamedNode::new(&iri)
                .map_err(|e| StoreError::InvalidIdentifier {
                    iri,
                    message: e.to_string(),
                })?
                .into()
        };
        for class in shape.classes() {
            self.store
                .add(node.as_ref(), rdf::TYPE, class.as_ref().into())?;
        }
        self.entities.insert(label.clone(), node.clone());
        self.created.push(node.clone());
        debug!("Created {node} for {label}");
        Ok(node)
    }

    fn populate_property(
        &mut self,
        node: &NamedOrBlankNode,
        label: &EntityLabel,
        property: &PropertyDescriptor,
        seed: Option<&Literal>,
        depth: usize,
    ) -> Result<(), ShapeError> {
        let Some(path) = &property.path else {
            return Ok(());
        };
        if let Some(class) = &property.class {
            return self.link(node, property, path, class, depth);
        }
        if let Some(datatype) = &property.datatype {
            let Some(value) = self.literal_value(label, property, seed) else {
                if !self.store.objects(node.as_ref(), path.as_ref()).is_empty() {
                    debug!("{} of {label} already set, keeping it", property.name());
                    return Ok(());
                }
                if property.severity == Some(Severity::Violation) {
                    return Err(ShapeError::MissingValue {
                        label: label.to_string(),
                        name: property.name().to_owned(),
                        path: path.clone(),
                    });
                }
                debug!("No value for {} of {label}, skipping", property.name());
                return Ok(());
            };
            return self.write(node, property, path, retype(value, datatype));
        }
        if let Some(value) = &property.has_value {
            return self.write(node, property, path, value.to_term());
        }
        debug!("Nothing to write for {} of {label}", property.name());
        Ok(())
    }

    /// `<name>-<index>`, then `<name>`, then the seed of the entity, then the fixed value.
    fn literal_value(
        &self,
        label: &EntityLabel,
        property: &PropertyDescriptor,
        seed: Option<&Literal>,
    ) -> Option<Term> {
        let name = property.name();
        label
            .index()
            .and_then(|index| self.entities.get(&EntityLabel::new(name, Some(index))))
            .or_else(|| self.entities.get(&EntityLabel::base_only(name)))
            .cloned()
            .or_else(|| {
                seed.filter(|_| name == self.config.name_substitute())
                    .map(|seed| seed.clone().into())
            })
            .or_else(|| property.has_value.as_ref().map(ScalarValue::to_term))
    }

    fn link(
        &mut self,
        node: &NamedOrBlankNode,
        property: &PropertyDescriptor,
        path: &NamedNode,
        class: &NamedNode,
        depth: usize,
    ) -> Result<(), ShapeError> {
        let target = shape_for_class(self.shapes, class, self.set)?;
        let expected = target.as_ref().map_or_else(
            || local_name(class.as_str()).to_owned(),
            |shape| shape.label().to_owned(),
        );
        let matches = self
            .entities
            .matching(&expected)
            .map(|(label, term)| (label, term.clone()))
            .collect::<Vec<_>>();
        let mut objects = Vec::new();
        if matches.is_empty() {
            if let Some(target) = &target {
                let label = EntityLabel::new(expected.as_str(), self.multiplicity);
                objects.push(self.populate_label(target, &label, depth + 1)?);
            } else {
                debug!("No {expected} to link through {path}");
            }
        }
        for (label, term) in matches {
            if let Some(object) = as_node(&term) {
                objects.push(object);
            } else if let Some(target) = &target {
                objects.push(self.populate_label(target, &label, depth + 1)?);
            } else {
                debug!("Cannot create {label}: no shape targets {class}");
            }
        }
        for object in objects {
            debug!("Linking {node} to {object} through {path}");
            self.write(node, property, path, object.into())?;
        }
        Ok(())
    }

    /// Appends, or replaces one value when `sh:maxCount` values are already there.
    ///
    /// With `sh:maxCount 1` the single value is overwritten. Above it, the smallest existing value
    /// in N-Triples order is dropped so that the path keeps `sh:maxCount` values.
    fn write(
        &mut self,
        node: &NamedOrBlankNode,
        property: &PropertyDescriptor,
        path: &NamedNode,
        value: Term,
    ) -> Result<(), ShapeError> {
        let mut existing = self.store.objects(node.as_ref(), path.as_ref());
        if existing.contains(&value) {
            return Ok(());
        }
        let full = property
            .max_count
            .is_some_and(|max| u64::try_from(existing.len()).unwrap_or(u64::MAX) >= max);
        if !full {
            self.store.add(node.as_ref(), path.as_ref(), value.as_ref())?;
        } else if property.max_count == Some(1) || existing.len() == 1 {
            self.store.set(node.as_ref(), path.as_ref(), value.as_ref())?;
        } else {
            existing.sort_by_key(ToString::to_string);
            if let Some(replaced) = existing.first() {
                debug!("Replacing {replaced} with {value} on {node} {path}");
                self.store
                    .remove(node.as_ref(), path.as_ref(), replaced.as_ref())?;
            }
            self.store.add(node.as_ref(), path.as_ref(), value.as_ref())?;
        }
        Ok(())
    }
}

/// Gives simple literals the declared datatype.
fn retype(value: Term, datatype: &NamedNode) -> Term {
    match value {
        Term::Literal(literal)
            if literal.datatype() == xsd::STRING
                && literal.language().is_none()
                && datatype.as_ref() != xsd::STRING =>
        {
            Literal::new_typed_literal(literal.value(), datatype.clone()).into()
        }
        value => value,
    }
}
