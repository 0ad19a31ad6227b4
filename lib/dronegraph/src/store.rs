//! The triple store the engine reads from and writes to.

use oxrdf::vocab::{rdf, rdfs};
use oxrdf::{Graph, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Term, TermRef, Triple, TripleRef};
use std::sync::{Arc, PoisonError, RwLock};

use crate::constraint::as_node;
use crate::error::StoreError;

/// A mutable set of triples.
///
/// Only [`add`](Self::add), [`set`](Self::set), [`remove`](Self::remove),
/// [`triples_matching`](Self::triples_matching) and [`new_identifier`](Self::new_identifier)
/// must be implemented.
pub trait TripleStore {
    /// Appends a triple. Predicates are multi-valued.
    fn add(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> Result<(), StoreError>;

    /// Replaces every `(subject, predicate, _)` triple with the given one.
    fn set(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> Result<(), StoreError>;

    /// Removes a triple. Returns `false` if it was not there.
    fn remove(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> Result<bool, StoreError>;

    /// Returns the triples matching a pattern, `None` matching anything.
    fn triples_matching(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Vec<Triple>;

    /// Returns a fresh identifier, never returned before.
    fn new_identifier(&mut self) -> String;

    /// The first object of `(subject, predicate, _)`.
    fn value(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Option<Term> {
        self.triples_matching(Some(subject), Some(predicate), None)
            .into_iter()
            .next()
            .map(|triple| triple.object)
    }

    /// Every object of `(subject, predicate, _)`.
    fn objects(&self, subject: NamedOrBlankNodeRef<'_>, predicate: NamedNodeRef<'_>) -> Vec<Term> {
        self.triples_matching(Some(subject), Some(predicate), None)
            .into_iter()
            .map(|triple| triple.object)
            .collect()
    }

    fn contains(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> bool {
        !self
            .triples_matching(Some(subject), Some(predicate), Some(object))
            .is_empty()
    }

    /// The instances of `class`, sorted by identifier.
    fn instances_of(&self, class: NamedNodeRef<'_>) -> Vec<NamedOrBlankNode> {
        let mut instances = self
            .triples_matching(None, Some(rdf::TYPE), Some(class.into()))
            .into_iter()
            .filter_map(|triple| as_node(&Term::from(triple.subject)))
            .collect::<Vec<_>>();
        instances.sort_by_key(ToString::to_string);
        instances.dedup();
        instances
    }

    /// The `rdfs:label` of a node.
    fn label_of(&self, node: NamedOrBlankNodeRef<'_>) -> Option<String> {
        match self.value(node, rdfs::LABEL)? {
            Term::Literal(label) => Some(label.value().to_owned()),
            _ => None,
        }
    }
}

/// An in-memory [`TripleStore`] backed by a [`Graph`].
///
/// Identifiers are 128 random bits in lowercase hexadecimal.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    graph: Graph,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

impl From<Graph> for MemoryStore {
    fn from(graph: Graph) -> Self {
        Self { graph }
    }
}

impl TripleStore for MemoryStore {
    fn add(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> Result<(), StoreError> {
        self.graph
            .insert(TripleRef::new(subject, predicate, object));
        Ok(())
    }

    fn set(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> Result<(), StoreError> {
        let previous = self
            .graph
            .objects_for_subject_predicate(subject, predicate)
            .map(TermRef::into_owned)
            .collect::<Vec<_>>();
        for previous in &previous {
            self.graph
                .remove(TripleRef::new(subject, predicate, previous.as_ref()));
        }
        self.graph
            .insert(TripleRef::new(subject, predicate, object));
        Ok(())
    }

    fn remove(
        &mut self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
        object: TermRef<'_>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .graph
            .remove(TripleRef::new(subject, predicate, object)))
    }

    fn triples_matching(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Vec<Triple> {
        let matches = |triple: &TripleRef<'_>| {
            predicate.is_none_or(|predicate| triple.predicate == predicate)
                && object.is_none_or(|object| triple.object == object)
        };
        match (subject, predicate, object) {
            (Some(subject), _, _) => self
                .graph
                .triples_for_subject(subject)
                .filter(matches)
                .map(TripleRef::into_owned)
                .collect(),
            (None, Some(predicate), _) => self
                .graph
                .triples_for_predicate(predicate)
                .filter(matches)
                .map(TripleRef::into_owned)
                .collect(),
            (None, None, Some(object)) => self
                .graph
                .triples_for_object(object)
                .map(TripleRef::into_owned)
                .collect(),
            (None, None, None) => self.graph.iter().map(TripleRef::into_owned).collect(),
        }
    }

    fn new_identifier(&mut self) -> String {
        format!("{:032x}", rand::random::<u128>())
    }
}

/// A [`TripleStore`] shared between threads.
///
/// Every mutation goes through [`transaction`](Self::transaction), which holds the single writer lock
/// for the whole closure, so a resolve, validate and populate sequence is never interleaved with another writer.
#[derive(Debug, Default)]
pub struct SharedStore<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TripleStore> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Runs `f` with exclusive access to the store.
    pub fn transaction<T, E: From<StoreError>>(
        &self,
        f: impl FnOnce(&mut S) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut store = self.inner.write().map_err(poison_error)?;
        f(&mut store)
    }

    /// Runs `f` with shared access to the store. Readers run concurrently with each other.
    pub fn read<T, E: From<StoreError>>(&self, f: impl FnOnce(&S) -> Result<T, E>) -> Result<T, E> {
        let store = self.inner.read().map_err(poison_error)?;
        f(&store)
    }
}

fn poison_error<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Poisoned
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, NamedNode};
    use std::thread;

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{name}"))
    }

    #[test]
    fn add_appends_and_set_replaces() {
        let mut store = MemoryStore::new();
        let flight = ex("flight");
        let end = ex("endTime");
        store
            .add(flight.as_ref().into(), end.as_ref(), Literal::from("1").as_ref().into())
            .unwrap();
        store
            .add(flight.as_ref().into(), end.as_ref(), Literal::from("2").as_ref().into())
            .unwrap();
        assert_eq!(store.objects(flight.as_ref().into(), end.as_ref()).len(), 2);
        store
            .set(flight.as_ref().into(), end.as_ref(), Literal::from("3").as_ref().into())
            .unwrap();
        assert_eq!(
            store.objects(flight.as_ref().into(), end.as_ref()),
            [Term::from(Literal::from("3"))]
        );
        assert!(
            store
                .remove(flight.as_ref().into(), end.as_ref(), Literal::from("3").as_ref().into())
                .unwrap()
        );
        assert!(
            !store
                .remove(flight.as_ref().into(), end.as_ref(), Literal::from("3").as_ref().into())
                .unwrap()
        );
        assert!(store.is_empty());
    }

    #[test]
    fn pattern_matching() {
        let mut store = MemoryStore::new();
        for name in ["a", "b"] {
            store
                .add(ex(name).as_ref().into(), rdf::TYPE, ex("Sensor").as_ref().into())
                .unwrap();
        }
        store
            .add(ex("a").as_ref().into(), rdfs::LABEL, Literal::from("Camera").as_ref().into())
            .unwrap();
        assert_eq!(store.triples_matching(None, None, None).len(), 3);
        assert_eq!(
            store
                .triples_matching(None, None, Some(ex("Sensor").as_ref().into()))
                .len(),
            2
        );
        assert_eq!(
            store.instances_of(ex("Sensor").as_ref()),
            [NamedOrBlankNode::from(ex("a")), ex("b").into()]
        );
        assert_eq!(store.label_of(ex("a").as_ref().into()).as_deref(), Some("Camera"));
        assert_eq!(store.label_of(ex("b").as_ref().into()), None);
        assert!(store.contains(ex("b").as_ref().into(), rdf::TYPE, ex("Sensor").as_ref().into()));
    }

    #[test]
    fn identifiers_are_fresh() {
        let mut store = MemoryStore::new();
        let first = store.new_identifier();
        assert_eq!(first.len(), 32);
        assert_ne!(first, store.new_identifier());
    }

    #[test]
    fn transactions_are_serialized() {
        let shared = SharedStore::new(MemoryStore::new());
        let threads = (0..8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.transaction(|store| {
                        let subject = ex("counter");
                        let count = store.objects(subject.as_ref().into(), rdf::VALUE).len();
                        store.add(
                            subject.as_ref().into(),
                            rdf::VALUE,
                            Literal::from(format!("{i}-{count}")).as_ref().into(),
                        )
                    })
                })
            })
            .collect::<Vec<_>>();
        for thread in threads {
            thread.join().unwrap().unwrap();
        }
        let counts = shared
            .read(|store| Ok::<_, StoreError>(store.objects(ex("counter").as_ref().into(), rdf::VALUE)))
            .unwrap()
            .into_iter()
            .map(|value| match value {
                Term::Literal(value) => value.value().rsplit('-').next().unwrap_or_default().to_owned(),
                _ => String::new(),
            })
            .collect::<std::collections::BTreeSet<_>>();
        assert_eq!(counts.len(), 8);
    }

    #[test]
    fn poisoned_lock_is_an_error() {
        let shared = SharedStore::new(MemoryStore::new());
        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            poisoner.transaction(|_| -> Result<(), StoreError> { panic!("writer failure") })
        })
        .join();
        assert!(matches!(
            shared.transaction(|_| Ok::<_, StoreError>(())),
            Err(StoreError::Poisoned)
        ));
    }
}
