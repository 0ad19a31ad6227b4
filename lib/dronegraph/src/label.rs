//! Entity labels and the entity dictionary of a population pass.

use oxrdf::Term;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// An entity label: a base label with an optional multiplicity index.
///
/// `sensor-2` is the base `sensor` with index `2`. A trailing `-` segment that is not a number
/// is part of the base.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityLabel {
    base: String,
    index: Option<usize>,
}

impl EntityLabel {
    pub fn new(base: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            base: base.into(),
            index,
        }
    }

    /// A label without index.
    pub fn base_only(base: impl Into<String>) -> Self {
        Self::new(base, None)
    }

    pub fn parse(label: &str) -> Self {
        if let Some((base, index)) = label.rsplit_once('-') {
            if !base.is_empty() && !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = index.parse() {
                    return Self::new(base, Some(index));
                }
            }
        }
        Self::base_only(label)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The same base with another index.
    #[must_use]
    pub fn with_index(&self, index: Option<usize>) -> Self {
        Self::new(self.base.clone(), index)
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}-{index}", self.base),
            None => f.write_str(&self.base),
        }
    }
}

impl FromStr for EntityLabel {
    type Err = std::convert::Infallible;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(label))
    }
}

impl From<&str> for EntityLabel {
    fn from(label: &str) -> Self {
        Self::parse(label)
    }
}

/// Maps entity labels to graph terms, grouped by base label.
///
/// IRIs and blank nodes are entity references. Literals are either input values or,
/// under an entity label, seeds of entities still to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDictionary {
    entries: BTreeMap<String, BTreeMap<Option<usize>, Term>>,
}

impl EntityDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the term it replaces.
    pub fn insert(&mut self, label: impl Into<EntityLabel>, term: impl Into<Term>) -> Option<Term> {
        let label = label.into();
        self.entries
            .entry(label.base)
            .or_default()
            .insert(label.index, term.into())
    }

    pub fn get(&self, label: &EntityLabel) -> Option<&Term> {
        self.entries.get(&label.base)?.get(&label.index)
    }

    pub fn contains(&self, label: &EntityLabel) -> bool {
        self.get(label).is_some()
    }

    pub fn remove(&mut self, label: &EntityLabel) -> Option<Term> {
        let indexed = self.entries.get_mut(&label.base)?;
        let removed = indexed.remove(&label.index);
        if indexed.is_empty() {
            self.entries.remove(&label.base);
        }
        removed
    }

    /// Every entry sharing the base label `base`, unindexed first then by index.
    pub fn matching<'a>(&'a self, base: &'a str) -> impl Iterator<Item = (EntityLabel, &'a Term)> + 'a {
        self.entries
            .get(base)
            .into_iter()
            .flatten()
            .map(move |(index, term)| (EntityLabel::new(base, *index), term))
    }

    /// Every entry, sorted by label.
    pub fn iter(&self) -> impl Iterator<Item = (EntityLabel, &Term)> {
        self.entries.iter().flat_map(|(base, indexed)| {
            indexed
                .iter()
                .map(move |(index, term)| (EntityLabel::new(base.as_str(), *index), term))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Into<EntityLabel>, T: Into<Term>> FromIterator<(L, T)> for EntityDictionary {
    fn from_iter<I: IntoIterator<Item = (L, T)>>(iter: I) -> Self {
        let mut dictionary = Self::new();
        for (label, term) in iter {
            dictionary.insert(label, term);
        }
        dictionary
    }
}

impl<L: Into<EntityLabel>, T: Into<Term>> Extend<(L, T)> for EntityDictionary {
    fn extend<I: IntoIterator<Item = (L, T)>>(&mut self, iter: I) {
        for (label, term) in iter {
            self.insert(label, term);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, NamedNode};

    #[test]
    fn parses_multiplicity_suffix() {
        assert_eq!(EntityLabel::parse("sensor-2"), EntityLabel::new("sensor", Some(2)));
        assert_eq!(EntityLabel::parse("sensor"), EntityLabel::base_only("sensor"));
        assert_eq!(
            EntityLabel::parse("Flight-input"),
            EntityLabel::base_only("Flight-input")
        );
        assert_eq!(EntityLabel::parse("-3"), EntityLabel::base_only("-3"));
        assert_eq!(EntityLabel::parse("a-b-10").base(), "a-b");
        assert_eq!(EntityLabel::new("sensor", Some(1)).to_string(), "sensor-1");
    }

    #[test]
    fn matching_groups_by_base() {
        let sensor = NamedNode::new_unchecked("http://example.org/sensor");
        let dictionary: EntityDictionary = [
            ("sensor-1", Term::from(sensor.clone())),
            ("sensor-0", sensor.clone().into()),
            ("sensor", sensor.into()),
            ("sensors", Literal::from("other").into()),
        ]
        .into_iter()
        .collect();
        let labels = dictionary
            .matching("sensor")
            .map(|(label, _)| label.to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, ["sensor", "sensor-0", "sensor-1"]);
        assert_eq!(dictionary.len(), 4);
    }

    #[test]
    fn remove_drops_empty_bases() {
        let mut dictionary = EntityDictionary::new();
        dictionary.insert("Flight", Literal::from("My First Flight"));
        assert!(dictionary.remove(&"Flight".into()).is_some());
        assert!(dictionary.is_empty());
        assert_eq!(dictionary.matching("Flight").count(), 0);
    }
}
