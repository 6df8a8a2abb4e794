//! Property correlation table
//!
//! Aggregates an entity stream into per-property statistics: how often a
//! property appears, its datatype, and how often it shares an entity with
//! each other property. Memory scales with the property vocabulary, which
//! is tiny next to the entity count, so the whole table stays resident
//! while entities stream through.

use crate::entity::Entity;
use rustc_hash::FxHashMap;
use std::fmt;

/// Aggregate record for one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyStats {
    /// Datatype from the first claim seen for this property. Later claims
    /// never overwrite it, even when they disagree.
    pub datatype: String,
    /// Total number of claims with this property across all entities
    pub appearances: u64,
    /// Same-entity claim counts per partner property
    pub co_occurrences: FxHashMap<String, u64>,
}

impl PropertyStats {
    fn new(datatype: String) -> Self {
        Self {
            datatype,
            appearances: 0,
            co_occurrences: FxHashMap::default(),
        }
    }

    /// Co-occurrence count with `partner`, zero when never seen together
    pub fn co_occurrences_with(&self, partner: &str) -> u64 {
        self.co_occurrences.get(partner).copied().unwrap_or(0)
    }
}

/// Co-occurrence statistics over a stream of entities
///
/// Counting rule: each claim counts one appearance for its property, and
/// one co-occurrence with every other claim of the same entity whose
/// property differs. Two claims sharing a property co-occur with the rest
/// of the entity twice but never with each other, which keeps the table
/// symmetric: `co_occurrences(a, b) == co_occurrences(b, a)`.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    properties: FxHashMap<String, PropertyStats>,
}

impl CorrelationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from an entity stream
    pub fn from_entities<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut table = Self::new();
        for entity in entities {
            table.add_entity(&entity);
        }
        table
    }

    /// Fold one entity into the table. Quadratic in the entity's claim
    /// count, which is small in practice.
    pub fn add_entity(&mut self, entity: &Entity) {
        for claim in &entity.claims {
            let stats = self
                .properties
                .entry(claim.property.clone())
                .or_insert_with(|| PropertyStats::new(claim.datatype.clone()));
            stats.appearances += 1;
            for other in &entity.claims {
                if other.property != claim.property {
                    *stats.co_occurrences.entry(other.property.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    /// Appearance count for a property, zero when never seen
    pub fn appearances(&self, property: &str) -> u64 {
        self.properties.get(property).map_or(0, |s| s.appearances)
    }

    /// Co-occurrence count for an ordered property pair, zero when never
    /// seen together
    pub fn co_occurrences(&self, property: &str, partner: &str) -> u64 {
        self.properties
            .get(property)
            .map_or(0, |s| s.co_occurrences_with(partner))
    }

    /// Stats for a property, if it ever appeared
    pub fn property(&self, property: &str) -> Option<&PropertyStats> {
        self.properties.get(property)
    }

    /// Iterate over `(property, stats)` pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyStats)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct properties seen
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl fmt::Display for CorrelationTable {
    /// One tab-separated line per property in lexicographic order:
    /// `property<TAB>datatype<TAB>appearances<TAB>partner=count,partner=count`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut props: Vec<_> = self.properties.iter().collect();
        props.sort_by(|a, b| a.0.cmp(b.0));

        for (property, stats) in props {
            write!(f, "{}\t{}\t{}", property, stats.datatype, stats.appearances)?;
            let mut partners: Vec<_> = stats.co_occurrences.iter().collect();
            partners.sort_by(|a, b| a.0.cmp(b.0));
            for (i, (partner, count)) in partners.iter().enumerate() {
                if i == 0 {
                    write!(f, "\t{}={}", partner, count)?;
                } else {
                    write!(f, ",{}={}", partner, count)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
