//! Core data types shared across the analysis modules.
//!
//! This module is the canonical dictionary for the structures that cross
//! architectural boundaries (`pedigree`, `lineage`, `families`, `tdt`,
//! `monte`). Types used by only one module stay in that module.

use ahash::{AHashMap, AHashSet};

/// Parent-ID values that mean "parent not recorded". These never resolve to
/// a node in the pedigree graph.
pub const SENTINEL_PARENT_IDS: [&str; 2] = ["0", "999999"];

/// Returns true if `id` is one of the sentinel "parent unknown" values.
pub fn is_sentinel_parent(id: &str) -> bool {
    SENTINEL_PARENT_IDS.contains(&id)
}

/// Sex as encoded in the standard six-column pedigree format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Unknown,
    Male,
    Female,
}

impl Sex {
    /// Decodes the integer sex field. `1` is male, `2` is female, and every
    /// other value (including `0`) is treated as unknown.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Sex::Male,
            2 => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Sex::Unknown => 0,
            Sex::Male => 1,
            Sex::Female => 2,
        }
    }
}

/// One row of a flat pedigree file.
///
/// `individual_id` is the unique key; duplicate rows for the same individual
/// are merged during graph construction (see [`PedigreeGraph::build`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PedigreeRecord {
    pub family_id: String,
    pub individual_id: String,
    pub paternal_id: String,
    pub maternal_id: String,
    pub sex: Sex,
    pub phenotype: i64,
}

/// A pedigreed individual plus the IDs of all of its direct offspring.
///
/// The child set is populated exclusively by graph construction; callers
/// never mutate it.
#[derive(Debug, Clone)]
pub struct PedigreeNode {
    pub record: PedigreeRecord,
    pub child_ids: AHashSet<String>,
}

impl PedigreeNode {
    pub(crate) fn new(record: PedigreeRecord) -> Self {
        PedigreeNode {
            record,
            child_ids: AHashSet::new(),
        }
    }
}

/// An addressable pedigree: individual ID to node, with child indices.
///
/// Immutable once built; rebuilt fresh per analysis run. An edge
/// individual -> child exists iff the child's resolved paternal or maternal
/// ID equals the individual's ID and that ID is not a sentinel.
#[derive(Debug, Clone, Default)]
pub struct PedigreeGraph {
    pub(crate) nodes: AHashMap<String, PedigreeNode>,
}

impl PedigreeGraph {
    pub fn get(&self, individual_id: &str) -> Option<&PedigreeNode> {
        self.nodes.get(individual_id)
    }

    pub fn contains(&self, individual_id: &str) -> bool {
        self.nodes.contains_key(individual_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all nodes in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &PedigreeNode> {
        self.nodes.values()
    }

    /// Iterates over all records in unspecified order.
    pub fn records(&self) -> impl Iterator<Item = &PedigreeRecord> {
        self.nodes.values().map(|n| &n.record)
    }
}

/// Sex counts of one qualifying parent's direct offspring.
///
/// Counts are floats because Monte Carlo resampling draws them from a
/// binomial; they remain exact whole numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Family {
    pub male_offspring: f64,
    pub female_offspring: f64,
}

impl Family {
    pub fn new(male_offspring: f64, female_offspring: f64) -> Self {
        Family {
            male_offspring,
            female_offspring,
        }
    }

    pub fn total(&self) -> f64 {
        self.male_offspring + self.female_offspring
    }
}

/// The outcome of one transmission-disequilibrium test.
///
/// Created once per (focal individual, inheritance mode) combination and
/// immutable afterwards. `chi_squared` and `p_value` may be non-finite when
/// the family set is degenerate (zero offspring); consumers must filter such
/// results before rank or percentile computations.
#[derive(Debug, Clone, PartialEq)]
pub struct TdtResult {
    pub name: String,
    pub totals: Family,
    pub family_count: f64,
    pub male_proportion: f64,
    pub mean_males_per_family: f64,
    pub mean_females_per_family: f64,
    pub mean_children_per_family: f64,
    pub chi_squared: f64,
    pub p_value: f64,
    /// Whether the focal individual had no resolvable father in the graph
    /// (a founder). Descriptive only; does not affect computation.
    pub orphan: bool,
}
