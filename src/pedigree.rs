//! Pedigree graph construction and record-level utilities.
//!
//! The builder turns a flat list of pedigree records into an addressable
//! graph with child indices. Duplicate records for the same individual are
//! merged rather than duplicated: pedigree files in the wild often repeat an
//! individual with partially-known parentage, and the merge fills sentinel
//! parent links from later records without ever silently trusting a
//! conflicting non-sentinel value.

use ahash::AHashMap;
use log::warn;

use crate::lineage::{LineageError, has_auto};
use crate::types::{PedigreeGraph, PedigreeNode, PedigreeRecord, Sex, is_sentinel_parent};

impl PedigreeGraph {
    /// Builds the graph in two passes.
    ///
    /// Pass one inserts or merges each record by individual ID. Pass two
    /// resolves every node's parent IDs against the map and registers the
    /// node into each resolved parent's child set. Unresolved parent
    /// references are simply not recorded as edges; nothing here is fatal.
    pub fn build(records: &[PedigreeRecord]) -> PedigreeGraph {
        let mut nodes: AHashMap<String, PedigreeNode> = AHashMap::with_capacity(records.len());
        for record in records {
            match nodes.get_mut(&record.individual_id) {
                None => {
                    nodes.insert(record.individual_id.clone(), PedigreeNode::new(record.clone()));
                }
                Some(node) => merge_parent_links(node, record),
            }
        }

        let mut edges: Vec<(String, String)> = Vec::new();
        for node in nodes.values() {
            let record = &node.record;
            for parent_id in [&record.paternal_id, &record.maternal_id] {
                if !is_sentinel_parent(parent_id) && nodes.contains_key(parent_id.as_str()) {
                    edges.push((parent_id.clone(), record.individual_id.clone()));
                }
            }
        }
        for (parent_id, child_id) in edges {
            if let Some(parent) = nodes.get_mut(&parent_id) {
                parent.child_ids.insert(child_id);
            }
        }

        PedigreeGraph { nodes }
    }
}

/// Fills sentinel parent links on an already-seen individual from a repeated
/// record. A non-sentinel conflict keeps the original value and logs a
/// diagnostic.
fn merge_parent_links(node: &mut PedigreeNode, incoming: &PedigreeRecord) {
    if is_sentinel_parent(&node.record.paternal_id) {
        node.record.paternal_id = incoming.paternal_id.clone();
    } else if !is_sentinel_parent(&incoming.paternal_id)
        && node.record.paternal_id != incoming.paternal_id
    {
        warn!(
            "duplicate record for individual {}: conflicting paternal IDs {} and {}; keeping {}",
            node.record.individual_id,
            node.record.paternal_id,
            incoming.paternal_id,
            node.record.paternal_id,
        );
    }

    if is_sentinel_parent(&node.record.maternal_id) {
        node.record.maternal_id = incoming.maternal_id.clone();
    } else if !is_sentinel_parent(&incoming.maternal_id)
        && node.record.maternal_id != incoming.maternal_id
    {
        warn!(
            "duplicate record for individual {}: conflicting maternal IDs {} and {}; keeping {}",
            node.record.individual_id,
            node.record.maternal_id,
            incoming.maternal_id,
            node.record.maternal_id,
        );
    }
}

/// Returns true if the individual's father resolves to a node in the graph.
/// Individuals whose own ID is a sentinel never count as having a father.
pub fn has_father(record: &PedigreeRecord, graph: &PedigreeGraph) -> bool {
    if is_sentinel_parent(&record.individual_id) {
        return false;
    }
    graph.contains(&record.paternal_id)
}

/// All male individuals in the graph, split into founders (no resolvable
/// father) and non-founders. Each list is sorted by individual ID so that
/// downstream scan output is deterministic.
pub fn find_focals(graph: &PedigreeGraph) -> (Vec<PedigreeRecord>, Vec<PedigreeRecord>) {
    let mut orphans = Vec::new();
    let mut non_orphans = Vec::new();
    for node in graph.nodes() {
        let record = &node.record;
        if record.sex != Sex::Male {
            continue;
        }
        if has_father(record, graph) {
            non_orphans.push(record.clone());
        } else {
            orphans.push(record.clone());
        }
    }
    orphans.sort_by(|a, b| a.individual_id.cmp(&b.individual_id));
    non_orphans.sort_by(|a, b| a.individual_id.cmp(&b.individual_id));
    (orphans, non_orphans)
}

/// Deduplicates records by building the graph and collecting its merged
/// records, sorted by (family ID, individual ID) for deterministic output.
pub fn uniq_records(records: &[PedigreeRecord]) -> Vec<PedigreeRecord> {
    let graph = PedigreeGraph::build(records);
    let mut out: Vec<PedigreeRecord> = graph.records().cloned().collect();
    out.sort_by(|a, b| {
        (a.family_id.as_str(), a.individual_id.as_str())
            .cmp(&(b.family_id.as_str(), b.individual_id.as_str()))
    });
    out
}

/// The subset of `records` in the autosomal line of descent of `focal_id`,
/// in input order.
pub fn extract_family_auto(
    focal_id: &str,
    records: &[PedigreeRecord],
) -> Result<Vec<PedigreeRecord>, LineageError> {
    let graph = PedigreeGraph::build(records);
    let mut out = Vec::new();
    for record in records {
        if has_auto(record, focal_id, &graph)? {
            out.push(record.clone());
        }
    }
    Ok(out)
}
