//! Lineage predicates: recursive descent tests answering "is this
//! individual in the focal individual's line of descent?" along a stated
//! inheritance path.
//!
//! Each predicate walks strictly toward graph-resolved ancestors. The walk
//! carries the set of individual IDs on the current ancestor path; meeting
//! one again means the pedigree contains a parentage cycle, which is
//! reported as [`LineageError::CyclicPedigree`] instead of recursing
//! forever. The set is path-scoped, not global, so diamond-shaped
//! (inbred but acyclic) pedigrees are still explored fully.
//!
//! Two behavioral quirks of the descent rules are deliberate and load
//! bearing; see the notes on [`has_auto`] and [`has_x_fem_descent`].

use ahash::AHashSet;
use thiserror::Error;

use crate::types::{PedigreeGraph, PedigreeRecord, Sex};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineageError {
    #[error("pedigree contains a parentage cycle through individual {individual_id}")]
    CyclicPedigree { individual_id: String },
}

/// True if `record` carries the same Y chromosome as `focal_id` by descent:
/// an unbroken father-to-son chain. Only males are ever considered.
pub fn has_y(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
) -> Result<bool, LineageError> {
    let mut visited: AHashSet<String> = AHashSet::new();
    let mut current = record;
    loop {
        if current.individual_id == focal_id {
            return Ok(true);
        }
        if current.sex != Sex::Male {
            return Ok(false);
        }
        if current.paternal_id == focal_id {
            return Ok(true);
        }
        if !visited.insert(current.individual_id.clone()) {
            return Err(LineageError::CyclicPedigree {
                individual_id: current.individual_id.clone(),
            });
        }
        match graph.get(&current.paternal_id) {
            Some(father) => current = &father.record,
            None => return Ok(false),
        }
    }
}

/// True iff the individual's father resolves in the graph and [`has_y`]
/// holds for the father.
pub fn dad_has_y(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
) -> Result<bool, LineageError> {
    match graph.get(&record.paternal_id) {
        Some(father) => has_y(&father.record, focal_id, graph),
        None => Ok(false),
    }
}

/// True if `record` is in the line of descent of `focal_id`'s X
/// chromosome(s) under the simplified model: males inherit X only
/// maternally, females through either parent.
pub fn has_x(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
) -> Result<bool, LineageError> {
    let mut path = AHashSet::new();
    has_x_inner(record, focal_id, graph, &mut path)
}

fn has_x_inner(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
    path: &mut AHashSet<String>,
) -> Result<bool, LineageError> {
    if record.individual_id == focal_id {
        return Ok(true);
    }
    if !path.insert(record.individual_id.clone()) {
        return Err(LineageError::CyclicPedigree {
            individual_id: record.individual_id.clone(),
        });
    }
    let found = match record.sex {
        Sex::Male => {
            if record.maternal_id == focal_id {
                true
            } else if let Some(mother) = graph.get(&record.maternal_id) {
                has_x_inner(&mother.record, focal_id, graph, path)?
            } else {
                false
            }
        }
        Sex::Female => {
            let mut hit = false;
            if record.paternal_id == focal_id {
                hit = true;
            }
            if !hit
                && let Some(father) = graph.get(&record.paternal_id)
                && has_x_inner(&father.record, focal_id, graph, path)?
            {
                hit = true;
            }
            if !hit && record.maternal_id == focal_id {
                hit = true;
            }
            if !hit
                && let Some(mother) = graph.get(&record.maternal_id)
                && has_x_inner(&mother.record, focal_id, graph, path)?
            {
                hit = true;
            }
            hit
        }
        Sex::Unknown => false,
    };
    path.remove(&record.individual_id);
    Ok(found)
}

/// True if `record` is in the line of descent of `focal_id`'s X assuming it
/// is transmitted only by female parents. Males are excluded outright, even
/// as X recipients.
///
/// Note the asymmetry: beyond the first maternal step this delegates to the
/// general [`has_x`] rules rather than recursing on itself. The focal's own
/// daughters are treated under the strict female-line rule, everything
/// further up under the general model.
pub fn has_x_fem_descent(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
) -> Result<bool, LineageError> {
    if record.individual_id == focal_id {
        return Ok(true);
    }
    match record.sex {
        Sex::Female => {
            if record.maternal_id == focal_id {
                return Ok(true);
            }
            match graph.get(&record.maternal_id) {
                Some(mother) => has_x(&mother.record, focal_id, graph),
                None => Ok(false),
            }
        }
        Sex::Male | Sex::Unknown => Ok(false),
    }
}

/// True if `record` is in the autosomal line of descent of `focal_id`.
///
/// Once the father resolves in the graph, the result is the father branch's
/// result alone; the mother branch is only tried when the father does not
/// resolve. This can misclassify individuals who descend from the focal
/// only through the mother while the father resolves as an unrelated node.
/// The behavior is preserved deliberately so results stay comparable with
/// prior analyses.
pub fn has_auto(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
) -> Result<bool, LineageError> {
    let mut path = AHashSet::new();
    has_auto_inner(record, focal_id, graph, &mut path)
}

fn has_auto_inner(
    record: &PedigreeRecord,
    focal_id: &str,
    graph: &PedigreeGraph,
    path: &mut AHashSet<String>,
) -> Result<bool, LineageError> {
    if record.individual_id == focal_id
        || record.paternal_id == focal_id
        || record.maternal_id == focal_id
    {
        return Ok(true);
    }
    if !path.insert(record.individual_id.clone()) {
        return Err(LineageError::CyclicPedigree {
            individual_id: record.individual_id.clone(),
        });
    }
    let found = if let Some(father) = graph.get(&record.paternal_id) {
        has_auto_inner(&father.record, focal_id, graph, path)?
    } else if let Some(mother) = graph.get(&record.maternal_id) {
        has_auto_inner(&mother.record, focal_id, graph, path)?
    } else {
        false
    };
    path.remove(&record.individual_id);
    Ok(found)
}
