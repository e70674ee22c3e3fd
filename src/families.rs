//! Family-trio aggregation: turning qualifying parents into sex-count
//! trios for the chi-squared test.

use crate::lineage::{LineageError, has_auto, has_x, has_x_fem_descent, has_y};
use crate::types::{Family, PedigreeGraph, PedigreeRecord, Sex};

/// The inheritance path along which descent from the focal individual is
/// traced when selecting qualifying parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritanceMode {
    /// Strict father-to-son Y descent.
    Y,
    /// General X descent, either sex as the qualifying parent.
    X,
    /// General X descent, restricted to male qualifying parents.
    MaleX,
    /// General X descent, restricted to female qualifying parents.
    FemaleX,
    /// Female-line-only X descent, female qualifying parents.
    FemDescentFemaleX,
    /// Autosomal descent.
    Auto,
}

impl InheritanceMode {
    /// Whether `record` qualifies as a trio parent for this mode.
    pub fn qualifies(
        self,
        record: &PedigreeRecord,
        focal_id: &str,
        graph: &PedigreeGraph,
    ) -> Result<bool, LineageError> {
        match self {
            InheritanceMode::Y => has_y(record, focal_id, graph),
            InheritanceMode::X => has_x(record, focal_id, graph),
            InheritanceMode::MaleX => {
                Ok(record.sex == Sex::Male && has_x(record, focal_id, graph)?)
            }
            InheritanceMode::FemaleX => {
                Ok(record.sex == Sex::Female && has_x(record, focal_id, graph)?)
            }
            InheritanceMode::FemDescentFemaleX => {
                Ok(record.sex == Sex::Female && has_x_fem_descent(record, focal_id, graph)?)
            }
            InheritanceMode::Auto => has_auto(record, focal_id, graph),
        }
    }
}

/// Appends one trio to `families`: the sex counts of `individual`'s direct
/// offspring. Children of unknown sex contribute to neither bucket.
///
/// # Panics
///
/// Panics if `individual` or any of its registered children is absent from
/// the graph. Both indicate a caller bug (the graph owns the child index),
/// not recoverable data.
pub fn add_family(families: &mut Vec<Family>, individual: &PedigreeRecord, graph: &PedigreeGraph) {
    let node = graph.get(&individual.individual_id).unwrap_or_else(|| {
        panic!(
            "individual {} is not a node in the pedigree graph",
            individual.individual_id
        )
    });
    let mut family = Family::default();
    for child_id in &node.child_ids {
        let child = graph.get(child_id).unwrap_or_else(|| {
            panic!("child {child_id} is registered in a child set but absent from the graph")
        });
        match child.record.sex {
            Sex::Male => family.male_offspring += 1.0,
            Sex::Female => family.female_offspring += 1.0,
            Sex::Unknown => {}
        }
    }
    families.push(family);
}

/// Element-wise sum of male and female counts across all families: many
/// trios condensed into one pooled trio.
pub fn condense(families: &[Family]) -> Family {
    let mut sums = Family::default();
    for family in families {
        sums.male_offspring += family.male_offspring;
        sums.female_offspring += family.female_offspring;
    }
    sums
}

/// One trio per graph node satisfying `predicate` against `focal_id`.
pub fn build_families_with<F>(
    focal_id: &str,
    graph: &PedigreeGraph,
    predicate: F,
) -> Result<Vec<Family>, LineageError>
where
    F: Fn(&PedigreeRecord, &str, &PedigreeGraph) -> Result<bool, LineageError>,
{
    let mut families = Vec::new();
    for node in graph.nodes() {
        if predicate(&node.record, focal_id, graph)? {
            add_family(&mut families, &node.record, graph);
        }
    }
    Ok(families)
}

/// One trio per graph node qualifying under `mode` against `focal_id`.
pub fn build_families(
    focal_id: &str,
    graph: &PedigreeGraph,
    mode: InheritanceMode,
) -> Result<Vec<Family>, LineageError> {
    build_families_with(focal_id, graph, |record, focal, g| {
        mode.qualifies(record, focal, g)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PedigreeRecord;

    fn rec(ind: &str, dad: &str, mom: &str, sex: i64) -> PedigreeRecord {
        PedigreeRecord {
            family_id: "1".to_string(),
            individual_id: ind.to_string(),
            paternal_id: dad.to_string(),
            maternal_id: mom.to_string(),
            sex: Sex::from_code(sex),
            phenotype: 0,
        }
    }

    #[test]
    fn test_add_family_counts_offspring_by_sex() {
        let records = vec![rec("1", "0", "0", 1), rec("2", "1", "0", 1), rec("3", "1", "0", 2)];
        let graph = PedigreeGraph::build(&records);
        let mut families = Vec::new();
        add_family(&mut families, &records[0], &graph);
        assert_eq!(families, vec![Family::new(1.0, 1.0)]);
    }

    #[test]
    fn test_add_family_skips_unknown_sex() {
        let records = vec![rec("1", "0", "0", 1), rec("2", "1", "0", 0), rec("3", "1", "0", 2)];
        let graph = PedigreeGraph::build(&records);
        let mut families = Vec::new();
        add_family(&mut families, &records[0], &graph);
        assert_eq!(families, vec![Family::new(0.0, 1.0)]);
    }

    #[test]
    #[should_panic(expected = "not a node in the pedigree graph")]
    fn test_add_family_panics_on_absent_individual() {
        let graph = PedigreeGraph::build(&[]);
        let mut families = Vec::new();
        add_family(&mut families, &rec("1", "0", "0", 1), &graph);
    }

    #[test]
    fn test_condense_is_additive() {
        let a = Family::new(3.0, 1.0);
        let b = Family::new(2.0, 5.0);
        let pooled = condense(&[a, b]);
        assert_eq!(pooled.male_offspring, a.male_offspring + b.male_offspring);
        assert_eq!(pooled.female_offspring, a.female_offspring + b.female_offspring);
        assert_eq!(condense(&[]), Family::default());
    }

    #[test]
    fn test_build_families_y_includes_whole_paternal_line() {
        // Focal 1 has sons 2 and 3; son 2 has children 4 (male) and 5
        // (female).
        let records = vec![
            rec("1", "0", "0", 1),
            rec("2", "1", "0", 1),
            rec("3", "1", "0", 1),
            rec("4", "2", "9", 1),
            rec("5", "2", "9", 2),
        ];
        let graph = PedigreeGraph::build(&records);
        let families = build_families("1", &graph, InheritanceMode::Y).unwrap();
        // Qualifying parents: 1, 2, 3, 4 (all Y carriers).
        assert_eq!(families.len(), 4);
        let pooled = condense(&families);
        assert_eq!(pooled.male_offspring, 3.0);
        assert_eq!(pooled.female_offspring, 1.0);
    }

    #[test]
    fn test_build_families_sex_restricted_x_modes() {
        let records = vec![
            rec("1", "0", "0", 2),
            rec("2", "9", "1", 1),
            rec("3", "9", "1", 2),
            rec("4", "2", "8", 2),
        ];
        let graph = PedigreeGraph::build(&records);
        let male = build_families("1", &graph, InheritanceMode::MaleX).unwrap();
        assert_eq!(male.len(), 1);
        let female = build_families("1", &graph, InheritanceMode::FemaleX).unwrap();
        // 1, 3, and 4 are female X carriers.
        assert_eq!(female.len(), 3);
    }
}
