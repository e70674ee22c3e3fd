//! Pedigree permutation: shuffling the sex or phenotype column across
//! records to generate null pedigrees for background construction.

use std::io;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::io::{create_maybe_gz, write_ped};
use crate::types::{PedigreeRecord, Sex};

/// Permutes the sex column across all records in place. Every other column
/// stays attached to its row.
pub fn shuffle_sexes<R: Rng + ?Sized>(records: &mut [PedigreeRecord], rng: &mut R) {
    let mut sexes: Vec<Sex> = records.iter().map(|record| record.sex).collect();
    sexes.shuffle(rng);
    for (record, sex) in records.iter_mut().zip(sexes) {
        record.sex = sex;
    }
}

/// Permutes the phenotype column across all records in place.
pub fn shuffle_phenotypes<R: Rng + ?Sized>(records: &mut [PedigreeRecord], rng: &mut R) {
    let mut phenotypes: Vec<i64> = records.iter().map(|record| record.phenotype).collect();
    phenotypes.shuffle(rng);
    for (record, phenotype) in records.iter_mut().zip(phenotypes) {
        record.phenotype = phenotype;
    }
}

/// Which column [`write_shuffled_replicates`] permutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleColumn {
    Sex,
    Phenotype,
}

/// Writes `replicates` shuffled pedigrees to `{prefix}_{i}.ped.gz`. Each
/// replicate shuffles the previous state again, so replicate `i` is `i + 1`
/// successive permutations of the input; the permutation distribution is
/// unchanged and output stays reproducible under a fixed source.
pub fn write_shuffled_replicates<R: Rng + ?Sized>(
    records: &mut [PedigreeRecord],
    rng: &mut R,
    replicates: usize,
    prefix: &str,
    column: ShuffleColumn,
) -> io::Result<()> {
    for i in 0..replicates {
        match column {
            ShuffleColumn::Sex => shuffle_sexes(records, rng),
            ShuffleColumn::Phenotype => shuffle_phenotypes(records, rng),
        }
        let path = format!("{prefix}_{i}.ped.gz");
        let mut writer = create_maybe_gz(Path::new(&path))?;
        write_ped(&mut writer, records)?;
    }
    Ok(())
}
