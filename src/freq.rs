use crate::genotype::{Dosage, GenotypeMatrix, MIN_NON_MISSING};
use crate::progress::{log, set_stage, LogLevel, ProcessingStage};

use rayon::prelude::*;

/// Counts of dosage 0, 1 and 2 among non-missing genotypes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenotypeCounts {
    pub count_0: usize,
    pub count_1: usize,
    pub count_2: usize,
}

impl GenotypeCounts {
    pub fn from_dosages<'a, I>(dosages: I) -> Self
    where
        I: IntoIterator<Item = &'a Dosage>,
    {
        let mut counts = GenotypeCounts::default();
        for dosage in dosages.into_iter().flatten() {
            match dosage {
                0 => counts.count_0 += 1,
                1 => counts.count_1 += 1,
                _ => counts.count_2 += 1,
            }
        }
        counts
    }

    pub fn n_non_missing(&self) -> usize {
        self.count_0 + self.count_1 + self.count_2
    }

    /// Frequency of the counted allele under additive 0/1/2 coding.
    pub fn allele_frequency(&self) -> Option<f64> {
        let n = self.n_non_missing();
        if n == 0 {
            return None;
        }
        Some((self.count_1 + 2 * self.count_2) as f64 / (2 * n) as f64)
    }
}

/// Per-variant frequency outcome. `counts` and `maf` are `None` when fewer
/// than `MIN_NON_MISSING` genotypes are observed.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRecord {
    pub variant_id: String,
    pub counts: Option<GenotypeCounts>,
    pub n_non_missing: usize,
    pub maf: Option<f64>,
}

pub fn variant_frequency(variant_id: &str, dosages: &[Dosage]) -> FrequencyRecord {
    let counts = GenotypeCounts::from_dosages(dosages);
    let n_non_missing = counts.n_non_missing();
    if n_non_missing < MIN_NON_MISSING {
        return FrequencyRecord {
            variant_id: variant_id.to_string(),
            counts: None,
            n_non_missing,
            maf: None,
        };
    }
    FrequencyRecord {
        variant_id: variant_id.to_string(),
        counts: Some(counts),
        n_non_missing,
        maf: counts.allele_frequency(),
    }
}

/// Frequencies for every variant, in matrix column order.
pub fn calculate_frequencies(genotypes: &GenotypeMatrix) -> Vec<FrequencyRecord> {
    set_stage(ProcessingStage::Frequency);
    let records: Vec<FrequencyRecord> = genotypes
        .variant_ids()
        .par_iter()
        .enumerate()
        .map(|(j, id)| {
            let column: Vec<Dosage> = genotypes.variant_column(j).to_vec();
            variant_frequency(id, &column)
        })
        .collect();

    let undefined = records.iter().filter(|r| r.maf.is_none()).count();
    log(
        LogLevel::Info,
        &format!(
            "Computed allele frequencies for {} SNPs across {} samples ({} with fewer than {} observed genotypes)",
            records.len(),
            genotypes.n_samples(),
            undefined,
            MIN_NON_MISSING
        ),
    );
    records
}
