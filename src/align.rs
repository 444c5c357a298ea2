use crate::genotype::{GenotypeMatrix, SampleTable};
use crate::process::GwasError;

use ndarray::Array2;
use std::fmt;
use std::ops::AddAssign;

/// Why a sample was excluded from an analysis unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// In the sample table but absent from the genotype matrix.
    NotGenotyped,
    /// In the genotype matrix but absent from the sample table.
    NotInSampleTable,
    MissingGenotype,
    MissingPhenotype,
    MissingCovariate,
}

/// Per-reason counts of dropped samples.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropCounts {
    pub not_genotyped: usize,
    pub not_in_sample_table: usize,
    pub missing_genotype: usize,
    pub missing_phenotype: usize,
    pub missing_covariate: usize,
}

impl DropCounts {
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::NotGenotyped => self.not_genotyped += 1,
            DropReason::NotInSampleTable => self.not_in_sample_table += 1,
            DropReason::MissingGenotype => self.missing_genotype += 1,
            DropReason::MissingPhenotype => self.missing_phenotype += 1,
            DropReason::MissingCovariate => self.missing_covariate += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.not_genotyped
            + self.not_in_sample_table
            + self.missing_genotype
            + self.missing_phenotype
            + self.missing_covariate
    }
}

impl AddAssign for DropCounts {
    fn add_assign(&mut self, other: Self) {
        self.not_genotyped += other.not_genotyped;
        self.not_in_sample_table += other.not_in_sample_table;
        self.missing_genotype += other.missing_genotype;
        self.missing_phenotype += other.missing_phenotype;
        self.missing_covariate += other.missing_covariate;
    }
}

impl fmt::Display for DropCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "not_genotyped={} not_in_sample_table={} missing_genotype={} missing_phenotype={} missing_covariate={}",
            self.not_genotyped,
            self.not_in_sample_table,
            self.missing_genotype,
            self.missing_phenotype,
            self.missing_covariate
        )
    }
}

/// Aligned per-variant data, rows are samples with every value defined.
#[derive(Debug, Clone)]
pub struct AnalysisUnit {
    pub variant: usize,
    pub sample_ids: Vec<String>,
    pub genotype: Vec<f64>,
    pub phenotype: Vec<f64>,
    /// n_samples x n_covariates, columns in requested order.
    pub covariates: Array2<f64>,
    pub covariate_names: Vec<String>,
}

impl AnalysisUnit {
    pub fn n_samples(&self) -> usize {
        self.genotype.len()
    }
}

/// Joins genotype rows to sample-table records by sample identifier.
///
/// The join is computed once; `unit_for` then only walks the joined rows.
pub struct Aligner<'a> {
    genotypes: &'a GenotypeMatrix,
    samples: &'a SampleTable,
    covariates: Vec<String>,
    /// (genotype row, sample-table row) for samples present in both.
    joined: Vec<(usize, usize)>,
    unjoined: DropCounts,
}

impl<'a> Aligner<'a> {
    pub fn new(
        genotypes: &'a GenotypeMatrix,
        samples: &'a SampleTable,
        covariates: &[String],
    ) -> Result<Self, GwasError> {
        if let Some(name) = covariates.iter().find(|c| samples.covariate(c).is_none()) {
            return Err(GwasError::Config(format!(
                "Covariate '{}' is not a column of the sample table (available: {})",
                name,
                samples.covariate_names().collect::<Vec<_>>().join(", ")
            )));
        }

        let mut unjoined = DropCounts::default();
        let mut joined = Vec::with_capacity(samples.len());
        for (table_row, id) in samples.sample_ids().iter().enumerate() {
            match genotypes.sample_position(id) {
                Some(geno_row) => joined.push((geno_row, table_row)),
                None => unjoined.record(DropReason::NotGenotyped),
            }
        }
        for id in genotypes.sample_ids() {
            if samples.position(id).is_none() {
                unjoined.record(DropReason::NotInSampleTable);
            }
        }

        Ok(Aligner {
            genotypes,
            samples,
            covariates: covariates.to_vec(),
            joined,
            unjoined,
        })
    }

    /// Samples present in both tables.
    pub fn n_joined(&self) -> usize {
        self.joined.len()
    }

    /// Samples lost to the identifier join, independent of any variant.
    pub fn unjoined(&self) -> DropCounts {
        self.unjoined
    }

    /// Builds the analysis unit for one genotype-matrix column. The returned
    /// counts cover only the per-variant missingness drops.
    pub fn unit_for(&self, variant: usize) -> (AnalysisUnit, DropCounts) {
        let mut drops = DropCounts::default();
        let covariate_columns: Vec<&[Option<f64>]> = self
            .covariates
            .iter()
            .filter_map(|name| self.samples.covariate(name))
            .map(|c| c.values.as_slice())
            .collect();

        let mut sample_ids = Vec::with_capacity(self.joined.len());
        let mut genotype = Vec::with_capacity(self.joined.len());
        let mut phenotype = Vec::with_capacity(self.joined.len());
        let mut covariate_flat = Vec::with_capacity(self.joined.len() * covariate_columns.len());

        'samples: for &(geno_row, table_row) in &self.joined {
            let dosage = match self.genotypes.dosage(geno_row, variant) {
                Some(d) => d,
                None => {
                    drops.record(DropReason::MissingGenotype);
                    continue;
                }
            };
            let pheno = match self.samples.phenotype(table_row) {
                Some(p) => p,
                None => {
                    drops.record(DropReason::MissingPhenotype);
                    continue;
                }
            };
            let start = covariate_flat.len();
            for column in &covariate_columns {
                match column[table_row] {
                    Some(v) => covariate_flat.push(v),
                    None => {
                        covariate_flat.truncate(start);
                        drops.record(DropReason::MissingCovariate);
                        continue 'samples;
                    }
                }
            }
            sample_ids.push(self.samples.sample_ids()[table_row].clone());
            genotype.push(dosage as f64);
            phenotype.push(pheno);
        }

        // Every retained sample pushed exactly one value per covariate
        let k = covariate_columns.len();
        let covariates =
            Array2::from_shape_fn((genotype.len(), k), |(i, j)| covariate_flat[i * k + j]);

        (
            AnalysisUnit {
                variant,
                sample_ids,
                genotype,
                phenotype,
                covariates,
                covariate_names: self.covariates.clone(),
            },
            drops,
        )
    }
}
