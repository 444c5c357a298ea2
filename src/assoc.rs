use crate::align::{Aligner, AnalysisUnit, DropCounts};
use crate::genotype::{GenotypeMatrix, SampleTable, VariantAnnotation, MIN_NON_MISSING};
use crate::process::GwasError;
use crate::progress::{
    create_progress_bar, display_status_box, log, set_stage, LogLevel, ProcessingStage, StatusBox,
};
use crate::regression::{fit_logistic, FitFailure, LogisticConfig};

use itertools::Itertools;
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::HashSet;

pub const INTERCEPT: &str = "intercept";
pub const GENOTYPE: &str = "genotype";

/// Validated association-scan configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AssocConfig {
    pub covariates: Vec<String>,
    pub maf_threshold: f64,
    pub min_samples: usize,
    pub fit: LogisticConfig,
}

impl AssocConfig {
    pub fn new(
        covariates: Vec<String>,
        maf_threshold: f64,
        fit: LogisticConfig,
    ) -> Result<Self, GwasError> {
        if !maf_threshold.is_finite() || !(0.0..=1.0).contains(&maf_threshold) {
            return Err(GwasError::Config(format!(
                "maf_threshold must be a number in [0, 1], got {}",
                maf_threshold
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = covariates.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(GwasError::Config(format!(
                "Covariate '{}' is listed more than once",
                dup
            )));
        }
        if covariates.iter().any(|c| c == GENOTYPE) {
            return Err(GwasError::Config(format!(
                "'{}' is reserved for the tested SNP and cannot be a covariate",
                GENOTYPE
            )));
        }
        Ok(AssocConfig {
            covariates,
            maf_threshold,
            min_samples: MIN_NON_MISSING,
            fit,
        })
    }
}

/// Column-named design matrix: intercept, covariates, genotype.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl DesignMatrix {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Builds the design matrix for one analysis unit. The intercept is added
/// only when no covariate already carries that name.
pub fn build_design_matrix(unit: &AnalysisUnit) -> Result<DesignMatrix, GwasError> {
    let n = unit.n_samples();
    let mut columns: Vec<String> = Vec::with_capacity(unit.covariate_names.len() + 2);
    let mut push_column = |name: &str| -> Result<(), GwasError> {
        if columns.iter().any(|c| c == name) {
            return Err(GwasError::DuplicateDesignColumn(name.to_string()));
        }
        columns.push(name.to_string());
        Ok(())
    };

    let add_intercept = !unit.covariate_names.iter().any(|c| c == INTERCEPT);
    if add_intercept {
        push_column(INTERCEPT)?;
    }
    for name in &unit.covariate_names {
        push_column(name)?;
    }
    push_column(GENOTYPE)?;

    let offset = usize::from(add_intercept);
    let k = unit.covariate_names.len();
    let values = Array2::from_shape_fn((n, columns.len()), |(i, j)| {
        if add_intercept && j == 0 {
            1.0
        } else if j < offset + k {
            unit.covariates[[i, j - offset]]
        } else {
            unit.genotype[i]
        }
    });
    Ok(DesignMatrix { columns, values })
}

/// Genotype-coefficient statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationStats {
    pub beta: f64,
    pub standard_error: f64,
    pub z: f64,
    pub p_value: f64,
}

/// One emitted association row. `stats` carries the fit outcome; a failed
/// fit still produces a row so the failure is visible in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationResult {
    pub variant_id: String,
    pub chromosome: String,
    pub position: u64,
    pub maf: f64,
    pub n_samples: usize,
    pub stats: Result<AssociationStats, FitFailure>,
}

/// Expected, non-error reasons for not testing a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnnotated,
    BelowMaf,
    TooFewSamples(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantOutcome {
    Tested(AssociationResult),
    Skipped { variant_id: String, reason: SkipReason },
}

/// Scan output in genotype-matrix column order, plus aggregate diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub results: Vec<AssociationResult>,
    pub not_annotated: Vec<String>,
    pub below_maf: usize,
    pub too_few_samples: usize,
    pub fit_failures: usize,
    pub drops: DropCounts,
}

/// Tests one variant. Lookup mismatches and threshold gates are skips;
/// fit failures become a result with a failed `stats`.
pub fn scan_variant(
    aligner: &Aligner,
    genotypes: &GenotypeMatrix,
    annotation: &VariantAnnotation,
    variant: usize,
    config: &AssocConfig,
) -> Result<(VariantOutcome, DropCounts), GwasError> {
    let variant_id = &genotypes.variant_ids()[variant];
    let skip = |reason| VariantOutcome::Skipped {
        variant_id: variant_id.clone(),
        reason,
    };

    let record = match annotation.get(variant_id) {
        Some(r) => r,
        None => return Ok((skip(SkipReason::NotAnnotated), DropCounts::default())),
    };
    if record.reference_maf < config.maf_threshold {
        return Ok((skip(SkipReason::BelowMaf), DropCounts::default()));
    }

    let (unit, drops) = aligner.unit_for(variant);
    if unit.n_samples() < config.min_samples {
        return Ok((skip(SkipReason::TooFewSamples(unit.n_samples())), drops));
    }

    let design = build_design_matrix(&unit)?;
    let genotype_col = design
        .column_index(GENOTYPE)
        .ok_or_else(|| GwasError::Config("design matrix lacks the genotype column".to_string()))?;
    let y = ndarray::ArrayView1::from(&unit.phenotype[..]);
    let stats = fit_logistic(design.values.view(), y, &config.fit).map(|fit| AssociationStats {
        beta: fit.coefficients[genotype_col],
        standard_error: fit.standard_errors[genotype_col],
        z: fit.z_values[genotype_col],
        p_value: fit.p_values[genotype_col],
    });

    Ok((
        VariantOutcome::Tested(AssociationResult {
            variant_id: variant_id.clone(),
            chromosome: record.chromosome.clone(),
            position: record.position,
            maf: record.reference_maf,
            n_samples: unit.n_samples(),
            stats,
        }),
        drops,
    ))
}

/// Runs the logistic association scan over every genotype-matrix column.
pub fn run_association_scan(
    genotypes: &GenotypeMatrix,
    samples: &SampleTable,
    annotation: &VariantAnnotation,
    config: &AssocConfig,
) -> Result<ScanSummary, GwasError> {
    set_stage(ProcessingStage::Association);
    let aligner = Aligner::new(genotypes, samples, &config.covariates)?;
    log(
        LogLevel::Info,
        &format!(
            "Scanning {} SNPs; {} samples shared between genotypes and phenotypes; covariates: [{}]",
            genotypes.n_variants(),
            aligner.n_joined(),
            config.covariates.iter().join(", ")
        ),
    );

    let pb = create_progress_bar(genotypes.n_variants() as u64, "Fitting logistic models");
    let outcomes: Vec<(VariantOutcome, DropCounts)> = (0..genotypes.n_variants())
        .into_par_iter()
        .map(|j| {
            let outcome = scan_variant(&aligner, genotypes, annotation, j, config);
            pb.inc(1);
            outcome
        })
        .collect::<Result<Vec<_>, GwasError>>()?;
    pb.finish_and_clear();

    let mut summary = ScanSummary {
        drops: aligner.unjoined(),
        ..ScanSummary::default()
    };
    for (outcome, drops) in outcomes {
        summary.drops += drops;
        match outcome {
            VariantOutcome::Tested(result) => {
                if let Err(failure) = &result.stats {
                    log(
                        LogLevel::Warning,
                        &format!("SNP {}: logistic fit failed ({})", result.variant_id, failure),
                    );
                    summary.fit_failures += 1;
                }
                summary.results.push(result);
            }
            VariantOutcome::Skipped { variant_id, reason } => match reason {
                SkipReason::NotAnnotated => {
                    log(
                        LogLevel::Warning,
                        &format!("SNP {} not in annotation. Skipping.", variant_id),
                    );
                    summary.not_annotated.push(variant_id);
                }
                SkipReason::BelowMaf => {
                    log(LogLevel::Debug, &format!("SNP {} below MAF threshold", variant_id));
                    summary.below_maf += 1;
                }
                SkipReason::TooFewSamples(n) => {
                    log(
                        LogLevel::Debug,
                        &format!("SNP {} has only {} usable samples", variant_id, n),
                    );
                    summary.too_few_samples += 1;
                }
            },
        }
    }

    display_status_box(StatusBox {
        title: "Association Scan".to_string(),
        stats: vec![
            ("SNPs in genotype matrix".to_string(), genotypes.n_variants().to_string()),
            ("Not in annotation".to_string(), summary.not_annotated.len().to_string()),
            ("Below MAF threshold".to_string(), summary.below_maf.to_string()),
            (
                format!("Fewer than {} samples", config.min_samples),
                summary.too_few_samples.to_string(),
            ),
            (
                "Fitted".to_string(),
                (summary.results.len() - summary.fit_failures).to_string(),
            ),
            ("Fit failures".to_string(), summary.fit_failures.to_string()),
        ],
    });
    log(LogLevel::Debug, &format!("Sample drops across SNPs: {}", summary.drops));

    Ok(summary)
}
