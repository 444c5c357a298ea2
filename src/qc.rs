use crate::genotype::{GenotypeMatrix, MissingCode, VariantAnnotation};
use crate::process::GwasError;
use crate::progress::{display_status_box, log, set_stage, LogLevel, ProcessingStage, StatusBox};

use itertools::Itertools;
use rayon::prelude::*;

/// Validated QC thresholds. All three lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QcThresholds {
    pub maf: f64,
    pub snp_missing: f64,
    pub sample_missing: f64,
}

impl QcThresholds {
    pub fn new(maf: f64, snp_missing: f64, sample_missing: f64) -> Result<Self, GwasError> {
        for (name, value) in [
            ("maf_threshold", maf),
            ("snp_missing_threshold", snp_missing),
            ("sample_missing_threshold", sample_missing),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(GwasError::Config(format!(
                    "{} must be a number in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(QcThresholds {
            maf,
            snp_missing,
            sample_missing,
        })
    }

    /// Thresholds that keep every annotated variant and every sample.
    pub fn permissive() -> Self {
        QcThresholds {
            maf: 0.0,
            snp_missing: 1.0,
            sample_missing: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QcReport {
    pub initial_variants: usize,
    pub post_missingness_variants: usize,
    pub post_maf_variants: usize,
    pub initial_samples: usize,
    pub retained_samples: usize,
    /// Variants that passed missingness but have no annotation record.
    pub unannotated_variants: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QcResult {
    pub genotypes: GenotypeMatrix,
    pub annotation: VariantAnnotation,
    pub retained_samples: Vec<String>,
    pub report: QcReport,
}

/// Fraction of missing genotypes per variant, over all samples.
pub fn variant_missingness(genotypes: &GenotypeMatrix) -> Vec<f64> {
    let n = genotypes.n_samples();
    (0..genotypes.n_variants())
        .into_par_iter()
        .map(|j| {
            if n == 0 {
                return 0.0;
            }
            let missing = genotypes.variant_column(j).iter().filter(|d| d.is_none()).count();
            missing as f64 / n as f64
        })
        .collect()
}

/// Fraction of missing genotypes per sample, over the given variant columns.
/// `None` when `variants` is empty.
pub fn sample_missingness(genotypes: &GenotypeMatrix, variants: &[usize]) -> Vec<Option<f64>> {
    (0..genotypes.n_samples())
        .into_par_iter()
        .map(|i| {
            if variants.is_empty() {
                return None;
            }
            let row = genotypes.sample_row(i);
            let missing = variants.iter().filter(|&&j| row[j].is_none()).count();
            Some(missing as f64 / variants.len() as f64)
        })
        .collect()
}

/// Variant missingness, then annotation MAF, then sample missingness over
/// the surviving variants. Returns a new matrix; the input is untouched.
pub fn filter_genotypes(
    genotypes: &GenotypeMatrix,
    annotation: &VariantAnnotation,
    missing: &MissingCode,
    thresholds: &QcThresholds,
) -> Result<QcResult, GwasError> {
    set_stage(ProcessingStage::QualityControl);
    log(
        LogLevel::Info,
        &format!(
            "Running QC on {} samples x {} SNPs (missing code '{}')",
            genotypes.n_samples(),
            genotypes.n_variants(),
            missing.as_str()
        ),
    );

    // 1. SNP missingness
    let snp_missing = variant_missingness(genotypes);
    let pass_missingness: Vec<usize> = snp_missing
        .iter()
        .enumerate()
        .filter(|(_, m)| **m <= thresholds.snp_missing)
        .map(|(j, _)| j)
        .collect();

    // 2. Annotation MAF
    let mut unannotated_variants = Vec::new();
    let pass_maf: Vec<usize> = pass_missingness
        .iter()
        .copied()
        .filter(|&j| {
            let id = &genotypes.variant_ids()[j];
            match annotation.get(id) {
                Some(record) => record.reference_maf >= thresholds.maf,
                None => {
                    unannotated_variants.push(id.clone());
                    false
                }
            }
        })
        .collect();
    if !unannotated_variants.is_empty() {
        log(
            LogLevel::Warning,
            &format!(
                "{} SNP(s) missing from the annotation were dropped: {}",
                unannotated_variants.len(),
                unannotated_variants.iter().take(10).join(", ")
            ),
        );
    }

    // 3. Sample missingness, over retained SNPs only
    let per_sample = sample_missingness(genotypes, &pass_maf);
    if pass_maf.is_empty() && genotypes.n_samples() > 0 {
        log(
            LogLevel::Warning,
            "No SNPs survived variant filtering; sample missingness is undefined and no samples are retained",
        );
    }
    let pass_samples: Vec<usize> = per_sample
        .iter()
        .enumerate()
        .filter(|(_, m)| matches!(m, Some(v) if *v <= thresholds.sample_missing))
        .map(|(i, _)| i)
        .collect();

    let filtered = genotypes.select(&pass_samples, &pass_maf)?;
    let retained_ids: std::collections::HashSet<&str> =
        filtered.variant_ids().iter().map(|s| s.as_str()).collect();
    let filtered_annotation = annotation.retain_ids(|id| retained_ids.contains(id));

    let report = QcReport {
        initial_variants: genotypes.n_variants(),
        post_missingness_variants: pass_missingness.len(),
        post_maf_variants: pass_maf.len(),
        initial_samples: genotypes.n_samples(),
        retained_samples: pass_samples.len(),
        unannotated_variants,
    };

    display_status_box(StatusBox {
        title: "QC Summary".to_string(),
        stats: vec![
            ("Initial SNPs".to_string(), report.initial_variants.to_string()),
            (
                "SNPs after missingness filter".to_string(),
                report.post_missingness_variants.to_string(),
            ),
            ("SNPs after MAF filter".to_string(), report.post_maf_variants.to_string()),
            ("Initial samples".to_string(), report.initial_samples.to_string()),
            ("Samples retained".to_string(), report.retained_samples.to_string()),
        ],
    });

    Ok(QcResult {
        retained_samples: filtered.sample_ids().to_vec(),
        genotypes: filtered,
        annotation: filtered_annotation,
        report,
    })
}
