//! Pairwise linkage disequilibrium (r²) in a window around a focal SNP.

use crate::genotype::{GenotypeMatrix, VariantAnnotation, VariantRecord};
use crate::process::GwasError;
use crate::progress::{
    create_progress_bar, display_status_box, log, set_stage, LogLevel, ProcessingStage, StatusBox,
};

use ndarray::Array2;
use rayon::prelude::*;

/// Validated LD configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LdConfig {
    pub focal_variant: String,
    pub window_kb: f64,
    pub min_maf: f64,
}

impl LdConfig {
    pub fn new(focal_variant: &str, window_kb: f64, min_maf: f64) -> Result<Self, GwasError> {
        if focal_variant.trim().is_empty() {
            return Err(GwasError::Config("Focal SNP identifier is empty".to_string()));
        }
        if !window_kb.is_finite() || window_kb <= 0.0 {
            return Err(GwasError::Config(format!(
                "window_kb must be a positive number, got {}",
                window_kb
            )));
        }
        if !min_maf.is_finite() || !(0.0..=1.0).contains(&min_maf) {
            return Err(GwasError::Config(format!(
                "min_maf must be a number in [0, 1], got {}",
                min_maf
            )));
        }
        Ok(LdConfig {
            focal_variant: focal_variant.trim().to_string(),
            window_kb,
            min_maf,
        })
    }

    /// Half-width of the window in base pairs.
    pub fn half_window_bp(&self) -> u64 {
        let window_bp = (self.window_kb * 1000.0) as u64;
        window_bp / 2
    }
}

/// Symmetric r² matrix keyed by variant identifier. `None` is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct LdMatrix {
    variant_ids: Vec<String>,
    values: Array2<Option<f64>>,
}

impl LdMatrix {
    pub fn variant_ids(&self) -> &[String] {
        &self.variant_ids
    }

    pub fn len(&self) -> usize {
        self.variant_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variant_ids.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values[[i, j]]
    }

    pub fn get_by_id(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.variant_ids.iter().position(|v| v == a)?;
        let j = self.variant_ids.iter().position(|v| v == b)?;
        self.get(i, j)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LdReport {
    pub in_window: usize,
    pub genotyped: usize,
    pub all_missing: usize,
    pub below_min_maf: usize,
    pub retained: usize,
    pub monomorphic: usize,
}

#[derive(Debug, Clone)]
pub struct LdResult {
    pub matrix: LdMatrix,
    pub report: LdReport,
}

/// Annotated variants on the focal chromosome within ±half-window of the focal
/// position, ordered by position then identifier.
pub fn select_window<'a>(
    annotation: &'a VariantAnnotation,
    config: &LdConfig,
) -> Result<Vec<&'a VariantRecord>, GwasError> {
    let focal = annotation
        .get(&config.focal_variant)
        .ok_or_else(|| GwasError::FocalVariantNotFound(config.focal_variant.clone()))?;
    let half = config.half_window_bp();
    let lower = focal.position.saturating_sub(half);
    let upper = focal.position.saturating_add(half);
    log(
        LogLevel::Info,
        &format!(
            "Processing SNP {} at {}:{} (window {}-{})",
            focal.variant_id, focal.chromosome, focal.position, lower, upper
        ),
    );

    let mut window: Vec<&VariantRecord> = annotation
        .records()
        .iter()
        .filter(|r| r.chromosome == focal.chromosome && (lower..=upper).contains(&r.position))
        .collect();
    window.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.variant_id.cmp(&b.variant_id))
    });
    if window.is_empty() {
        return Err(GwasError::EmptyWindow {
            focal: config.focal_variant.clone(),
            window_kb: config.window_kb,
        });
    }
    Ok(window)
}

/// Dosages as floats, `None` where missing.
fn numeric_column(genotypes: &GenotypeMatrix, variant: usize) -> Vec<Option<f64>> {
    genotypes
        .variant_column(variant)
        .iter()
        .map(|d| d.map(f64::from))
        .collect()
}

/// mean(dosage) / 2 over defined entries.
fn mean_allele_frequency(values: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64 / 2.0)
    }
}

/// Fewer than two distinct defined values.
fn is_monomorphic(values: &[Option<f64>]) -> bool {
    let mut defined = values.iter().flatten();
    match defined.next() {
        Some(first) => defined.all(|v| v == first),
        None => true,
    }
}

/// Squared Pearson correlation over samples where both values are defined.
/// `None` when fewer than two such samples exist or either side has no variance.
pub fn pairwise_r2(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    let n = pairs.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    if !r.is_finite() {
        return None;
    }
    Some((r * r).clamp(0.0, 1.0))
}

/// Builds the r² matrix for already-filtered dosage vectors.
///
/// Monomorphic variants are undefined across their whole row and column,
/// the diagonal of every other variant is 1.
pub fn ld_matrix(variant_ids: Vec<String>, columns: &[Vec<Option<f64>>]) -> LdMatrix {
    let k = columns.len();
    let monomorphic: Vec<bool> = columns.iter().map(|c| is_monomorphic(c)).collect();
    let pairs: Vec<(usize, usize)> = (0..k).flat_map(|i| (i..k).map(move |j| (i, j))).collect();

    let pb = create_progress_bar(pairs.len() as u64, "Computing pairwise r²");
    let cells: Vec<(usize, usize, Option<f64>)> = pairs
        .par_iter()
        .map(|&(i, j)| {
            let r2 = if monomorphic[i] || monomorphic[j] {
                None
            } else if i == j {
                Some(1.0)
            } else {
                pairwise_r2(&columns[i], &columns[j])
            };
            pb.inc(1);
            (i, j, r2)
        })
        .collect();
    pb.finish_and_clear();

    let mut values = Array2::<Option<f64>>::from_elem((k, k), None);
    for (i, j, r2) in cells {
        values[[i, j]] = r2;
        values[[j, i]] = r2;
    }
    LdMatrix {
        variant_ids,
        values,
    }
}

/// Window selection, genotype intersection, MAF filtering and pairwise r².
/// Every structural failure is fatal for the focal SNP.
pub fn compute_ld(
    genotypes: &GenotypeMatrix,
    annotation: &VariantAnnotation,
    config: &LdConfig,
) -> Result<LdResult, GwasError> {
    set_stage(ProcessingStage::LinkageDisequilibrium);
    let window = select_window(annotation, config)?;
    let mut report = LdReport {
        in_window: window.len(),
        ..Default::default()
    };

    let present: Vec<(&VariantRecord, usize)> = window
        .iter()
        .filter_map(|r| genotypes.variant_position(&r.variant_id).map(|j| (*r, j)))
        .collect();
    report.genotyped = present.len();
    if present.len() < 2 {
        return Err(GwasError::TooFewVariants {
            found: present.len(),
            stage: "available after merging annotation and genotypes",
            remedy: "(1) check SNP identifiers match between files (2) larger window size",
        });
    }

    let mut ids = Vec::with_capacity(present.len());
    let mut columns = Vec::with_capacity(present.len());
    for (record, j) in present {
        let column = numeric_column(genotypes, j);
        match mean_allele_frequency(&column) {
            None => report.all_missing += 1,
            Some(freq) if freq < config.min_maf => {
                log(
                    LogLevel::Debug,
                    &format!("SNP {} frequency {:.4} below min_maf", record.variant_id, freq),
                );
                report.below_min_maf += 1;
            }
            Some(_) => {
                ids.push(record.variant_id.clone());
                columns.push(column);
            }
        }
    }
    report.retained = ids.len();
    if ids.len() < 2 {
        return Err(GwasError::TooFewVariants {
            found: ids.len(),
            stage: "passed the MAF filter",
            remedy: "(1) lower MAF threshold (2) larger window size",
        });
    }
    report.monomorphic = columns.iter().filter(|c| is_monomorphic(c)).count();

    log(
        LogLevel::Info,
        &format!("Calculating LD for {} SNPs...", ids.len()),
    );
    let matrix = ld_matrix(ids, &columns);

    display_status_box(StatusBox {
        title: format!("LD around {} ({}kb window)", config.focal_variant, config.window_kb),
        stats: vec![
            ("Annotated SNPs in window".to_string(), report.in_window.to_string()),
            ("Present in genotypes".to_string(), report.genotyped.to_string()),
            ("Entirely missing".to_string(), report.all_missing.to_string()),
            (format!("Below MAF {}", config.min_maf), report.below_min_maf.to_string()),
            ("Retained".to_string(), report.retained.to_string()),
            ("Monomorphic (undefined r²)".to_string(), report.monomorphic.to_string()),
        ],
    });

    Ok(LdResult { matrix, report })
}
