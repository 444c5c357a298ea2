//! Tab-separated writers for every command's results.

use crate::assoc::AssociationResult;
use crate::freq::FrequencyRecord;
use crate::genotype::{GenotypeMatrix, MissingCode, VariantAnnotation};
use crate::ld::LdMatrix;
use crate::process::GwasError;
use crate::progress::create_spinner;
use crate::qc::QcReport;
use crate::tophits::TopHits;

use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const ASSOCIATION_COLUMNS: [&str; 10] = [
    "snp_id",
    "chrom",
    "pos",
    "beta",
    "se",
    "z",
    "p_value",
    "maf",
    "n_samples",
    "status",
];

fn create_tsv_writer(path: &Path) -> Result<Writer<BufWriter<File>>, GwasError> {
    let file = File::create(path)?;
    Ok(WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(BufWriter::new(file)))
}

/// Formats an `Option<f64>` with the given precision, `None` and NaN as "NA".
pub fn format_optional_float(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{:.*}", decimals, v),
        _ => "NA".to_string(),
    }
}

/// Scientific notation keeps very small p-values distinguishable.
pub fn format_p_value(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{:.6e}", v),
        _ => "NA".to_string(),
    }
}

fn format_optional_usize(value: Option<usize>) -> String {
    value.map_or_else(|| "NA".to_string(), |v| v.to_string())
}

/// Samples x SNPs table; missing cells are written as the missing code.
pub fn write_genotype_matrix(
    genotypes: &GenotypeMatrix,
    missing: &MissingCode,
    path: &Path,
) -> Result<(), GwasError> {
    let spinner = create_spinner(&format!("Writing genotypes to {}", path.display()));
    let mut writer = create_tsv_writer(path)?;
    let mut header = Vec::with_capacity(genotypes.n_variants() + 1);
    header.push("sample_id");
    header.extend(genotypes.variant_ids().iter().map(String::as_str));
    writer.write_record(&header)?;

    for (i, sample) in genotypes.sample_ids().iter().enumerate() {
        let mut row = Vec::with_capacity(genotypes.n_variants() + 1);
        row.push(sample.clone());
        row.extend(genotypes.sample_row(i).iter().map(|d| match d {
            Some(v) => v.to_string(),
            None => missing.as_str().to_string(),
        }));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    spinner.finish_and_clear();
    Ok(())
}

pub fn write_annotation(annotation: &VariantAnnotation, path: &Path) -> Result<(), GwasError> {
    let mut writer = create_tsv_writer(path)?;
    writer.write_record(["snp_id", "chrom", "pos", "maf"])?;
    for record in annotation.records() {
        writer.write_record(&[
            record.variant_id.clone(),
            record.chromosome.clone(),
            record.position.to_string(),
            record.reference_maf.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_sample_list(samples: &[String], path: &Path) -> Result<(), GwasError> {
    let mut writer = create_tsv_writer(path)?;
    writer.write_record(["sample_id"])?;
    for sample in samples {
        writer.write_record([sample])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_qc_report(report: &QcReport, path: &Path) -> Result<(), GwasError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "Initial SNPs: {}", report.initial_variants)?;
    writeln!(
        out,
        "SNPs after missingness filter: {}",
        report.post_missingness_variants
    )?;
    writeln!(out, "SNPs after MAF filter: {}", report.post_maf_variants)?;
    writeln!(out, "Samples retained: {}", report.retained_samples)?;
    writeln!(
        out,
        "SNPs without annotation: {}",
        report.unannotated_variants.len()
    )?;
    out.flush()?;
    Ok(())
}

/// Frequency table, optionally left-joined with the annotation on `snp_id`.
pub fn write_frequency_table(
    records: &[FrequencyRecord],
    annotation: Option<&VariantAnnotation>,
    path: &Path,
) -> Result<(), GwasError> {
    let mut writer = create_tsv_writer(path)?;
    let mut header = vec!["snp_id", "count_0", "count_1", "count_2", "n_non_missing", "MAF"];
    if annotation.is_some() {
        header.extend(["chrom", "pos", "maf"]);
    }
    writer.write_record(&header)?;

    for record in records {
        let counts = record.counts;
        let mut row = vec![
            record.variant_id.clone(),
            format_optional_usize(counts.map(|c| c.count_0)),
            format_optional_usize(counts.map(|c| c.count_1)),
            format_optional_usize(counts.map(|c| c.count_2)),
            record.n_non_missing.to_string(),
            format_optional_float(record.maf, 6),
        ];
        if let Some(annotation) = annotation {
            match annotation.get(&record.variant_id) {
                Some(a) => row.extend([
                    a.chromosome.clone(),
                    a.position.to_string(),
                    a.reference_maf.to_string(),
                ]),
                None => row.extend(["NA".to_string(), "NA".to_string(), "NA".to_string()]),
            }
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per tested SNP. Failed fits keep their row with `NA` statistics.
pub fn write_association_results(
    results: &[AssociationResult],
    path: &Path,
) -> Result<(), GwasError> {
    let mut writer = create_tsv_writer(path)?;
    writer.write_record(ASSOCIATION_COLUMNS)?;
    for result in results {
        let (stats, status) = match &result.stats {
            Ok(s) => (Some(*s), "ok".to_string()),
            Err(failure) => (None, format!("fit_failed:{}", failure.code())),
        };
        writer.write_record(&[
            result.variant_id.clone(),
            result.chromosome.clone(),
            result.position.to_string(),
            format_optional_float(stats.map(|s| s.beta), 6),
            format_optional_float(stats.map(|s| s.standard_error), 6),
            format_optional_float(stats.map(|s| s.z), 6),
            format_p_value(stats.map(|s| s.p_value)),
            result.maf.to_string(),
            result.n_samples.to_string(),
            status,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Square r² matrix with SNP identifiers as the first row and column.
pub fn write_ld_matrix(matrix: &LdMatrix, path: &Path) -> Result<(), GwasError> {
    let mut writer = create_tsv_writer(path)?;
    let mut header = Vec::with_capacity(matrix.len() + 1);
    header.push("snp_id");
    header.extend(matrix.variant_ids().iter().map(String::as_str));
    writer.write_record(&header)?;

    for (i, id) in matrix.variant_ids().iter().enumerate() {
        let mut row = Vec::with_capacity(matrix.len() + 1);
        row.push(id.clone());
        row.extend((0..matrix.len()).map(|j| format_optional_float(matrix.get(i, j), 4)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Input columns as read, then `neg_log10_p` and `significant`.
pub fn write_top_hits(hits: &TopHits, path: &Path) -> Result<(), GwasError> {
    let mut writer = create_tsv_writer(path)?;
    let mut header: Vec<&str> = hits.headers.iter().map(String::as_str).collect();
    header.extend(["neg_log10_p", "significant"]);
    writer.write_record(&header)?;
    for hit in &hits.rows {
        let mut row = hit.fields.clone();
        row.push(format!("{:.6}", hit.neg_log10_p));
        row.push(hit.significant.to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
