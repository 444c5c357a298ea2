use crate::genotype::{
    parse_optional_numeric, CovariateColumn, Dosage, GenotypeMatrix, MissingCode, SampleTable,
    VariantAnnotation, VariantRecord,
};
use crate::process::GwasError;
use crate::progress::{create_spinner, log, LogLevel};

use csv::{Reader, ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use itertools::Itertools;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const ANNOTATION_COLUMNS: [&str; 4] = ["snp_id", "chrom", "pos", "maf"];

/// Opens a tab-separated table, transparently decompressing `.gz` files.
pub fn open_table_reader(path: &Path) -> Result<Reader<Box<dyn Read>>, GwasError> {
    let file = File::open(path)?;
    let inner: Box<dyn Read> = if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(inner))
}

/// Header names with surrounding whitespace removed.
pub(crate) fn clean_headers(reader: &mut Reader<Box<dyn Read>>) -> Result<Vec<String>, GwasError> {
    Ok(reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect())
}

/// Maps each required column to its index, or fails listing every absent one.
pub(crate) fn require_columns(
    headers: &[String],
    required: &[&str],
    table: &Path,
) -> Result<HashMap<String, usize>, GwasError> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(GwasError::MissingColumns {
            table: table.display().to_string(),
            missing: missing.iter().join(", "),
        });
    }
    Ok(required
        .iter()
        .filter_map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .map(|i| (name.to_string(), i))
        })
        .collect())
}

pub(crate) fn check_record_width(
    record: &StringRecord,
    expected: usize,
    line: u64,
    path: &Path,
) -> Result<(), GwasError> {
    if record.len() != expected {
        return Err(GwasError::Parse {
            path: path.display().to_string(),
            line,
            column: "*".to_string(),
            message: format!(
                "record has {} fields but the header has {}; check for missing tabs",
                record.len(),
                expected
            ),
        });
    }
    Ok(())
}

pub(crate) fn line_of(record: &StringRecord, fallback: usize) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or(fallback as u64 + 2)
}

/// Reads a samples x SNPs genotype table. The first column holds sample ids.
pub fn read_genotype_matrix(path: &Path, missing: &MissingCode) -> Result<GenotypeMatrix, GwasError> {
    let spinner = create_spinner(&format!("Reading genotypes from {}", path.display()));
    let mut reader = open_table_reader(path)?;
    let headers = clean_headers(&mut reader)?;
    if headers.len() < 2 {
        spinner.finish_and_clear();
        return Err(GwasError::Config(format!(
            "Genotype file {} needs a sample column followed by at least one SNP column",
            path.display()
        )));
    }
    let variant_ids: Vec<String> = headers[1..].to_vec();

    let mut sample_ids = Vec::new();
    let mut rows: Vec<Vec<Dosage>> = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_of(&record, i);
        check_record_width(&record, headers.len(), line, path)?;

        sample_ids.push(record[0].trim().to_string());
        let mut row = Vec::with_capacity(variant_ids.len());
        for (j, cell) in record.iter().enumerate().skip(1) {
            let dosage = missing.parse_dosage(cell).map_err(|message| GwasError::Parse {
                path: path.display().to_string(),
                line,
                column: headers[j].clone(),
                message,
            })?;
            row.push(dosage);
        }
        rows.push(row);
    }
    spinner.finish_and_clear();

    let matrix = GenotypeMatrix::from_rows(sample_ids, variant_ids, rows)?;
    log(
        LogLevel::Info,
        &format!(
            "Loaded {} samples x {} SNPs from {}",
            matrix.n_samples(),
            matrix.n_variants(),
            path.display()
        ),
    );
    Ok(matrix)
}

/// Reads the SNP annotation. All of `snp_id`, `chrom`, `pos`, `maf` are required.
pub fn read_variant_annotation(path: &Path) -> Result<VariantAnnotation, GwasError> {
    let mut reader = open_table_reader(path)?;
    let headers = clean_headers(&mut reader)?;
    log(
        LogLevel::Debug,
        &format!("Annotation columns: {:?}", headers),
    );
    let columns = require_columns(&headers, &ANNOTATION_COLUMNS, path)?;
    let (id_col, chrom_col, pos_col, maf_col) = (
        columns["snp_id"],
        columns["chrom"],
        columns["pos"],
        columns["maf"],
    );

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_of(&record, i);
        check_record_width(&record, headers.len(), line, path)?;
        let bad = |column: &str, message: String| GwasError::Parse {
            path: path.display().to_string(),
            line,
            column: column.to_string(),
            message,
        };

        let position = record[pos_col]
            .trim()
            .parse::<u64>()
            .map_err(|_| bad("pos", format!("'{}' is not a non-negative integer", &record[pos_col])))?;
        let maf = record[maf_col].trim().parse::<f64>().map_err(|_| {
            bad(
                "maf",
                format!(
                    "'{}' is not numeric; ensure all maf values are numeric",
                    &record[maf_col]
                ),
            )
        })?;
        if !(0.0..=1.0).contains(&maf) {
            return Err(bad("maf", format!("{} is outside [0, 1]", maf)));
        }

        records.push(VariantRecord {
            variant_id: record[id_col].trim().to_string(),
            chromosome: record[chrom_col].trim().to_string(),
            position,
            reference_maf: maf,
        });
    }

    let annotation = VariantAnnotation::new(records)?;
    log(
        LogLevel::Info,
        &format!("Loaded annotation for {} SNPs from {}", annotation.len(), path.display()),
    );
    Ok(annotation)
}

/// Reads the sample table: `sample_id`, binary `phenotype` and the requested
/// covariate columns. Unrequested columns are ignored.
pub fn read_sample_table(path: &Path, covariates: &[String]) -> Result<SampleTable, GwasError> {
    let mut reader = open_table_reader(path)?;
    let headers = clean_headers(&mut reader)?;

    let mut required: Vec<&str> = vec!["sample_id", "phenotype"];
    required.extend(covariates.iter().map(|c| c.as_str()));
    let columns = require_columns(&headers, &required, path)?;

    let mut sample_ids = Vec::new();
    let mut phenotype = Vec::new();
    let mut covariate_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); covariates.len()];

    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_of(&record, i);
        check_record_width(&record, headers.len(), line, path)?;
        let parse_cell = |name: &str| {
            parse_optional_numeric(&record[columns[name]]).map_err(|message| GwasError::Parse {
                path: path.display().to_string(),
                line,
                column: name.to_string(),
                message,
            })
        };

        sample_ids.push(record[columns["sample_id"]].trim().to_string());
        phenotype.push(parse_cell("phenotype")?);
        for (k, name) in covariates.iter().enumerate() {
            covariate_values[k].push(parse_cell(name.as_str())?);
        }
    }

    let covariate_columns = covariates
        .iter()
        .cloned()
        .zip(covariate_values)
        .map(|(name, values)| CovariateColumn { name, values })
        .collect();
    let table = SampleTable::new(sample_ids, phenotype, covariate_columns)?;
    log(
        LogLevel::Info,
        &format!(
            "Loaded {} samples with {} covariate(s) from {}",
            table.len(),
            covariates.len(),
            path.display()
        ),
    );
    Ok(table)
}

/// Reads a single-column `sample_id` list.
pub fn read_sample_subset(path: &Path) -> Result<Vec<String>, GwasError> {
    let mut reader = open_table_reader(path)?;
    let headers = clean_headers(&mut reader)?;
    let columns = require_columns(&headers, &["sample_id"], path)?;
    let id_col = columns["sample_id"];

    let mut ids = Vec::new();
    for result in reader.records() {
        let record = result?;
        if let Some(id) = record.get(id_col).map(str::trim).filter(|s| !s.is_empty()) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
