//! Strongest associations from a results table, ranked by p-value.

use crate::genotype::parse_optional_numeric;
use crate::parse::{check_record_width, clean_headers, line_of, open_table_reader, require_columns};
use crate::process::GwasError;
use crate::progress::{log, LogLevel};

use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 4] = ["snp_id", "chrom", "pos", "p_value"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopHitsConfig {
    pub p_threshold: f64,
    pub top_n: usize,
}

impl TopHitsConfig {
    pub fn new(p_threshold: f64, top_n: usize) -> Result<Self, GwasError> {
        if !p_threshold.is_finite() || p_threshold <= 0.0 || p_threshold > 1.0 {
            return Err(GwasError::Config(format!(
                "p_threshold must lie in (0, 1], got {}",
                p_threshold
            )));
        }
        if top_n == 0 {
            return Err(GwasError::Config("top_n must be at least 1".to_string()));
        }
        Ok(TopHitsConfig { p_threshold, top_n })
    }
}

/// One row of an association table with its parsed p-value.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRow {
    pub fields: Vec<String>,
    pub p_value: Option<f64>,
}

/// An association table read back from disk, all columns preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationTable {
    pub headers: Vec<String>,
    pub rows: Vec<AssociationRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopHit {
    pub fields: Vec<String>,
    pub p_value: f64,
    pub neg_log10_p: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopHits {
    pub headers: Vec<String>,
    pub rows: Vec<TopHit>,
}

pub fn read_association_table(path: &Path) -> Result<AssociationTable, GwasError> {
    let mut reader = open_table_reader(path)?;
    let headers = clean_headers(&mut reader)?;
    let columns = require_columns(&headers, &REQUIRED_COLUMNS, path)?;
    let p_col = columns["p_value"];

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_of(&record, i);
        check_record_width(&record, headers.len(), line, path)?;
        let bad = |message: String| GwasError::Parse {
            path: path.display().to_string(),
            line,
            column: "p_value".to_string(),
            message,
        };
        let p_value = parse_optional_numeric(&record[p_col]).map_err(bad)?;
        if let Some(p) = p_value {
            if !(0.0..=1.0).contains(&p) {
                return Err(bad(format!("{} is not a probability", p)));
            }
        }
        rows.push(AssociationRow {
            fields: record.iter().map(|f| f.trim().to_string()).collect(),
            p_value,
        });
    }
    log(
        LogLevel::Info,
        &format!("Read {} association rows from {}", rows.len(), path.display()),
    );
    Ok(AssociationTable { headers, rows })
}

/// Drops undefined p-values, sorts ascending (ties keep input order) and keeps
/// the first `top_n`. A p-value of 0 ranks first with an infinite `-log10 p`.
pub fn select_top_hits(table: &AssociationTable, config: &TopHitsConfig) -> TopHits {
    let mut defined: Vec<(&AssociationRow, f64)> = table
        .rows
        .iter()
        .filter_map(|row| row.p_value.map(|p| (row, p)))
        .collect();
    let undefined = table.rows.len() - defined.len();
    if undefined > 0 {
        log(
            LogLevel::Debug,
            &format!("Ignoring {} rows without a p-value", undefined),
        );
    }
    defined.sort_by(|a, b| a.1.total_cmp(&b.1));

    let rows = defined
        .into_iter()
        .take(config.top_n)
        .map(|(row, p)| TopHit {
            fields: row.fields.clone(),
            p_value: p,
            neg_log10_p: -p.log10(),
            significant: p < config.p_threshold,
        })
        .collect();
    TopHits {
        headers: table.headers.clone(),
        rows,
    }
}
