// genotype.rs

use crate::process::GwasError;

use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashMap;

/// Minimum number of non-missing observations for a per-variant statistic.
pub const MIN_NON_MISSING: usize = 10;

/// Tokens treated as undefined in numeric phenotype/covariate columns.
const UNDEFINED_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "."];

/// A genotype cell: an allele dosage in {0,1,2}, or `None` when missing.
pub type Dosage = Option<u8>;

/// The configured missing-genotype sentinel.
///
/// The sentinel is coerced once at construction. Cells are compared against
/// the raw string and, when the sentinel is numeric, against its value.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingCode {
    raw: String,
    numeric: Option<f64>,
}

impl MissingCode {
    pub fn new(raw: &str) -> Result<Self, GwasError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(GwasError::Config(
                "Missing code must not be empty".to_string(),
            ));
        }
        let numeric = raw.parse::<f64>().ok().filter(|v| v.is_finite());
        if let Some(v) = numeric {
            if v == 0.0 || v == 1.0 || v == 2.0 {
                return Err(GwasError::Config(format!(
                    "Missing code '{}' collides with a genotype dosage (0, 1 or 2)",
                    raw
                )));
            }
        }
        Ok(MissingCode {
            raw: raw.to_string(),
            numeric,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if `cell` denotes the sentinel.
    pub fn matches(&self, cell: &str) -> bool {
        let cell = cell.trim();
        if cell == self.raw {
            return true;
        }
        match (self.numeric, cell.parse::<f64>()) {
            (Some(code), Ok(v)) => v == code,
            _ => false,
        }
    }

    /// Parses a genotype cell. `Ok(None)` is a missing genotype, `Err` carries
    /// a description of why the value is not a valid dosage.
    pub fn parse_dosage(&self, cell: &str) -> Result<Dosage, String> {
        let trimmed = cell.trim();
        if trimmed.is_empty() || self.matches(trimmed) {
            return Ok(None);
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| format!("'{}' is neither a dosage nor the missing code '{}'", trimmed, self.raw))?;
        if value == 0.0 || value == 1.0 || value == 2.0 {
            Ok(Some(value as u8))
        } else {
            Err(format!("dosage '{}' is outside {{0, 1, 2}}", trimmed))
        }
    }
}

/// Parses an optional numeric value from a phenotype or covariate cell.
pub fn parse_optional_numeric(cell: &str) -> Result<Option<f64>, String> {
    let trimmed = cell.trim();
    if UNDEFINED_TOKENS.contains(&trimmed) {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(format!("'{}' is not numeric", trimmed)),
    }
}

/// Builds an identifier -> position index, rejecting duplicates.
pub fn index_ids(ids: &[String], kind: &'static str) -> Result<HashMap<String, usize>, GwasError> {
    let mut index = HashMap::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        if index.insert(id.clone(), i).is_some() {
            return Err(GwasError::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(index)
}

/// Sample x variant dosage table.
///
/// Never mutated after construction; filtering produces a new matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeMatrix {
    sample_ids: Vec<String>,
    variant_ids: Vec<String>,
    sample_index: HashMap<String, usize>,
    variant_index: HashMap<String, usize>,
    dosages: Array2<Dosage>,
}

impl GenotypeMatrix {
    pub fn new(
        sample_ids: Vec<String>,
        variant_ids: Vec<String>,
        dosages: Array2<Dosage>,
    ) -> Result<Self, GwasError> {
        if dosages.nrows() != sample_ids.len() || dosages.ncols() != variant_ids.len() {
            return Err(GwasError::Config(format!(
                "Genotype grid is {}x{} but {} sample and {} variant identifiers were given",
                dosages.nrows(),
                dosages.ncols(),
                sample_ids.len(),
                variant_ids.len()
            )));
        }
        if let Some(bad) = dosages.iter().flatten().find(|d| **d > 2) {
            return Err(GwasError::Config(format!(
                "Genotype grid contains dosage {} outside {{0, 1, 2}}",
                bad
            )));
        }
        let sample_index = index_ids(&sample_ids, "sample")?;
        let variant_index = index_ids(&variant_ids, "variant")?;
        Ok(GenotypeMatrix {
            sample_ids,
            variant_ids,
            sample_index,
            variant_index,
            dosages,
        })
    }

    /// Builds a matrix from per-sample rows. Used by loaders and tests.
    pub fn from_rows(
        sample_ids: Vec<String>,
        variant_ids: Vec<String>,
        rows: Vec<Vec<Dosage>>,
    ) -> Result<Self, GwasError> {
        let n_variants = variant_ids.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_variants) {
            return Err(GwasError::Config(format!(
                "Genotype row {} has {} cells, expected {}",
                i + 1,
                row.len(),
                n_variants
            )));
        }
        let flat: Vec<Dosage> = rows.into_iter().flatten().collect();
        let dosages = Array2::from_shape_vec((sample_ids.len(), n_variants), flat)
            .map_err(|e| GwasError::Config(format!("Invalid genotype grid shape: {}", e)))?;
        Self::new(sample_ids, variant_ids, dosages)
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn variant_ids(&self) -> &[String] {
        &self.variant_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn n_variants(&self) -> usize {
        self.variant_ids.len()
    }

    pub fn sample_position(&self, sample_id: &str) -> Option<usize> {
        self.sample_index.get(sample_id).copied()
    }

    pub fn variant_position(&self, variant_id: &str) -> Option<usize> {
        self.variant_index.get(variant_id).copied()
    }

    /// Dosages of one variant across all samples.
    pub fn variant_column(&self, variant: usize) -> ArrayView1<'_, Dosage> {
        self.dosages.column(variant)
    }

    /// Dosages of one sample across all variants.
    pub fn sample_row(&self, sample: usize) -> ArrayView1<'_, Dosage> {
        self.dosages.row(sample)
    }

    pub fn dosage(&self, sample: usize, variant: usize) -> Dosage {
        self.dosages[[sample, variant]]
    }

    /// Returns a new matrix with the given rows and columns, in the given order.
    pub fn select(&self, samples: &[usize], variants: &[usize]) -> Result<Self, GwasError> {
        let dosages = self
            .dosages
            .select(Axis(0), samples)
            .select(Axis(1), variants);
        let sample_ids = samples.iter().map(|&i| self.sample_ids[i].clone()).collect();
        let variant_ids = variants.iter().map(|&j| self.variant_ids[j].clone()).collect();
        Self::new(sample_ids, variant_ids, dosages)
    }

    /// Restricts the sample universe to `subset`, preserving the subset order.
    /// Every subset identifier must be present in the matrix.
    pub fn restrict_samples(&self, subset: &[String]) -> Result<Self, GwasError> {
        let unknown: Vec<String> = subset
            .iter()
            .filter(|id| !self.sample_index.contains_key(id.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(GwasError::UnknownSamples(unknown));
        }
        let rows: Vec<usize> = subset.iter().filter_map(|id| self.sample_position(id)).collect();
        let all_variants: Vec<usize> = (0..self.n_variants()).collect();
        self.select(&rows, &all_variants)
    }
}

/// One annotation record.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub variant_id: String,
    pub chromosome: String,
    pub position: u64,
    pub reference_maf: f64,
}

/// Per-variant metadata with lookup by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantAnnotation {
    records: Vec<VariantRecord>,
    index: HashMap<String, usize>,
}

impl VariantAnnotation {
    pub fn new(records: Vec<VariantRecord>) -> Result<Self, GwasError> {
        for record in &records {
            if !(0.0..=1.0).contains(&record.reference_maf) {
                return Err(GwasError::Config(format!(
                    "MAF {} for variant {} is outside [0, 1]",
                    record.reference_maf, record.variant_id
                )));
            }
        }
        let ids: Vec<String> = records.iter().map(|r| r.variant_id.clone()).collect();
        let index = index_ids(&ids, "annotated variant")?;
        Ok(VariantAnnotation { records, index })
    }

    pub fn get(&self, variant_id: &str) -> Option<&VariantRecord> {
        self.index.get(variant_id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.index.contains_key(variant_id)
    }

    pub fn records(&self) -> &[VariantRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keeps the records whose identifier satisfies `keep`, in annotation order.
    pub fn retain_ids<F>(&self, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let records: Vec<VariantRecord> = self
            .records
            .iter()
            .filter(|r| keep(&r.variant_id))
            .cloned()
            .collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.variant_id.clone(), i))
            .collect();
        VariantAnnotation { records, index }
    }
}

/// A named numeric per-sample column.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Per-sample phenotype and covariates, stored column-wise.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    sample_ids: Vec<String>,
    index: HashMap<String, usize>,
    phenotype: Vec<Option<f64>>,
    covariates: Vec<CovariateColumn>,
}

impl SampleTable {
    pub fn new(
        sample_ids: Vec<String>,
        phenotype: Vec<Option<f64>>,
        covariates: Vec<CovariateColumn>,
    ) -> Result<Self, GwasError> {
        if phenotype.len() != sample_ids.len() {
            return Err(GwasError::Config(format!(
                "Phenotype column has {} values for {} samples",
                phenotype.len(),
                sample_ids.len()
            )));
        }
        if let Some((i, v)) = phenotype
            .iter()
            .enumerate()
            .find_map(|(i, p)| p.filter(|v| *v != 0.0 && *v != 1.0).map(|v| (i, v)))
        {
            return Err(GwasError::Config(format!(
                "Phenotype for sample {} is {}, expected 0 or 1",
                sample_ids[i], v
            )));
        }
        for column in &covariates {
            if column.values.len() != sample_ids.len() {
                return Err(GwasError::Config(format!(
                    "Covariate '{}' has {} values for {} samples",
                    column.name,
                    column.values.len(),
                    sample_ids.len()
                )));
            }
        }
        let index = index_ids(&sample_ids, "phenotype sample")?;
        Ok(SampleTable {
            sample_ids,
            index,
            phenotype,
            covariates,
        })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    pub fn position(&self, sample_id: &str) -> Option<usize> {
        self.index.get(sample_id).copied()
    }

    pub fn phenotype(&self, sample: usize) -> Option<f64> {
        self.phenotype[sample]
    }

    pub fn covariate(&self, name: &str) -> Option<&CovariateColumn> {
        self.covariates.iter().find(|c| c.name == name)
    }

    pub fn covariate_names(&self) -> impl Iterator<Item = &str> {
        self.covariates.iter().map(|c| c.name.as_str())
    }
}
