use crate::assoc::{run_association_scan, AssocConfig};
use crate::freq::calculate_frequencies;
use crate::genotype::MissingCode;
use crate::ld::{compute_ld, LdConfig};
use crate::output::{
    write_annotation, write_association_results, write_frequency_table, write_genotype_matrix,
    write_ld_matrix, write_qc_report, write_sample_list, write_top_hits,
};
use crate::parse::{
    read_genotype_matrix, read_sample_subset, read_sample_table, read_variant_annotation,
};
use crate::progress::{log, set_stage, LogLevel, ProcessingStage};
use crate::qc::{filter_genotypes, QcThresholds};
use crate::regression::LogisticConfig;
use crate::tophits::{read_association_table, select_top_hits, TopHitsConfig};

use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Custom error types
#[derive(Debug, Error)]
pub enum GwasError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Parse error in {path} (line {line}, column '{column}'): {message}")]
    Parse {
        path: String,
        line: u64,
        column: String,
        message: String,
    },
    #[error("Duplicate {kind} identifier '{id}'")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{table} is missing required columns: {missing}")]
    MissingColumns { table: String, missing: String },
    #[error("Sample subset references {} unknown sample(s): {}", .0.len(), .0.join(", "))]
    UnknownSamples(Vec<String>),
    #[error("Focal SNP {0} not found in annotation")]
    FocalVariantNotFound(String),
    #[error("No SNPs in {window_kb}kb window around {focal}\nTry: a larger window size")]
    EmptyWindow { focal: String, window_kb: f64 },
    #[error("Only {found} SNP(s) {stage}\nTry: {remedy}")]
    TooFewVariants {
        found: usize,
        stage: &'static str,
        remedy: &'static str,
    },
    #[error("Design matrix column '{0}' would be added twice")]
    DuplicateDesignColumn(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

// Define command-line arguments using clap
#[derive(Parser, Debug)]
#[command(author, version, about = "Variant-wise QC, allele frequency, association and LD scans", long_about = None)]
pub struct Args {
    /// Number of worker threads
    #[arg(long = "threads", global = true, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter variants and samples by missingness and MAF
    Qc(QcArgs),
    /// Compute per-variant genotype counts and MAF
    Freq(FreqArgs),
    /// Logistic regression association scan
    Assoc(AssocArgs),
    /// Pairwise r² around a focal SNP
    Ld(LdArgs),
    /// Extract the strongest hits from an association table
    #[command(name = "top-hits")]
    TopHits(TopHitsArgs),
}

#[derive(ClapArgs, Debug)]
pub struct QcArgs {
    /// Genotype matrix (samples x SNPs, TSV)
    #[arg(short, long = "genotypes")]
    pub genotypes: PathBuf,

    /// SNP annotation with snp_id, chrom, pos, maf
    #[arg(short, long = "snp_annotation")]
    pub snp_annotation: PathBuf,

    /// Output directory
    #[arg(short, long = "output_dir")]
    pub output_dir: PathBuf,

    /// Minimum annotation MAF
    #[arg(long = "maf_threshold", default_value = "0.05")]
    pub maf_threshold: f64,

    /// Maximum SNP missingness
    #[arg(long = "snp_missing_threshold", default_value = "0.1")]
    pub snp_missing_threshold: f64,

    /// Maximum sample missingness
    #[arg(long = "sample_missing_threshold", default_value = "0.1")]
    pub sample_missing_threshold: f64,

    /// Missing genotype code
    #[arg(short, long = "missing_code", default_value = "-9")]
    pub missing_code: String,
}

#[derive(ClapArgs, Debug)]
pub struct FreqArgs {
    #[arg(short, long = "genotypes")]
    pub genotypes: PathBuf,

    #[arg(short, long = "output_dir")]
    pub output_dir: PathBuf,

    #[arg(short, long = "missing_code", default_value = "-9")]
    pub missing_code: String,

    /// Optional list of sample_id values restricting the samples used
    #[arg(long = "sample_subset")]
    pub sample_subset: Option<PathBuf>,

    /// Optional SNP annotation merged into the output
    #[arg(short, long = "snp_annotation")]
    pub snp_annotation: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct AssocArgs {
    #[arg(short, long = "genotypes")]
    pub genotypes: PathBuf,

    /// Sample table with sample_id, phenotype and covariate columns
    #[arg(short, long = "phenotypes")]
    pub phenotypes: PathBuf,

    #[arg(short, long = "output_dir")]
    pub output_dir: PathBuf,

    /// Comma-separated covariate names, or NA for none
    #[arg(short, long = "covariates", default_value = "NA")]
    pub covariates: String,

    #[arg(long = "maf_threshold", default_value = "0.05")]
    pub maf_threshold: f64,

    #[arg(short, long = "missing_code", default_value = "-9")]
    pub missing_code: String,

    #[arg(short, long = "snp_annotation")]
    pub snp_annotation: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct LdArgs {
    #[arg(short, long = "genotypes")]
    pub genotypes: PathBuf,

    #[arg(short, long = "snp_annotation")]
    pub snp_annotation: PathBuf,

    /// SNP at the centre of the window
    #[arg(short, long = "focal_snp")]
    pub focal_snp: String,

    /// Window size in kilobases
    #[arg(short, long = "window_kb", default_value = "100")]
    pub window_kb: f64,

    /// Minimum sample MAF for a SNP to enter the matrix
    #[arg(long = "min_maf", default_value = "0.01")]
    pub min_maf: f64,

    #[arg(short, long = "missing_code", default_value = "-9")]
    pub missing_code: String,

    #[arg(long = "sample_subset")]
    pub sample_subset: Option<PathBuf>,

    /// Output LD matrix (TSV)
    #[arg(short, long = "output")]
    pub output: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct TopHitsArgs {
    /// Association results (TSV)
    #[arg(short, long = "input")]
    pub input: PathBuf,

    #[arg(short, long = "output")]
    pub output: PathBuf,

    /// Significance threshold
    #[arg(short, long = "p_threshold", default_value = "5e-8")]
    pub p_threshold: f64,

    /// Number of hits to keep
    #[arg(short = 'n', long = "top_n", default_value = "10")]
    pub top_n: usize,
}

/// Splits a comma-separated covariate list. `NA` or an empty string means none.
pub fn parse_covariate_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "NA" {
        return Vec::new();
    }
    trimmed
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn ensure_output_dir(dir: &Path) -> Result<(), GwasError> {
    fs::create_dir_all(dir)?;
    Ok(())
}

fn ensure_parent_dir(file: &Path) -> Result<(), GwasError> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_output_dir(parent),
        _ => Ok(()),
    }
}

pub fn run_command(command: &Command) -> Result<(), GwasError> {
    match command {
        Command::Qc(args) => run_qc(args),
        Command::Freq(args) => run_freq(args),
        Command::Assoc(args) => run_assoc(args),
        Command::Ld(args) => run_ld(args),
        Command::TopHits(args) => run_top_hits(args),
    }
}

pub fn run_qc(args: &QcArgs) -> Result<(), GwasError> {
    let thresholds = QcThresholds::new(
        args.maf_threshold,
        args.snp_missing_threshold,
        args.sample_missing_threshold,
    )?;
    let missing = MissingCode::new(&args.missing_code)?;

    set_stage(ProcessingStage::Loading);
    let genotypes = read_genotype_matrix(&args.genotypes, &missing)?;
    let annotation = read_variant_annotation(&args.snp_annotation)?;

    let result = filter_genotypes(&genotypes, &annotation, &missing, &thresholds)?;

    set_stage(ProcessingStage::Writing);
    ensure_output_dir(&args.output_dir)?;
    write_genotype_matrix(
        &result.genotypes,
        &missing,
        &args.output_dir.join("filtered_genotypes.tsv"),
    )?;
    write_annotation(
        &result.annotation,
        &args.output_dir.join("filtered_snp_annotation.tsv"),
    )?;
    write_sample_list(
        &result.retained_samples,
        &args.output_dir.join("filtered_samples.tsv"),
    )?;
    write_qc_report(&result.report, &args.output_dir.join("qc_report.txt"))?;
    log(
        LogLevel::Info,
        &format!("QC outputs written to {}", args.output_dir.display()),
    );
    Ok(())
}

pub fn run_freq(args: &FreqArgs) -> Result<(), GwasError> {
    let missing = MissingCode::new(&args.missing_code)?;

    set_stage(ProcessingStage::Loading);
    let mut genotypes = read_genotype_matrix(&args.genotypes, &missing)?;
    match &args.sample_subset {
        Some(path) => {
            let subset = read_sample_subset(path)?;
            genotypes = genotypes.restrict_samples(&subset)?;
            log(
                LogLevel::Info,
                &format!(
                    "Restricted genotypes to {} samples from {}",
                    genotypes.n_samples(),
                    path.display()
                ),
            );
        }
        None => log(LogLevel::Info, "No sample subset provided. Using all samples."),
    }
    let annotation = match &args.snp_annotation {
        Some(path) => Some(read_variant_annotation(path)?),
        None => None,
    };

    let records = calculate_frequencies(&genotypes);

    set_stage(ProcessingStage::Writing);
    ensure_output_dir(&args.output_dir)?;
    let output = args.output_dir.join("allele_frequencies.tsv");
    write_frequency_table(&records, annotation.as_ref(), &output)?;
    log(LogLevel::Info, &format!("Output saved to {}", output.display()));
    Ok(())
}

pub fn run_assoc(args: &AssocArgs) -> Result<(), GwasError> {
    let config = AssocConfig::new(
        parse_covariate_list(&args.covariates),
        args.maf_threshold,
        LogisticConfig::default(),
    )?;
    let missing = MissingCode::new(&args.missing_code)?;

    set_stage(ProcessingStage::Loading);
    let genotypes = read_genotype_matrix(&args.genotypes, &missing)?;
    let samples = read_sample_table(&args.phenotypes, &config.covariates)?;
    let annotation = read_variant_annotation(&args.snp_annotation)?;

    let scan = run_association_scan(&genotypes, &samples, &annotation, &config)?;

    set_stage(ProcessingStage::Writing);
    ensure_output_dir(&args.output_dir)?;
    let output = args.output_dir.join("logistic_regression_results.tsv");
    write_association_results(&scan.results, &output)?;
    log(LogLevel::Info, &format!("Output saved to {}", output.display()));
    Ok(())
}

pub fn run_ld(args: &LdArgs) -> Result<(), GwasError> {
    let config = LdConfig::new(&args.focal_snp, args.window_kb, args.min_maf)?;
    let missing = MissingCode::new(&args.missing_code)?;

    set_stage(ProcessingStage::Loading);
    let mut genotypes = read_genotype_matrix(&args.genotypes, &missing)?;
    if let Some(path) = &args.sample_subset {
        let subset = read_sample_subset(path)?;
        genotypes = genotypes.restrict_samples(&subset)?;
    }
    let annotation = read_variant_annotation(&args.snp_annotation)?;

    let ld = compute_ld(&genotypes, &annotation, &config)?;

    set_stage(ProcessingStage::Writing);
    ensure_parent_dir(&args.output)?;
    write_ld_matrix(&ld.matrix, &args.output)?;
    log(
        LogLevel::Info,
        &format!("Saved LD matrix to {}", args.output.display()),
    );
    Ok(())
}

pub fn run_top_hits(args: &TopHitsArgs) -> Result<(), GwasError> {
    let config = TopHitsConfig::new(args.p_threshold, args.top_n)?;

    set_stage(ProcessingStage::Loading);
    let table = read_association_table(&args.input)?;

    set_stage(ProcessingStage::TopHits);
    let hits = select_top_hits(&table, &config);
    let n_significant = hits.rows.iter().filter(|h| h.significant).count();
    log(
        LogLevel::Info,
        &format!(
            "Selected {} top hits ({} below p < {})",
            hits.rows.len(),
            n_significant,
            config.p_threshold
        ),
    );

    set_stage(ProcessingStage::Writing);
    ensure_parent_dir(&args.output)?;
    write_top_hits(&hits, &args.output)?;
    Ok(())
}

/// Prints a fatal error the way the command line reports it.
pub fn report_fatal(err: &GwasError) {
    eprintln!("{}", format!("\nERROR: {}", err).red());
}
