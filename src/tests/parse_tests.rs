#[cfg(test)]
mod parse_tests {
    use crate::genotype::{parse_optional_numeric, MissingCode};
    use crate::parse::*;
    use crate::process::{parse_covariate_list, GwasError};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_code_matching() {
        let code = MissingCode::new("-9").unwrap();
        assert!(code.matches("-9"));
        assert!(code.matches("-9.0"));
        assert!(!code.matches("9"));
        assert_eq!(code.parse_dosage("-9"), Ok(None));
        assert_eq!(code.parse_dosage(""), Ok(None));
        assert_eq!(code.parse_dosage("2"), Ok(Some(2)));
        assert_eq!(code.parse_dosage("1.0"), Ok(Some(1)));
        assert!(code.parse_dosage("3").is_err());
        assert!(code.parse_dosage("0.5").is_err());
        assert!(code.parse_dosage("NA").is_err());

        let text = MissingCode::new("NA").unwrap();
        assert_eq!(text.parse_dosage("NA"), Ok(None));
        assert!(MissingCode::new("1").is_err());
        assert!(MissingCode::new(" ").is_err());
    }

    #[test]
    fn test_optional_numeric_cells() {
        assert_eq!(parse_optional_numeric("NA"), Ok(None));
        assert_eq!(parse_optional_numeric(" "), Ok(None));
        assert_eq!(parse_optional_numeric("."), Ok(None));
        assert_eq!(parse_optional_numeric("3.5"), Ok(Some(3.5)));
        assert!(parse_optional_numeric("tall").is_err());
    }

    #[test]
    fn test_covariate_list() {
        assert!(parse_covariate_list("NA").is_empty());
        assert!(parse_covariate_list("").is_empty());
        assert_eq!(parse_covariate_list("age, sex,"), vec!["age", "sex"]);
    }

    #[test]
    fn test_read_genotype_matrix() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "geno.tsv",
            "sample\trs1\trs2\trs3\ns1\t0\t-9\t2\ns2\t1\t1\t\ns3\t2.0\t0\t-9\n",
        );
        let code = MissingCode::new("-9").unwrap();
        let matrix = read_genotype_matrix(&path, &code).unwrap();

        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.variant_ids(), &["rs1", "rs2", "rs3"]);
        assert_eq!(matrix.dosage(0, 1), None);
        assert_eq!(matrix.dosage(1, 2), None);
        assert_eq!(matrix.dosage(2, 0), Some(2));
        assert_eq!(matrix.sample_position("s2"), Some(1));
    }

    #[test]
    fn test_read_gzipped_genotypes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geno.tsv.gz");
        let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"id\trsA\trsB\nx\t0\t1\ny\t2\t-9\n")
            .unwrap();
        encoder.finish().unwrap();

        let matrix = read_genotype_matrix(&path, &MissingCode::new("-9").unwrap()).unwrap();
        assert_eq!(matrix.sample_ids(), &["x", "y"]);
        assert_eq!(matrix.dosage(1, 0), Some(2));
        assert_eq!(matrix.dosage(1, 1), None);
    }

    #[test]
    fn test_invalid_genotype_reports_location() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "geno.tsv", "id\trs1\ns1\t0\ns2\t7\n");
        let err = read_genotype_matrix(&path, &MissingCode::new("-9").unwrap()).unwrap_err();
        match err {
            GwasError::Parse { line, column, .. } => {
                assert_eq!(line, 3);
                assert_eq!(column, "rs1");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_ragged_genotype_row_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "geno.tsv", "id\trs1\trs2\ns1\t0\n");
        let err = read_genotype_matrix(&path, &MissingCode::new("-9").unwrap()).unwrap_err();
        assert!(matches!(err, GwasError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_sample_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "geno.tsv", "id\trs1\ns1\t0\ns1\t1\n");
        let err = read_genotype_matrix(&path, &MissingCode::new("-9").unwrap()).unwrap_err();
        assert!(matches!(err, GwasError::DuplicateId { kind: "sample", .. }));
    }

    #[test]
    fn test_read_annotation_trims_headers() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "annot.tsv",
            " snp_id \tchrom\tpos\t maf\tgene\nrs1\t1\t100\t0.25\tABC\nrs2\tX\t200\t0\tDEF\n",
        );
        let annotation = read_variant_annotation(&path).unwrap();
        assert_eq!(annotation.len(), 2);
        let rs2 = annotation.get("rs2").unwrap();
        assert_eq!(rs2.chromosome, "X");
        assert_eq!(rs2.position, 200);
        assert_eq!(rs2.reference_maf, 0.0);
    }

    #[test]
    fn test_annotation_errors() {
        let dir = tempdir().unwrap();
        let no_maf = write_file(dir.path(), "a.tsv", "snp_id\tchrom\tpos\nrs1\t1\t100\n");
        assert!(matches!(
            read_variant_annotation(&no_maf),
            Err(GwasError::MissingColumns { ref missing, .. }) if missing == "maf"
        ));

        let bad_maf = write_file(dir.path(), "b.tsv", "snp_id\tchrom\tpos\tmaf\nrs1\t1\t100\thigh\n");
        assert!(matches!(
            read_variant_annotation(&bad_maf),
            Err(GwasError::Parse { ref column, .. }) if column == "maf"
        ));

        let dup = write_file(
            dir.path(),
            "c.tsv",
            "snp_id\tchrom\tpos\tmaf\nrs1\t1\t100\t0.1\nrs1\t1\t101\t0.2\n",
        );
        assert!(matches!(
            read_variant_annotation(&dup),
            Err(GwasError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_read_sample_table() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "pheno.tsv",
            "sample_id\tphenotype\tage\tunused\ns1\t1\t34\tx\ns2\tNA\t51\ty\ns3\t0\t\tz\n",
        );
        let table = read_sample_table(&path, &["age".to_string()]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.phenotype(0), Some(1.0));
        assert_eq!(table.phenotype(1), None);
        let age = table.covariate("age").unwrap();
        assert_eq!(age.values, vec![Some(34.0), Some(51.0), None]);
        assert!(table.covariate("unused").is_none());
    }

    #[test]
    fn test_sample_table_errors() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "p.tsv", "sample_id\tphenotype\ns1\t2\n");
        assert!(matches!(
            read_sample_table(&path, &[]),
            Err(GwasError::Config(_))
        ));

        let path = write_file(dir.path(), "q.tsv", "sample_id\tphenotype\ns1\t1\n");
        assert!(matches!(
            read_sample_table(&path, &["bmi".to_string()]),
            Err(GwasError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_sample_subset_and_restriction() {
        let dir = tempdir().unwrap();
        let geno = write_file(dir.path(), "g.tsv", "id\trs1\na\t0\nb\t1\nc\t2\n");
        let subset = write_file(dir.path(), "s.tsv", "sample_id\nc\na\n");
        let matrix = read_genotype_matrix(&geno, &MissingCode::new("-9").unwrap()).unwrap();
        let ids = read_sample_subset(&subset).unwrap();
        assert_eq!(ids, vec!["c", "a"]);

        let restricted = matrix.restrict_samples(&ids).unwrap();
        assert_eq!(restricted.sample_ids(), &["c", "a"]);
        assert_eq!(restricted.dosage(0, 0), Some(2));

        let err = matrix
            .restrict_samples(&["a".to_string(), "zz".to_string()])
            .unwrap_err();
        assert!(matches!(err, GwasError::UnknownSamples(ref u) if u == &["zz".to_string()]));
    }
}
