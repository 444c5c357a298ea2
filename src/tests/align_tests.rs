#[cfg(test)]
mod align_tests {
    use crate::align::*;
    use crate::genotype::{CovariateColumn, GenotypeMatrix, SampleTable};
    use crate::process::GwasError;

    fn genotypes() -> GenotypeMatrix {
        GenotypeMatrix::from_rows(
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "g_only".into()],
            vec!["rs1".into()],
            vec![
                vec![Some(0)],
                vec![None],
                vec![Some(2)],
                vec![Some(1)],
                vec![Some(1)],
            ],
        )
        .unwrap()
    }

    fn samples() -> SampleTable {
        // e has no genotypes; c lacks a phenotype; d lacks age
        SampleTable::new(
            vec!["d".into(), "c".into(), "b".into(), "a".into(), "e".into()],
            vec![Some(1.0), None, Some(0.0), Some(1.0), Some(0.0)],
            vec![CovariateColumn {
                name: "age".into(),
                values: vec![None, Some(40.0), Some(50.0), Some(60.0), Some(70.0)],
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_alignment_drops_by_reason() {
        let genotypes = genotypes();
        let samples = samples();
        let aligner = Aligner::new(&genotypes, &samples, &["age".to_string()]).unwrap();
        assert_eq!(aligner.n_joined(), 4);

        let (unit, drops) = aligner.unit_for(0);
        assert_eq!(unit.sample_ids, vec!["a".to_string()]);
        assert_eq!(unit.genotype, vec![0.0]);
        assert_eq!(unit.phenotype, vec![1.0]);
        assert_eq!(unit.covariates[[0, 0]], 60.0);
        assert_eq!(
            drops,
            DropCounts {
                not_genotyped: 0,
                not_in_sample_table: 0,
                missing_genotype: 1,
                missing_phenotype: 1,
                missing_covariate: 1,
            }
        );
        assert_eq!(drops.total(), 3);

        // Join losses are reported once by the aligner, not per variant
        let unjoined = aligner.unjoined();
        assert_eq!(unjoined.not_genotyped, 1);
        assert_eq!(unjoined.not_in_sample_table, 1);
        assert_eq!(unjoined.total(), 2);
    }

    #[test]
    fn test_covariate_rows_follow_retained_samples() {
        let genotypes = GenotypeMatrix::from_rows(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec!["rs1".into()],
            vec![vec![Some(0)], vec![Some(1)], vec![Some(2)], vec![Some(1)]],
        )
        .unwrap();
        // b lacks sex, so its row must not shift the rows after it
        let samples = SampleTable::new(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![Some(0.0), Some(1.0), Some(1.0), Some(0.0)],
            vec![
                CovariateColumn {
                    name: "age".into(),
                    values: vec![Some(30.0), Some(40.0), Some(50.0), Some(60.0)],
                },
                CovariateColumn {
                    name: "sex".into(),
                    values: vec![Some(0.0), None, Some(1.0), Some(0.0)],
                },
            ],
        )
        .unwrap();
        let aligner =
            Aligner::new(&genotypes, &samples, &["sex".to_string(), "age".to_string()]).unwrap();

        let (unit, drops) = aligner.unit_for(0);
        assert_eq!(drops.missing_covariate, 1);
        assert_eq!(unit.sample_ids, vec!["a", "c", "d"]);
        assert_eq!(unit.covariates.dim(), (3, 2));
        assert_eq!(unit.covariates.row(0).to_vec(), vec![0.0, 30.0]);
        assert_eq!(unit.covariates.row(1).to_vec(), vec![1.0, 50.0]);
        assert_eq!(unit.covariates.row(2).to_vec(), vec![0.0, 60.0]);
    }

    #[test]
    fn test_alignment_without_covariates_keeps_more_samples() {
        let genotypes = genotypes();
        let samples = samples();
        let aligner = Aligner::new(&genotypes, &samples, &[]).unwrap();

        let (unit, drops) = aligner.unit_for(0);
        // Sample-table order is kept: d before a
        assert_eq!(unit.sample_ids, vec!["d".to_string(), "a".to_string()]);
        assert_eq!(unit.genotype, vec![1.0, 0.0]);
        assert_eq!(unit.covariates.dim(), (2, 0));
        assert_eq!(drops.missing_covariate, 0);
        assert_eq!(drops.missing_genotype, 1);
    }

    #[test]
    fn test_unknown_covariate_is_rejected() {
        let genotypes = genotypes();
        let samples = samples();
        let err = Aligner::new(&genotypes, &samples, &["height".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, GwasError::Config(ref m) if m.contains("height")));
    }
}
