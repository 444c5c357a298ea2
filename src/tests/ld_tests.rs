#[cfg(test)]
mod ld_tests {
    use crate::genotype::{Dosage, GenotypeMatrix, VariantAnnotation, VariantRecord};
    use crate::ld::*;
    use crate::process::GwasError;

    fn record(id: &str, chrom: &str, position: u64) -> VariantRecord {
        VariantRecord {
            variant_id: id.to_string(),
            chromosome: chrom.to_string(),
            position,
            reference_maf: 0.2,
        }
    }

    fn window_annotation() -> VariantAnnotation {
        VariantAnnotation::new(vec![
            record("left_out", "1", 949_999),
            record("left_edge", "1", 950_000),
            record("focal", "1", 1_000_000),
            record("right_edge", "1", 1_050_000),
            record("right_out", "1", 1_050_001),
            record("other_chrom", "2", 1_000_000),
        ])
        .unwrap()
    }

    /// Builds a genotype matrix from per-variant columns.
    fn matrix(columns: &[(&str, Vec<Dosage>)]) -> GenotypeMatrix {
        let n = columns[0].1.len();
        let rows = (0..n)
            .map(|i| columns.iter().map(|(_, c)| c[i]).collect())
            .collect();
        GenotypeMatrix::from_rows(
            (0..n).map(|i| format!("s{}", i)).collect(),
            columns.iter().map(|(id, _)| id.to_string()).collect(),
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let annotation = window_annotation();
        let config = LdConfig::new("focal", 100.0, 0.01).unwrap();
        assert_eq!(config.half_window_bp(), 50_000);

        let window = select_window(&annotation, &config).unwrap();
        let ids: Vec<&str> = window.iter().map(|r| r.variant_id.as_str()).collect();
        assert_eq!(ids, vec!["left_edge", "focal", "right_edge"]);
    }

    #[test]
    fn test_window_saturates_at_chromosome_start() {
        let annotation = VariantAnnotation::new(vec![
            record("b", "1", 30),
            record("a", "1", 0),
            record("c", "1", 30),
            record("far", "1", 60_000),
        ])
        .unwrap();
        let config = LdConfig::new("b", 100.0, 0.01).unwrap();
        let window = select_window(&annotation, &config).unwrap();
        let ids: Vec<&str> = window.iter().map(|r| r.variant_id.as_str()).collect();
        // Position ties are ordered by identifier
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_focal_is_fatal() {
        let config = LdConfig::new("missing", 100.0, 0.01).unwrap();
        let err = select_window(&window_annotation(), &config).unwrap_err();
        assert!(matches!(err, GwasError::FocalVariantNotFound(ref id) if id == "missing"));
    }

    #[test]
    fn test_config_validation() {
        assert!(LdConfig::new("rs1", 0.0, 0.01).is_err());
        assert!(LdConfig::new("rs1", f64::INFINITY, 0.01).is_err());
        assert!(LdConfig::new("rs1", 100.0, 1.5).is_err());
        assert!(LdConfig::new("  ", 100.0, 0.01).is_err());
        // 1.5 kb -> 1500 bp -> 750 bp either side
        assert_eq!(LdConfig::new("rs1", 1.5, 0.0).unwrap().half_window_bp(), 750);
    }

    #[test]
    fn test_pairwise_r2() {
        let a = vec![Some(0.0), Some(1.0), Some(2.0), Some(1.0)];
        let b = vec![Some(2.0), Some(1.0), Some(0.0), Some(1.0)];
        assert!((pairwise_r2(&a, &b).unwrap() - 1.0).abs() < 1e-12);

        // Only two jointly observed samples remain, both equal in b
        let c = vec![Some(0.0), None, Some(2.0), None];
        let d = vec![Some(1.0), Some(0.0), Some(1.0), Some(2.0)];
        assert_eq!(pairwise_r2(&c, &d), None);

        let e = vec![Some(0.0), None, None, None];
        assert_eq!(pairwise_r2(&e, &a), None);

        // sxy = 0.75, sxx = 2.75, syy = 0.75
        let x = vec![Some(0.0), Some(1.0), Some(2.0), Some(0.0)];
        let y = vec![Some(0.0), Some(1.0), Some(1.0), Some(1.0)];
        let expected = 3.0 / 11.0;
        assert!((pairwise_r2(&x, &y).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ld_matrix_symmetry_and_monomorphic() {
        let columns = vec![
            vec![Some(0.0), Some(1.0), Some(2.0), Some(0.0), Some(1.0)],
            vec![Some(1.0), Some(1.0), Some(1.0), None, Some(1.0)],
            vec![Some(0.0), Some(2.0), Some(2.0), Some(1.0), None],
        ];
        let ids = vec!["a".to_string(), "mono".to_string(), "c".to_string()];
        let ld = ld_matrix(ids, &columns);

        assert_eq!(ld.len(), 3);
        assert_eq!(ld.get(0, 0), Some(1.0));
        assert_eq!(ld.get(2, 2), Some(1.0));
        for k in 0..3 {
            assert_eq!(ld.get(1, k), None);
            assert_eq!(ld.get(k, 1), None);
        }
        assert_eq!(ld.get(0, 2), ld.get(2, 0));
        let r2 = ld.get_by_id("a", "c").unwrap();
        assert!((0.0..=1.0).contains(&r2));
    }

    #[test]
    fn test_compute_ld_filters_and_orders() {
        let genotypes = matrix(&[
            ("right_edge", vec![Some(2), Some(1), Some(0), Some(1)]),
            ("focal", vec![Some(0), Some(1), Some(2), Some(1)]),
            ("left_edge", vec![None, None, None, None]),
            ("right_out", vec![Some(0), Some(1), Some(2), Some(2)]),
            ("other_chrom", vec![Some(0), Some(1), Some(2), Some(2)]),
        ]);
        let config = LdConfig::new("focal", 100.0, 0.01).unwrap();
        let result = compute_ld(&genotypes, &window_annotation(), &config).unwrap();

        assert_eq!(
            result.matrix.variant_ids(),
            &["focal".to_string(), "right_edge".to_string()]
        );
        assert_eq!(result.report.in_window, 3);
        assert_eq!(result.report.genotyped, 3);
        assert_eq!(result.report.all_missing, 1);
        assert_eq!(result.report.retained, 2);
        assert!((result.matrix.get_by_id("focal", "right_edge").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_compute_ld_min_maf_leaves_too_few() {
        let genotypes = matrix(&[
            ("focal", vec![Some(0), Some(1), Some(2), Some(1)]),
            ("right_edge", vec![Some(0), Some(0), Some(0), Some(0)]),
        ]);
        let config = LdConfig::new("focal", 100.0, 0.01).unwrap();
        let err = compute_ld(&genotypes, &window_annotation(), &config).unwrap_err();
        assert!(matches!(err, GwasError::TooFewVariants { found: 1, .. }));
    }

    #[test]
    fn test_compute_ld_needs_two_genotyped_variants() {
        let genotypes = matrix(&[
            ("focal", vec![Some(0), Some(1), Some(2)]),
            ("other_chrom", vec![Some(0), Some(1), Some(2)]),
        ]);
        let config = LdConfig::new("focal", 100.0, 0.01).unwrap();
        let err = compute_ld(&genotypes, &window_annotation(), &config).unwrap_err();
        assert!(matches!(err, GwasError::TooFewVariants { found: 1, .. }));
    }
}
