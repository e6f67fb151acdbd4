//! Integration tests for morphvip-core.
//!
//! These tests run the full pipeline on synthetic morphology profiles:
//! profiles → correlation matrix → dataset → evaluator → significance → labels.

use morphvip_core::{
    BatteryKind, CorrelationMatrix, Dataset, Impact, SampleRecord, SignificancePolicy, VipConfig,
    VipError, VipEvaluator, apply_significance, io, label_counts, null_for_dataset,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FEATURES: usize = 50;

fn noise(rng: &mut StdRng, scale: f64) -> Vec<f64> {
    (0..FEATURES)
        .map(|_| scale * (2.0 * rng.random::<f64>() - 1.0))
        .collect()
}

/// Replicates share their label's signal plus small per-well noise; labels
/// without a signal are pure noise.
#[derive(Default)]
struct Synthetic {
    metadata: Vec<SampleRecord>,
    ids: Vec<String>,
    profiles: Vec<Vec<f64>>,
}

impl Synthetic {
    fn add(
        &mut self,
        rng: &mut StdRng,
        label: &str,
        sample_type: &str,
        signal: Option<&[f64]>,
        replicates: usize,
    ) {
        for i in 0..replicates {
            let id = format!("{label}-{i}");
            let profile = match signal {
                Some(s) => s
                    .iter()
                    .zip(noise(rng, 0.3))
                    .map(|(a, b)| a + b)
                    .collect(),
                None => noise(rng, 1.0),
            };
            self.metadata.push(SampleRecord {
                id: id.clone(),
                perturbation: label.to_string(),
                sample_type: sample_type.to_string(),
                plate: format!("P{}", i % 3),
            });
            self.ids.push(id);
            self.profiles.push(profile);
        }
    }

    fn dataset(self) -> Dataset {
        let matrix = CorrelationMatrix::from_profiles(self.ids, &self.profiles).unwrap();
        Dataset::new(self.metadata, matrix).unwrap()
    }
}

/// KRAS and TP53 wild types and mutants with distinct strong signals, an
/// orphan EGFR mutant, and 30 noise controls.
fn strong_signal_dataset(seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Synthetic::default();
    for label in ["KRAS_WT", "KRAS_G12D", "TP53_WT", "TP53_R175H"] {
        let signal = noise(&mut rng, 1.0);
        data.add(&mut rng, label, "treated", Some(&signal), 8);
    }
    data.add(&mut rng, "EGFR_L858R", "treated", None, 8);
    data.add(&mut rng, "EMPTY", "control", None, 30);
    data.dataset()
}

fn alleles() -> Vec<String> {
    ["KRAS_G12D", "TP53_R175H", "EGFR_L858R"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[test]
fn distinct_active_alleles_are_change_of_function() {
    let ds = strong_signal_dataset(11);
    let config = VipConfig {
        treatment_samples: 8,
        ..VipConfig::default()
    };
    let policy = config.significance;
    let mut evaluator = VipEvaluator::new(&ds, config);
    let batch = evaluator.test_allele_set(&alleles()).unwrap();

    assert_eq!(batch.records.len(), 2);
    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].0, "EGFR_L858R");
    assert!(matches!(batch.skipped[0].1, VipError::UnresolvedWildType { .. }));

    for record in &batch.records {
        assert_eq!(record.wt_samples, 8);
        assert_eq!(record.mut_samples, 8);
        // every replicate agrees in sign: exact signed-rank p = 2/256
        let p = record.p_value("wt_has_effect").unwrap();
        assert!((p - 2.0 / 256.0).abs() < 1e-12);
    }

    let calls = apply_significance(batch.records, evaluator.battery(), policy);
    assert!(calls.iter().all(|c| c.prediction == Impact::Cof));
    assert_eq!(label_counts(&calls)[&Impact::Cof], 2);

    let mut index = evaluator.into_index();
    assert_eq!(index.attach_results(&calls, "classic"), 2);
    assert_eq!(index.children[0].name, "KRAS_WT");
}

#[test]
fn cnn_battery_detects_impact() {
    let ds = strong_signal_dataset(12);
    let config = VipConfig {
        treatment_samples: 8,
        battery: BatteryKind::Cnn,
        ..VipConfig::default()
    };
    let null = null_for_dataset(&ds, &config).unwrap();
    assert!(!null.is_empty());

    let mut evaluator = VipEvaluator::new(&ds, config).with_null(null);
    let batch = evaluator.test_allele_set(&alleles()).unwrap();
    assert_eq!(batch.records.len(), 2);
    for record in &batch.records {
        assert_eq!(record.battery, BatteryKind::Cnn);
        assert!(record.directionality.is_some());
        assert!(record.p_value("impact_test").unwrap() < 0.01);
        assert!(record.p_value("power_test").is_some());
    }
}

#[test]
fn false_positive_mode_calls_noise_no_impact() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut data = Synthetic::default();
    let mut labels = Vec::new();
    for i in 0..20 {
        let label = format!("GENE{i}_MUT");
        data.add(&mut rng, &label, "treated", None, 8);
        labels.push(label);
    }
    data.add(&mut rng, "EMPTY", "control", None, 30);
    let ds = data.dataset();

    let config = VipConfig {
        false_positives: true,
        ..VipConfig::default()
    };
    let policy = config.significance;
    let mut evaluator = VipEvaluator::new(&ds, config);
    let batch = evaluator.test_allele_set(&labels).unwrap();
    assert_eq!(batch.records.len(), 20);
    assert!(batch.records.iter().all(|r| r.wild_type == r.mutant));

    let calls = apply_significance(batch.records, evaluator.battery(), policy);
    let called = calls.iter().filter(|c| c.prediction != Impact::Ni).count();
    assert!(
        called as f64 / calls.len() as f64 <= 0.1,
        "{called} of {} noise alleles called",
        calls.len()
    );
}

#[test]
fn same_seed_reproduces_calls() {
    let ds = strong_signal_dataset(13);
    let run = |seed: u64| {
        let config = VipConfig {
            seed,
            ..VipConfig::default()
        };
        let mut evaluator = VipEvaluator::new(&ds, config);
        let batch = evaluator.test_allele_set(&alleles()).unwrap();
        let calls = apply_significance(
            batch.records,
            evaluator.battery(),
            SignificancePolicy::Raw { threshold: 0.05 },
        );
        calls
            .into_iter()
            .map(|c| (c.record, c.prediction))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(8), run(8));
}

#[test]
fn files_round_trip_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let ds = strong_signal_dataset(14);

    let meta_path = dir.path().join("metadata.json");
    io::write_json(&meta_path, ds.samples()).unwrap();
    let metadata = io::load_metadata(&meta_path).unwrap();
    let ds = Dataset::new(metadata, ds.matrix().clone()).unwrap();

    let config = VipConfig::default();
    let policy = config.significance;
    let mut evaluator = VipEvaluator::new(&ds, config);
    let batch = evaluator.test_allele_set(&alleles()).unwrap();
    let calls = apply_significance(batch.records, evaluator.battery(), policy);

    let json_path = dir.path().join("results.json");
    let csv_path = dir.path().join("results.csv");
    io::write_json(&json_path, &calls).unwrap();
    io::write_results_csv(&csv_path, &calls).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), calls.len());

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("wild_type,wt_samples,mutant,mut_samples,wt_has_effect"));
    assert!(header.ends_with("prediction"));
    assert_eq!(lines.count(), calls.len());
}
