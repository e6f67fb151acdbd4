//! Synthetic variant screen.
//!
//! Builds random morphology profiles for two wild types, three mutants and a
//! control population, then runs the classic battery and prints each call.
//!
//! Run: `cargo run --example synthetic_screen`

use morphvip_core::{
    CorrelationMatrix, Dataset, SampleRecord, VipConfig, VipEvaluator, apply_significance,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const FEATURES: usize = 64;

fn random_profile(rng: &mut StdRng, base: Option<&[f64]>, scale: f64) -> Vec<f64> {
    (0..FEATURES)
        .map(|k| base.map_or(0.0, |b| b[k]) + scale * (2.0 * rng.random::<f64>() - 1.0))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(2024);
    let kras = random_profile(&mut rng, None, 1.0);
    let tp53 = random_profile(&mut rng, None, 1.0);
    let other = random_profile(&mut rng, None, 1.0);

    // (label, signal, sample type)
    let groups: Vec<(&str, Option<Vec<f64>>, &str)> = vec![
        ("KRAS_WT", Some(kras.clone()), "treated"),
        ("KRAS_G12V", Some(kras), "treated"),
        ("TP53_WT", Some(tp53), "treated"),
        ("TP53_R248Q", Some(other), "treated"),
        ("TP53_E285K", None, "treated"),
        ("EMPTY", None, "control"),
    ];

    let mut metadata = Vec::new();
    let mut ids = Vec::new();
    let mut profiles = Vec::new();
    for (label, signal, sample_type) in &groups {
        let replicates = if *sample_type == "control" { 24 } else { 8 };
        for i in 0..replicates {
            let id = format!("{label}-{i}");
            profiles.push(random_profile(&mut rng, signal.as_deref(), 0.3));
            metadata.push(SampleRecord {
                id: id.clone(),
                perturbation: label.to_string(),
                sample_type: sample_type.to_string(),
                plate: format!("plate{}", i % 4),
            });
            ids.push(id);
        }
    }

    let matrix = CorrelationMatrix::from_profiles(ids, &profiles)?;
    let dataset = Dataset::new(metadata, matrix)?;

    let config = VipConfig::default();
    let policy = config.significance;
    let mut evaluator = VipEvaluator::new(&dataset, config);
    let alleles: Vec<String> = ["KRAS_G12V", "TP53_R248Q", "TP53_E285K"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let batch = evaluator.test_allele_set(&alleles)?;

    let calls = apply_significance(batch.records, evaluator.battery(), policy);
    for call in &calls {
        println!(
            "{:<12} vs {:<8} {}",
            call.record.mutant, call.record.wild_type, call.prediction
        );
        for field in &call.significance {
            println!(
                "    {:<18} p={:<10} q={:<10} significant={}",
                field.field,
                field.raw.map_or("-".to_string(), |p| format!("{p:.4}")),
                field.adjusted.map_or("-".to_string(), |p| format!("{p:.4}")),
                field.significant
            );
        }
    }
    Ok(())
}
