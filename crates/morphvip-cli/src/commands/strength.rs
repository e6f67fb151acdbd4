use morphvip_core::{VipConfig, fraction_strong, null_for_dataset};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::InputPaths;

pub struct StrengthCommandConfig<'a> {
    pub inputs: InputPaths<'a>,
    pub sample_size: usize,
    pub repeats: usize,
    pub seed: u64,
    pub controls_value: &'a str,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: StrengthCommandConfig<'_>) {
    let dataset = super::load_dataset(cfg.inputs);
    let config = VipConfig {
        seed: cfg.seed,
        controls_value: cfg.controls_value.to_string(),
        null_group_size: cfg.sample_size,
        null_repeats: cfg.repeats,
        ..VipConfig::default()
    };

    let null = null_for_dataset(&dataset, &config).unwrap_or_else(|e| {
        eprintln!("Cannot build null distribution: {e}");
        std::process::exit(1);
    });

    let treated = dataset.treated_indices(&config.controls_value);
    let treatments: Vec<String> = dataset
        .perturbations()
        .into_iter()
        .filter(|p| treated.iter().any(|&i| dataset.samples()[i].perturbation == *p))
        .map(str::to_string)
        .collect();

    let mut rng = StdRng::seed_from_u64(config.strength_seed());
    let report = fraction_strong(
        &dataset,
        &treatments,
        &null,
        &config.controls_value,
        cfg.sample_size,
        &mut rng,
    )
    .unwrap_or_else(|e| {
        eprintln!("Cannot assess replicate strength: {e}");
        std::process::exit(1);
    });

    println!(
        "Replicate strength ({} replicates per treatment)",
        report.sample_size
    );
    println!("  Treatments tested:  {}", report.treatments_tested);
    println!("  Null p95 threshold: {:.4}", report.threshold);
    println!(
        "  Strong:             {:.1}%",
        report.fraction_strong * 100.0
    );

    if let Some(path) = cfg.output_path {
        super::write_json_or_exit(path, &report, "Strength report");
    }
}
