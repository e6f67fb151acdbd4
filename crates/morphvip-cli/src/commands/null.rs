use morphvip_core::{VipConfig, null_for_dataset};

use super::InputPaths;

pub struct NullCommandConfig<'a> {
    pub inputs: InputPaths<'a>,
    pub group_size: usize,
    pub repeats: usize,
    pub seed: u64,
    pub controls_value: &'a str,
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: NullCommandConfig<'_>) {
    let dataset = super::load_dataset(cfg.inputs);
    let config = VipConfig {
        seed: cfg.seed,
        controls_value: cfg.controls_value.to_string(),
        null_group_size: cfg.group_size,
        null_repeats: cfg.repeats,
        ..VipConfig::default()
    };

    let null = null_for_dataset(&dataset, &config).unwrap_or_else(|e| {
        eprintln!("Cannot build null distribution: {e}");
        std::process::exit(1);
    });

    println!(
        "Null distribution: {} group medians (groups of {}, {} repeats)",
        null.len(),
        cfg.group_size,
        cfg.repeats
    );
    for q in [0.05, 0.5, 0.95] {
        if let Some(v) = null.percentile(q) {
            println!("  p{:<3} {v:.4}", (q * 100.0) as u32);
        }
    }

    if let Some(path) = cfg.output_path {
        super::write_json_or_exit(path, &null, "Null distribution");
    }
}
