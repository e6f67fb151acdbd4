use morphvip_core::{
    BatteryKind, ClassifiedRecord, Impact, SignificancePolicy, VipEvaluator, apply_significance,
    io, label_counts, null_for_dataset,
};
use std::path::Path;

use super::{ConfigOverrides, InputPaths};

pub struct EvaluateCommandConfig<'a> {
    pub inputs: InputPaths<'a>,
    pub alleles: Option<&'a str>,
    pub alleles_file: Option<&'a str>,
    pub config_path: Option<&'a str>,
    pub overrides: ConfigOverrides<'a>,
    pub null_path: Option<&'a str>,
    pub output_path: Option<&'a str>,
    pub csv_path: Option<&'a str>,
    pub index_path: Option<&'a str>,
}

pub fn run(cfg: EvaluateCommandConfig<'_>) {
    let config = super::load_config(cfg.config_path, &cfg.overrides);
    let dataset = super::load_dataset(cfg.inputs);

    let alleles = match (cfg.alleles, cfg.alleles_file) {
        (Some(list), _) => super::parse_alleles(list),
        (None, Some(path)) => io::load_alleles(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("Failed to read allele list {path}: {e}");
            std::process::exit(1);
        }),
        (None, None) => super::default_alleles(&dataset, &config),
    };
    if alleles.is_empty() {
        eprintln!("No alleles to evaluate.");
        std::process::exit(1);
    }

    let null = if config.battery == BatteryKind::Cnn {
        let null = match cfg.null_path {
            Some(path) => io::load_null(Path::new(path)),
            None => null_for_dataset(&dataset, &config)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e)),
        };
        Some(null.unwrap_or_else(|e| {
            eprintln!("Failed to obtain null distribution: {e}");
            std::process::exit(1);
        }))
    } else {
        None
    };

    println!(
        "Evaluating {} allele(s) on {} samples (battery {}, seed {}{})",
        alleles.len(),
        dataset.len(),
        config.battery,
        config.seed,
        if config.false_positives {
            ", false-positive mode"
        } else {
            ""
        }
    );

    let policy = config.significance;
    let mut evaluator = VipEvaluator::new(&dataset, config);
    if let Some(null) = null {
        evaluator = evaluator.with_null(null);
    }
    let batch = evaluator.test_allele_set(&alleles).unwrap_or_else(|e| {
        eprintln!("Evaluation aborted: {e}");
        std::process::exit(1);
    });

    if !batch.skipped.is_empty() {
        println!("\nSkipped {} allele(s):", batch.skipped.len());
        for (allele, reason) in &batch.skipped {
            println!("  {allele:<24} {reason}");
        }
    }

    let calls = apply_significance(batch.records, evaluator.battery(), policy);
    print_calls(&calls, policy);

    let mut index = evaluator.into_index();
    index.attach_results(&calls, &policy_field(policy));

    if let Some(path) = cfg.output_path {
        super::write_json_or_exit(path, &calls, "Results");
    }
    if let Some(path) = cfg.csv_path {
        match io::write_results_csv(Path::new(path), &calls) {
            Ok(()) => println!("CSV written to {path}"),
            Err(e) => {
                eprintln!("Failed to write CSV to {path}: {e}");
                std::process::exit(1);
            }
        }
    }
    if let Some(path) = cfg.index_path {
        super::write_json_or_exit(path, &index, "Index");
    }
}

/// Index payload key, e.g. `fdr_0.05` or `raw_0.01`.
fn policy_field(policy: SignificancePolicy) -> String {
    match policy {
        SignificancePolicy::Fdr { q } => format!("fdr_{q}"),
        SignificancePolicy::Raw { threshold } => format!("raw_{threshold}"),
    }
}

fn print_calls(calls: &[ClassifiedRecord], policy: SignificancePolicy) {
    if calls.is_empty() {
        println!("\nNo pairs evaluated.");
        return;
    }
    let fields: Vec<&str> = calls[0]
        .significance
        .iter()
        .map(|s| s.field.as_str())
        .collect();

    println!();
    print!("{:<24} {:<16}", "Mutant", "Wild type");
    for field in &fields {
        print!(" {field:>18}");
    }
    println!(" {:>6}", "Call");
    println!("{}", "─".repeat(42 + fields.len() * 19 + 7));

    for call in calls {
        print!("{:<24} {:<16}", call.record.mutant, call.record.wild_type);
        for field in &fields {
            let cell = match call.field(field) {
                Some(s) => {
                    let p = s.adjusted.or(s.raw);
                    let mark = if s.significant { "*" } else { " " };
                    match p {
                        Some(p) => format!("{p:.4}{mark}"),
                        None => "-".to_string(),
                    }
                }
                None => "-".to_string(),
            };
            print!(" {cell:>18}");
        }
        println!(" {:>6}", call.prediction);
    }

    let counts = label_counts(calls);
    let summary: Vec<String> = Impact::ALL
        .iter()
        .map(|label| format!("{label}={}", counts.get(label).copied().unwrap_or(0)))
        .collect();
    let legend = match policy {
        SignificancePolicy::Fdr { q } => format!("adjusted p, * = FDR ≤ {q}"),
        SignificancePolicy::Raw { threshold } => format!("raw p, * = p < {threshold}"),
    };
    println!("\n{} ({legend})", summary.join("  "));
}
