pub mod evaluate;
pub mod null;
pub mod strength;

use morphvip_core::{BatteryKind, Dataset, SignificancePolicy, VipConfig, io};
use serde::Serialize;
use std::path::Path;

/// Metadata plus exactly one of a correlation matrix or raw profiles.
#[derive(Clone, Copy)]
pub struct InputPaths<'a> {
    pub metadata: &'a str,
    pub matrix: Option<&'a str>,
    pub profiles: Option<&'a str>,
}

/// Command-line values that replace fields of the loaded configuration.
#[derive(Default)]
pub struct ConfigOverrides<'a> {
    pub battery: Option<&'a str>,
    pub significance: Option<&'a str>,
    pub q: Option<f64>,
    pub threshold: Option<f64>,
    pub seed: Option<u64>,
    pub treatment_samples: Option<usize>,
    pub control_samples: Option<usize>,
    pub false_positives: bool,
}

/// Load and align metadata and correlations, exiting on any error.
pub fn load_dataset(inputs: InputPaths<'_>) -> Dataset {
    let metadata = io::load_metadata(Path::new(inputs.metadata)).unwrap_or_else(|e| {
        eprintln!("Failed to load metadata {}: {e}", inputs.metadata);
        std::process::exit(1);
    });

    let matrix = match (inputs.matrix, inputs.profiles) {
        (Some(path), _) => io::load_correlation_matrix(Path::new(path)),
        (None, Some(path)) => io::load_profiles(Path::new(path)),
        (None, None) => {
            eprintln!("Either --matrix or --profiles is required.");
            std::process::exit(1);
        }
    }
    .unwrap_or_else(|e| {
        eprintln!("Failed to load correlations: {e}");
        std::process::exit(1);
    });

    let asymmetry = matrix.max_asymmetry();
    if asymmetry > 1e-6 {
        log::warn!("correlation matrix is not symmetric (max |r_ij - r_ji| = {asymmetry:.3e})");
    }

    Dataset::new(metadata, matrix).unwrap_or_else(|e| {
        eprintln!("Invalid inputs: {e}");
        std::process::exit(1);
    })
}

/// Configuration from `path` (or defaults) with command-line overrides applied.
pub fn load_config(path: Option<&str>, overrides: &ConfigOverrides<'_>) -> VipConfig {
    let mut config = match path {
        Some(p) => morphvip_core::load_config_from_path(Path::new(p)).unwrap_or_else(|e| {
            eprintln!("Failed to load config {p}: {e}");
            std::process::exit(1);
        }),
        None => VipConfig::default(),
    };
    if let Err(e) = apply_overrides(&mut config, overrides) {
        eprintln!("{e}");
        std::process::exit(1);
    }
    config
}

pub fn apply_overrides(
    config: &mut VipConfig,
    overrides: &ConfigOverrides<'_>,
) -> Result<(), String> {
    if let Some(battery) = overrides.battery {
        config.battery = battery.parse::<BatteryKind>()?;
    }
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(n) = overrides.treatment_samples {
        config.treatment_samples = n;
    }
    if let Some(n) = overrides.control_samples {
        config.control_samples = n;
    }
    if overrides.false_positives {
        config.false_positives = true;
    }
    config.significance = parse_significance(
        overrides.significance,
        overrides.q,
        overrides.threshold,
        config.significance,
    )?;
    Ok(())
}

/// Resolve the significance policy. A bare `--q` or `--threshold` adjusts the
/// level of the matching policy; naming a policy switches to it.
pub fn parse_significance(
    mode: Option<&str>,
    q: Option<f64>,
    threshold: Option<f64>,
    current: SignificancePolicy,
) -> Result<SignificancePolicy, String> {
    let level = |v: f64, name: &str| {
        if v > 0.0 && v < 1.0 {
            Ok(v)
        } else {
            Err(format!("--{name} must be in (0, 1), got {v}"))
        }
    };
    match (mode, current) {
        (Some("fdr"), _) => Ok(SignificancePolicy::Fdr {
            q: level(q.unwrap_or(0.05), "q")?,
        }),
        (Some("raw"), _) => Ok(SignificancePolicy::Raw {
            threshold: level(threshold.unwrap_or(0.05), "threshold")?,
        }),
        (Some(other), _) => Err(format!("unknown significance policy '{other}'")),
        (None, SignificancePolicy::Fdr { q: current_q }) => Ok(SignificancePolicy::Fdr {
            q: level(q.unwrap_or(current_q), "q")?,
        }),
        (None, SignificancePolicy::Raw { threshold: current_t }) => Ok(SignificancePolicy::Raw {
            threshold: level(threshold.unwrap_or(current_t), "threshold")?,
        }),
    }
}

/// Split a comma-separated allele list, dropping empty entries.
pub fn parse_alleles(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every perturbation that is neither a control nor a wild type.
pub fn default_alleles(dataset: &Dataset, config: &VipConfig) -> Vec<String> {
    let controls: std::collections::HashSet<&str> = dataset
        .samples()
        .iter()
        .filter(|s| s.sample_type == config.controls_value)
        .map(|s| s.perturbation.as_str())
        .collect();
    dataset
        .perturbations()
        .into_iter()
        .filter(|p| !controls.contains(p) && !p.contains(config.wild_type.suffix.as_str()))
        .map(str::to_string)
        .collect()
}

pub fn write_json_or_exit<T: Serialize + ?Sized>(path: &str, value: &T, what: &str) {
    match io::write_json(Path::new(path), value) {
        Ok(()) => println!("{what} written to {path}"),
        Err(e) => {
            eprintln!("Failed to write {what} to {path}: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphvip_core::{CorrelationMatrix, SampleRecord};

    // -----------------------------------------------------------------------
    // parse_significance tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_named_policies() {
        let current = SignificancePolicy::default();
        assert_eq!(
            parse_significance(Some("raw"), None, Some(0.01), current),
            Ok(SignificancePolicy::Raw { threshold: 0.01 })
        );
        assert_eq!(
            parse_significance(Some("fdr"), Some(0.1), None, current),
            Ok(SignificancePolicy::Fdr { q: 0.1 })
        );
        assert!(parse_significance(Some("bonferroni"), None, None, current).is_err());
    }

    #[test]
    fn test_bare_level_adjusts_current_policy() {
        let raw = SignificancePolicy::Raw { threshold: 0.05 };
        assert_eq!(
            parse_significance(None, None, Some(0.001), raw),
            Ok(SignificancePolicy::Raw { threshold: 0.001 })
        );
        // --q does not apply to a raw policy
        assert_eq!(parse_significance(None, Some(0.2), None, raw), Ok(raw));
    }

    #[test]
    fn test_level_out_of_range() {
        let current = SignificancePolicy::default();
        assert!(parse_significance(Some("fdr"), Some(1.5), None, current).is_err());
        assert!(parse_significance(None, Some(0.0), None, current).is_err());
    }

    // -----------------------------------------------------------------------
    // Overrides and allele lists
    // -----------------------------------------------------------------------

    #[test]
    fn test_overrides_replace_config_fields() {
        let mut config = VipConfig::default();
        let overrides = ConfigOverrides {
            battery: Some("cnn"),
            seed: Some(42),
            treatment_samples: Some(6),
            false_positives: true,
            ..ConfigOverrides::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.battery, BatteryKind::Cnn);
        assert_eq!(config.seed, 42);
        assert_eq!(config.treatment_samples, 6);
        assert!(config.false_positives);
        assert_eq!(config.control_samples, 20);
    }

    #[test]
    fn test_parse_alleles() {
        assert_eq!(
            parse_alleles("KRAS_G12D, TP53_R175H,,"),
            vec!["KRAS_G12D", "TP53_R175H"]
        );
        assert!(parse_alleles("").is_empty());
    }

    #[test]
    fn test_default_alleles_skip_controls_and_wild_types() {
        let labels = [
            ("a", "KRAS_WT", "treated"),
            ("b", "KRAS_G12D", "treated"),
            ("c", "EMPTY", "control"),
            ("d", "TP53_WT.c", "treated"),
            ("e", "TP53_R175H", "treated"),
        ];
        let meta = labels
            .iter()
            .map(|(id, p, t)| SampleRecord {
                id: id.to_string(),
                perturbation: p.to_string(),
                sample_type: t.to_string(),
                plate: "P1".into(),
            })
            .collect();
        let n = labels.len();
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        let ids = labels.iter().map(|(id, _, _)| id.to_string()).collect();
        let ds = Dataset::new(meta, CorrelationMatrix::new(ids, rows).unwrap()).unwrap();
        assert_eq!(
            default_alleles(&ds, &VipConfig::default()),
            vec!["KRAS_G12D", "TP53_R175H"]
        );
    }
}
