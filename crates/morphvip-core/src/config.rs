//! Run configuration.
//!
//! Every source of randomness in a run derives from [`VipConfig::seed`], so the
//! same configuration and inputs always reproduce the same calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which statistical test battery evaluates each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryKind {
    /// Signed-rank tests of self- vs control-correlation medians.
    Classic,
    /// Kruskal-Wallis / rank-sum tests for CNN-derived features.
    Cnn,
    /// Kruskal-Wallis on raw upper-triangle values. Opt-in only.
    ClassicRaw,
}

impl fmt::Display for BatteryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryKind::Classic => write!(f, "classic"),
            BatteryKind::Cnn => write!(f, "cnn"),
            BatteryKind::ClassicRaw => write!(f, "classic_raw"),
        }
    }
}

impl FromStr for BatteryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(BatteryKind::Classic),
            "cnn" => Ok(BatteryKind::Cnn),
            "classic_raw" | "classic-raw" => Ok(BatteryKind::ClassicRaw),
            other => Err(format!("unknown test battery '{other}'")),
        }
    }
}

/// How raw p-values become significance flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignificancePolicy {
    /// Benjamini-Hochberg across all pairs, per test field, at rate `q`.
    Fdr { q: f64 },
    /// Uncorrected `p < threshold`.
    Raw { threshold: f64 },
}

impl Default for SignificancePolicy {
    fn default() -> Self {
        SignificancePolicy::Fdr { q: 0.05 }
    }
}

/// Naming convention linking a mutant label to its wild-type label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WildTypeNaming {
    /// Separator whose first token is the gene name (`BRAF_V600E` → `BRAF`).
    pub separator: String,
    /// Appended to the gene name to form the wild-type search key.
    pub suffix: String,
    /// Marker that singles out one label when the search key matches several.
    pub marker: String,
}

impl Default for WildTypeNaming {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            suffix: "_WT".to_string(),
            marker: ".c".to_string(),
        }
    }
}

/// Tunable parameters for a VIP run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VipConfig {
    /// Seed for replicate subsampling, control matching and null shuffles.
    pub seed: u64,
    /// Maximum replicates drawn per wild type and per mutant.
    pub treatment_samples: usize,
    /// Matched controls drawn per treated sample.
    pub control_samples: usize,
    /// `sample_type` value that marks a negative control.
    pub controls_value: String,
    pub battery: BatteryKind,
    pub significance: SignificancePolicy,
    /// Group size for null-distribution chunks.
    pub null_group_size: usize,
    /// Reshuffles of the sample pool when building the null.
    pub null_repeats: usize,
    /// Compare each mutant against a disjoint half of itself to estimate the
    /// false-positive rate.
    pub false_positives: bool,
    pub wild_type: WildTypeNaming,
}

impl Default for VipConfig {
    fn default() -> Self {
        Self {
            seed: 8,
            treatment_samples: 4,
            control_samples: 20,
            controls_value: "control".to_string(),
            battery: BatteryKind::Classic,
            significance: SignificancePolicy::default(),
            null_group_size: 4,
            null_repeats: 30,
            false_positives: false,
            wild_type: WildTypeNaming::default(),
        }
    }
}

impl VipConfig {
    /// Seed for the null-distribution shuffles, distinct from the evaluator's stream.
    pub fn null_seed(&self) -> u64 {
        self.seed.wrapping_add(1)
    }

    /// Seed for the replicate-strength assessment.
    pub fn strength_seed(&self) -> u64 {
        self.seed.wrapping_add(2)
    }
}

/// Load a configuration JSON from disk. Missing fields take their defaults.
pub fn load_config_from_path(path: &Path) -> std::io::Result<VipConfig> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str::<VipConfig>(&raw).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("failed to parse config JSON: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: VipConfig =
            serde_json::from_str(r#"{"seed": 42, "battery": "cnn", "significance": {"raw": {"threshold": 0.01}}}"#)
                .unwrap();
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.battery, BatteryKind::Cnn);
        assert_eq!(cfg.significance, SignificancePolicy::Raw { threshold: 0.01 });
        assert_eq!(cfg.treatment_samples, 4);
        assert_eq!(cfg.wild_type.suffix, "_WT");
    }

    #[test]
    fn battery_kind_parses_cli_spellings() {
        assert_eq!("classic".parse::<BatteryKind>(), Ok(BatteryKind::Classic));
        assert_eq!("CNN".parse::<BatteryKind>(), Ok(BatteryKind::Cnn));
        assert_eq!("classic-raw".parse::<BatteryKind>(), Ok(BatteryKind::ClassicRaw));
        assert!("bogus".parse::<BatteryKind>().is_err());
        assert_eq!(BatteryKind::ClassicRaw.to_string(), "classic_raw");
    }

    #[test]
    fn derived_seeds_differ() {
        let cfg = VipConfig::default();
        assert_eq!(cfg.seed, 8);
        assert_ne!(cfg.null_seed(), cfg.seed);
        assert_ne!(cfg.null_seed(), cfg.strength_seed());
    }

    #[test]
    fn load_config_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config_from_path(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
