//! # morphvip-core
//!
//! **Morphological variant-impact phenotyping.**
//!
//! `morphvip-core` classifies genetic variants from the correlation structure of
//! cell-morphology profiles. Each mutant is compared with its wild type and with
//! plate-matched negative controls, and called Gain-of-Function (GOF),
//! Loss-of-Function (LOF), Change-of-Function (COF), No-Transformation (NT) or
//! No-Impact (NI).
//!
//! ## Quick Start
//!
//! ```no_run
//! use morphvip_core::{Dataset, VipConfig, VipEvaluator, apply_significance, io};
//! use std::path::Path;
//!
//! let metadata = io::load_metadata(Path::new("metadata.json")).unwrap();
//! let matrix = io::load_correlation_matrix(Path::new("matrix.json")).unwrap();
//! let dataset = Dataset::new(metadata, matrix).unwrap();
//!
//! let config = VipConfig::default();
//! let policy = config.significance;
//! let mut evaluator = VipEvaluator::new(&dataset, config);
//! let batch = evaluator
//!     .test_allele_set(&["KRAS_G12D".to_string()])
//!     .unwrap();
//! let calls = apply_significance(batch.records, evaluator.battery(), policy);
//! for call in &calls {
//!     println!("{} vs {}: {}", call.record.mutant, call.record.wild_type, call.prediction);
//! }
//! ```
//!
//! ## Architecture
//!
//! Metadata + matrix → [`Dataset`] → [`VipEvaluator`] (sub-matrices, matched
//! controls, [`TestBattery`]) → [`EvaluationRecord`]s → [`apply_significance`]
//! (Benjamini-Hochberg or raw threshold, decision table) → [`ClassifiedRecord`]s.
//!
//! Three batteries are available:
//! - **Classic** (default): paired signed-rank tests on self- vs control-correlation medians.
//! - **Cnn**: Kruskal-Wallis and rank-sum tests for learned-feature profiles,
//!   with a [`NullDistribution`] as the power-test reference.
//! - **ClassicRaw**: Kruskal-Wallis on raw correlation values. Opt-in only.

pub mod battery;
pub mod config;
pub mod controls;
pub mod correlation;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod index;
pub mod io;
pub mod null;
pub mod significance;

pub use battery::{
    BatteryOutcome, ClassicBattery, ClassicRawBattery, CnnBattery, PairMatrices, TestBattery,
    TestOutcome, battery_for,
};
pub use config::{
    BatteryKind, SignificancePolicy, VipConfig, WildTypeNaming, load_config_from_path,
};
pub use controls::ControlSampler;
pub use correlation::{
    CorrelationMatrix, SubMatrix, median_correlation, median_row, rectangular_submatrix,
    symmetric_submatrix,
};
pub use dataset::{Dataset, SampleRecord};
pub use error::{Result, VipError};
pub use evaluator::{EvaluationBatch, EvaluationRecord, VipEvaluator};
pub use index::{AlleleIndexTree, MutantNode, WildTypeNode};
pub use null::{NullDistribution, StrengthReport, build_null, fraction_strong, null_for_dataset};
pub use significance::{
    ClassifiedRecord, DecisionRule, FieldSignificance, Impact, SignificanceFlags,
    adjust_pvalues, apply_rules, apply_significance, eval_pvalues, label_counts,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
