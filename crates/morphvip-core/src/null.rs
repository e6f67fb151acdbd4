//! Chance-level background for replicate correlation.
//!
//! The null distribution collects the median self-correlation of randomly
//! assembled sample groups. It calibrates the 95th-percentile replicate-strength
//! threshold and serves as the reference group of the CNN battery's power test.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::VipConfig;
use crate::correlation::{CorrelationMatrix, median_correlation};
use crate::dataset::Dataset;
use crate::error::{Result, VipError};

/// Median correlations of label-shuffled groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NullDistribution {
    values: Vec<f64>,
}

impl NullDistribution {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `sorted[floor(q * len)]`, clamped to the last element. `None` when empty.
    pub fn percentile(&self, q: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let mut sorted = self.values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let idx = ((q.clamp(0.0, 1.0) * sorted.len() as f64) as usize).min(sorted.len() - 1);
        Some(sorted[idx])
    }
}

/// Shuffle `pool` `repeats` times, cut it into chunks of `group_size`, and
/// collect each chunk's median self-correlation. Chunks of fewer than two
/// samples have no pairwise correlations and are skipped.
pub fn build_null<R: Rng + ?Sized>(
    pool: &[usize],
    matrix: &CorrelationMatrix,
    group_size: usize,
    repeats: usize,
    rng: &mut R,
) -> Result<NullDistribution> {
    if group_size < 2 {
        return Err(VipError::insufficient("null group size", 2, group_size));
    }
    if pool.len() < 2 {
        return Err(VipError::insufficient("null sample pool", 2, pool.len()));
    }

    let mut index = pool.to_vec();
    let mut values = Vec::with_capacity(repeats * pool.len().div_ceil(group_size));
    for _ in 0..repeats {
        index.shuffle(rng);
        for chunk in index.chunks(group_size) {
            if chunk.len() < 2 {
                continue;
            }
            values.push(median_correlation(chunk, matrix)?);
        }
    }
    debug!(
        "null distribution: {} groups of {group_size} from {} samples x {repeats} repeats",
        values.len(),
        pool.len()
    );
    Ok(NullDistribution { values })
}

/// Null over every non-control sample, with the configured group size, repeat
/// count and null seed.
pub fn null_for_dataset(dataset: &Dataset, config: &VipConfig) -> Result<NullDistribution> {
    let pool = dataset.treated_indices(&config.controls_value);
    let mut rng = StdRng::seed_from_u64(config.null_seed());
    build_null(
        &pool,
        dataset.matrix(),
        config.null_group_size,
        config.null_repeats,
        &mut rng,
    )
}

// ---------------------------------------------------------------------------
// Replicate strength
// ---------------------------------------------------------------------------

/// How many treatments show replicate correlation above chance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrengthReport {
    /// Replicates drawn per treatment.
    pub sample_size: usize,
    pub treatments_tested: usize,
    /// 95th percentile of the null distribution.
    pub threshold: f64,
    /// Fraction of tested treatments whose median exceeds the threshold.
    pub fraction_strong: f64,
    /// Median replicate correlation per tested treatment.
    pub medians: BTreeMap<String, f64>,
}

/// Replicate-strength assessment against the null's 95th percentile.
///
/// Treatments with fewer than `sample_size` non-control replicates are skipped.
pub fn fraction_strong<R: Rng + ?Sized>(
    dataset: &Dataset,
    treatments: &[String],
    null: &NullDistribution,
    controls_value: &str,
    sample_size: usize,
    rng: &mut R,
) -> Result<StrengthReport> {
    let threshold = null
        .percentile(0.95)
        .ok_or_else(|| VipError::insufficient("null distribution", 1, 0))?;

    let mut medians = BTreeMap::new();
    for treatment in treatments {
        let mut replicates: Vec<usize> = dataset
            .indices_of(treatment)
            .into_iter()
            .filter(|&i| dataset.samples()[i].sample_type != controls_value)
            .collect();
        if replicates.len() < sample_size.max(2) {
            continue;
        }
        replicates.shuffle(rng);
        replicates.truncate(sample_size);
        let median = median_correlation(&replicates, dataset.matrix())?;
        medians.insert(treatment.clone(), median);
    }

    let tested = medians.len();
    let strong = medians.values().filter(|&&m| m > threshold).count();
    let fraction = if tested == 0 {
        0.0
    } else {
        strong as f64 / tested as f64
    };
    info!(
        "replicate strength: {strong}/{tested} treatments above null p95 {threshold:.4} ({:.2}%)",
        fraction * 100.0
    );

    Ok(StrengthReport {
        sample_size,
        treatments_tested: tested,
        threshold,
        fraction_strong: fraction,
        medians,
    })
}
