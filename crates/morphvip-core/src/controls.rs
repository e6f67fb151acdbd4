//! Plate-matched negative-control selection.
//!
//! Each treated sample is compared against controls from its own plate. When the
//! plate holds fewer than `pool_size` controls, the pool is drawn from all
//! controls instead, so a sparse plate never blocks the analysis.

use log::debug;
use rand::Rng;
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::correlation::{SubMatrix, rectangular_submatrix};
use crate::dataset::Dataset;
use crate::error::{Result, VipError};

/// Control pools indexed by plate, built once per dataset.
#[derive(Debug, Clone)]
pub struct ControlSampler {
    pool_size: usize,
    controls: Vec<usize>,
    by_plate: HashMap<String, Vec<usize>>,
}

impl ControlSampler {
    pub fn new(dataset: &Dataset, controls_value: &str, pool_size: usize) -> Self {
        let controls = dataset.control_indices(controls_value);
        let mut by_plate: HashMap<String, Vec<usize>> = HashMap::new();
        for &i in &controls {
            by_plate
                .entry(dataset.samples()[i].plate.clone())
                .or_default()
                .push(i);
        }
        Self {
            pool_size,
            controls,
            by_plate,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Total controls across all plates.
    pub fn population(&self) -> usize {
        self.controls.len()
    }

    /// Choose the control set for one sample.
    pub fn select_controls<R: Rng + ?Sized>(
        &self,
        sample: usize,
        dataset: &Dataset,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        if self.pool_size == 0 {
            return Err(VipError::insufficient("control pool size", 1, 0));
        }
        let Some(record) = dataset.samples().get(sample) else {
            return Err(VipError::IndexOutOfRange {
                index: sample,
                len: dataset.len(),
            });
        };
        let matched = self
            .by_plate
            .get(&record.plate)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        match matched.len().cmp(&self.pool_size) {
            Ordering::Equal => Ok(matched.to_vec()),
            Ordering::Greater => {
                let mut pool = matched.to_vec();
                pool.shuffle(rng);
                pool.truncate(self.pool_size);
                Ok(pool)
            }
            Ordering::Less => {
                if self.controls.is_empty() {
                    return Err(VipError::insufficient("control population", self.pool_size, 0));
                }
                debug!(
                    "plate {} has {} controls for sample {}, drawing {} from all plates",
                    record.plate,
                    matched.len(),
                    record.id,
                    self.pool_size
                );
                let mut pool = self.controls.clone();
                pool.shuffle(rng);
                pool.truncate(self.pool_size);
                Ok(pool)
            }
        }
    }

    /// Stack each sample's correlations to its matched controls (samples × pool).
    pub fn match_controls<R: Rng + ?Sized>(
        &self,
        samples: &[usize],
        dataset: &Dataset,
        rng: &mut R,
    ) -> Result<SubMatrix> {
        if samples.is_empty() {
            return Err(VipError::insufficient("control matching", 1, 0));
        }
        let mut rows = Vec::with_capacity(samples.len());
        for &sample in samples {
            let pool = self.select_controls(sample, dataset, rng)?;
            rows.push(rectangular_submatrix(&[sample], &pool, dataset.matrix())?);
        }
        SubMatrix::vstack(&rows)
    }
}
