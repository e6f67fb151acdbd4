//! Per-pair orchestration: wild-type lookup, replicate sampling, sub-matrix
//! construction and the configured test battery.

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::battery::{PairMatrices, TestBattery, TestOutcome, battery_for};
use crate::config::{BatteryKind, VipConfig};
use crate::controls::ControlSampler;
use crate::correlation::{rectangular_submatrix, symmetric_submatrix};
use crate::dataset::Dataset;
use crate::error::{Result, VipError};
use crate::index::AlleleIndexTree;
use crate::null::NullDistribution;

/// Raw battery output for one (wild type, mutant) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub wild_type: String,
    pub mutant: String,
    pub wt_samples: usize,
    pub mut_samples: usize,
    pub battery: BatteryKind,
    pub tests: Vec<TestOutcome>,
    /// Only the CNN battery reports directionality.
    pub directionality: Option<bool>,
}

impl EvaluationRecord {
    pub fn p_value(&self, field: &str) -> Option<f64> {
        self.tests
            .iter()
            .find(|t| t.field == field)
            .and_then(|t| t.p_value)
    }
}

/// Outcome of [`VipEvaluator::test_allele_set`].
#[derive(Debug, Clone, Default)]
pub struct EvaluationBatch {
    pub records: Vec<EvaluationRecord>,
    /// Alleles that could not be evaluated, with the reason.
    pub skipped: Vec<(String, VipError)>,
}

/// Evaluates allele pairs against one dataset.
///
/// All randomness comes from a single `StdRng` seeded from the configuration,
/// so evaluating the same allele list twice from a fresh evaluator yields the
/// same records.
pub struct VipEvaluator<'a> {
    dataset: &'a Dataset,
    config: VipConfig,
    battery: Box<dyn TestBattery>,
    sampler: ControlSampler,
    null: Option<NullDistribution>,
    rng: StdRng,
    index: AlleleIndexTree,
}

impl<'a> VipEvaluator<'a> {
    pub fn new(dataset: &'a Dataset, config: VipConfig) -> Self {
        let sampler = ControlSampler::new(dataset, &config.controls_value, config.control_samples);
        debug!(
            "evaluator: {} samples, {} controls, battery {}",
            dataset.len(),
            sampler.population(),
            config.battery
        );
        Self {
            dataset,
            battery: battery_for(config.battery),
            sampler,
            null: None,
            rng: StdRng::seed_from_u64(config.seed),
            index: AlleleIndexTree::new(),
            config,
        }
    }

    /// Attach the reference distribution used by the CNN power test.
    pub fn with_null(mut self, null: NullDistribution) -> Self {
        self.null = Some(null);
        self
    }

    pub fn config(&self) -> &VipConfig {
        &self.config
    }

    pub fn battery(&self) -> &dyn TestBattery {
        self.battery.as_ref()
    }

    pub fn index(&self) -> &AlleleIndexTree {
        &self.index
    }

    pub fn into_index(self) -> AlleleIndexTree {
        self.index
    }

    /// Find the wild-type label for `mutant`.
    ///
    /// The search key is the mutant's gene token plus the wild-type suffix
    /// (`KRAS_G12D` → `KRAS_WT`), matched as a substring against every
    /// perturbation label. Several hits are narrowed to those carrying the
    /// disambiguation marker.
    pub fn resolve_wild_type(&self, mutant: &str) -> Result<String> {
        let naming = &self.config.wild_type;
        let gene = mutant
            .split(naming.separator.as_str())
            .next()
            .unwrap_or(mutant);
        let key = format!("{gene}{}", naming.suffix);

        let candidates: Vec<&str> = self
            .dataset
            .perturbations()
            .into_iter()
            .filter(|p| p.contains(&key))
            .collect();

        match candidates.as_slice() {
            [single] => Ok(single.to_string()),
            [] if self.config.false_positives => Ok(mutant.to_string()),
            [] => Err(VipError::UnresolvedWildType {
                mutant: mutant.to_string(),
            }),
            _ => {
                let marked: Vec<&str> = candidates
                    .iter()
                    .copied()
                    .filter(|c| c.contains(naming.marker.as_str()))
                    .collect();
                match marked.as_slice() {
                    [single] => Ok(single.to_string()),
                    _ => Err(VipError::AmbiguousWildType {
                        mutant: mutant.to_string(),
                        candidates: candidates.iter().map(|c| c.to_string()).collect(),
                    }),
                }
            }
        }
    }

    /// Run the battery on one pair and record it in the index.
    pub fn evaluate(&mut self, wild_type: &str, mutant: &str) -> Result<EvaluationRecord> {
        let (wt_idx, mut_idx) = if self.config.false_positives {
            self.split_replicates(mutant)?
        } else {
            (self.draw_replicates(wild_type)?, self.draw_replicates(mutant)?)
        };

        let matrix = self.dataset.matrix();
        let pair = PairMatrices {
            wt_wt: symmetric_submatrix(&wt_idx, matrix)?,
            mut_mut: symmetric_submatrix(&mut_idx, matrix)?,
            wt_ctl: self
                .sampler
                .match_controls(&wt_idx, self.dataset, &mut self.rng)?,
            mut_ctl: self
                .sampler
                .match_controls(&mut_idx, self.dataset, &mut self.rng)?,
            wt_mut: rectangular_submatrix(&wt_idx, &mut_idx, matrix)?,
        };
        let outcome = self.battery.run(&pair, self.null.as_ref());

        self.index.record_pair(wild_type, mutant);
        Ok(EvaluationRecord {
            wild_type: wild_type.to_string(),
            mutant: mutant.to_string(),
            wt_samples: wt_idx.len(),
            mut_samples: mut_idx.len(),
            battery: self.battery.kind(),
            tests: outcome.tests,
            directionality: outcome.directionality,
        })
    }

    /// Resolve and evaluate every allele. Per-pair failures are logged and
    /// collected; fatal input errors abort the batch.
    pub fn test_allele_set(&mut self, alleles: &[String]) -> Result<EvaluationBatch> {
        if self.battery.kind() == BatteryKind::Cnn && self.null.is_none() {
            warn!("CNN battery without a null distribution: power_test will be undefined");
        }

        let mut batch = EvaluationBatch::default();
        for mutant in alleles {
            let result = self
                .resolve_wild_type(mutant)
                .and_then(|wild_type| self.evaluate(&wild_type, mutant));
            match result {
                Ok(record) => batch.records.push(record),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("skipping {mutant}: {e}");
                    batch.skipped.push((mutant.clone(), e));
                }
            }
        }
        info!(
            "evaluated {} of {} alleles ({} skipped)",
            batch.records.len(),
            alleles.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }

    /// Up to `treatment_samples` replicates of `label`; shuffled only when there
    /// are more than that.
    fn draw_replicates(&mut self, label: &str) -> Result<Vec<usize>> {
        let mut replicates = self.dataset.indices_of(label);
        if replicates.len() < 2 {
            return Err(VipError::insufficient(
                format!("replicates of {label}"),
                2,
                replicates.len(),
            ));
        }
        if replicates.len() > self.config.treatment_samples {
            replicates.shuffle(&mut self.rng);
            replicates.truncate(self.config.treatment_samples);
        }
        Ok(replicates)
    }

    /// Two disjoint halves of the mutant's own replicates.
    fn split_replicates(&mut self, mutant: &str) -> Result<(Vec<usize>, Vec<usize>)> {
        let mut replicates = self.dataset.indices_of(mutant);
        let half = self.config.treatment_samples.min(replicates.len() / 2);
        if half < 2 {
            return Err(VipError::insufficient(
                format!("replicates of {mutant} for self-comparison"),
                4,
                replicates.len(),
            ));
        }
        replicates.shuffle(&mut self.rng);
        let second = replicates[half..2 * half].to_vec();
        replicates.truncate(half);
        Ok((second, replicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationMatrix;
    use crate::dataset::SampleRecord;
    use std::collections::HashSet;

    fn dataset(labels: &[(&str, usize)]) -> Dataset {
        let mut meta = Vec::new();
        for (label, n) in labels {
            for i in 0..*n {
                let control = *label == "EMPTY";
                meta.push(SampleRecord {
                    id: format!("{label}-{i}"),
                    perturbation: label.to_string(),
                    sample_type: (if control { "control" } else { "treated" }).into(),
                    plate: format!("P{}", i % 2),
                });
            }
        }
        let n = meta.len();
        let rows = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            1.0
                        } else {
                            0.1 + 0.01 * ((i * 7 + j * 7) % 13) as f64
                        }
                    })
                    .collect()
            })
            .collect();
        let ids = meta.iter().map(|m| m.id.clone()).collect();
        Dataset::new(meta, CorrelationMatrix::new(ids, rows).unwrap()).unwrap()
    }

    fn config() -> VipConfig {
        VipConfig {
            control_samples: 4,
            ..VipConfig::default()
        }
    }

    #[test]
    fn resolves_single_and_marked_wild_types() {
        let ds = dataset(&[
            ("KRAS_WT", 4),
            ("TP53_WT", 4),
            ("TP53_WT.c", 4),
            ("TP53_R175H", 4),
            ("EMPTY", 8),
        ]);
        let ev = VipEvaluator::new(&ds, config());
        assert_eq!(ev.resolve_wild_type("KRAS_G12D").unwrap(), "KRAS_WT");
        assert_eq!(ev.resolve_wild_type("TP53_R175H").unwrap(), "TP53_WT.c");
        assert_eq!(
            ev.resolve_wild_type("EGFR_L858R").unwrap_err(),
            VipError::UnresolvedWildType {
                mutant: "EGFR_L858R".into()
            }
        );
    }

    #[test]
    fn ambiguous_when_marker_does_not_single_out_one() {
        let ds = dataset(&[("BRAF_WT.1", 3), ("BRAF_WT.2", 3), ("EMPTY", 4)]);
        let ev = VipEvaluator::new(&ds, config());
        match ev.resolve_wild_type("BRAF_V600E") {
            Err(VipError::AmbiguousWildType { candidates, .. }) => {
                assert_eq!(candidates, vec!["BRAF_WT.1", "BRAF_WT.2"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn false_positive_mode_compares_mutant_with_itself() {
        let ds = dataset(&[("EGFR_L858R", 8), ("EMPTY", 8)]);
        let mut ev = VipEvaluator::new(
            &ds,
            VipConfig {
                false_positives: true,
                ..config()
            },
        );
        let wt = ev.resolve_wild_type("EGFR_L858R").unwrap();
        assert_eq!(wt, "EGFR_L858R");
        let (a, b) = ev.split_replicates("EGFR_L858R").unwrap();
        assert_eq!((a.len(), b.len()), (4, 4));
        let overlap: HashSet<_> = a.iter().filter(|i| b.contains(i)).collect();
        assert!(overlap.is_empty());
    }

    #[test]
    fn evaluate_builds_record_and_index_entry() {
        let ds = dataset(&[("KRAS_WT", 6), ("KRAS_G12D", 3), ("EMPTY", 10)]);
        let mut ev = VipEvaluator::new(&ds, config());
        let record = ev.evaluate("KRAS_WT", "KRAS_G12D").unwrap();
        assert_eq!(record.wt_samples, 4);
        assert_eq!(record.mut_samples, 3);
        assert_eq!(record.tests.len(), 3);
        assert_eq!(record.battery, BatteryKind::Classic);
        assert!(ev.index().find("KRAS_WT", "KRAS_G12D").is_some());
    }

    #[test]
    fn allele_set_collects_skips() {
        let ds = dataset(&[("KRAS_WT", 4), ("KRAS_G12D", 4), ("EMPTY", 8)]);
        let mut ev = VipEvaluator::new(&ds, config());
        let alleles = vec!["KRAS_G12D".to_string(), "NRAS_Q61K".to_string()];
        let batch = ev.test_allele_set(&alleles).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].0, "NRAS_Q61K");
        assert!(matches!(
            batch.skipped[0].1,
            VipError::UnresolvedWildType { .. }
        ));
    }

    #[test]
    fn same_seed_same_records() {
        let ds = dataset(&[("KRAS_WT", 9), ("KRAS_G12D", 9), ("EMPTY", 12)]);
        let alleles = vec!["KRAS_G12D".to_string()];
        let a = VipEvaluator::new(&ds, config())
            .test_allele_set(&alleles)
            .unwrap();
        let b = VipEvaluator::new(&ds, config())
            .test_allele_set(&alleles)
            .unwrap();
        assert_eq!(a.records, b.records);
    }
}
