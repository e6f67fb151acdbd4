//! Sample metadata aligned to correlation-matrix rows.
//!
//! The identifier-to-row mapping is resolved once in [`Dataset::new`]; every
//! downstream operation works on matrix row indices.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::correlation::CorrelationMatrix;
use crate::error::{Result, VipError};

/// One replicate well / profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Unique sample identifier, matching the correlation matrix.
    pub id: String,
    /// Wild-type or mutant label.
    pub perturbation: String,
    /// Control/treatment type flag, e.g. `"control"` or `"treated"`.
    pub sample_type: String,
    /// Batch / plate identifier.
    pub plate: String,
}

/// Metadata and correlation matrix, aligned by sample identifier.
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Vec<SampleRecord>,
    matrix: CorrelationMatrix,
}

impl Dataset {
    /// Align `metadata` to the matrix row order.
    ///
    /// Metadata rows absent from the matrix are dropped with a warning. A matrix
    /// row without metadata, a repeated identifier on either side, or no overlap
    /// at all, is an error.
    pub fn new(metadata: Vec<SampleRecord>, matrix: CorrelationMatrix) -> Result<Self> {
        let mut by_id: HashMap<String, SampleRecord> = HashMap::with_capacity(metadata.len());
        for record in metadata {
            if by_id.contains_key(&record.id) {
                return Err(VipError::DuplicateSample {
                    id: record.id,
                    origin: "metadata",
                });
            }
            by_id.insert(record.id.clone(), record);
        }

        let mut matrix_ids: HashSet<&str> = HashSet::with_capacity(matrix.len());
        for id in matrix.ids() {
            if !matrix_ids.insert(id.as_str()) {
                return Err(VipError::DuplicateSample {
                    id: id.clone(),
                    origin: "correlation matrix",
                });
            }
        }
        if !by_id.keys().any(|id| matrix_ids.contains(id.as_str())) {
            return Err(VipError::DisjointSamples);
        }
        let dropped = by_id
            .keys()
            .filter(|id| !matrix_ids.contains(id.as_str()))
            .count();
        if dropped > 0 {
            warn!("{dropped} metadata rows have no correlation-matrix row and were dropped");
        }

        let mut samples = Vec::with_capacity(matrix.len());
        for id in matrix.ids() {
            match by_id.remove(id) {
                Some(record) => samples.push(record),
                None => return Err(VipError::UnknownSample { id: id.clone() }),
            }
        }
        Ok(Self { samples, matrix })
    }

    pub fn samples(&self) -> &[SampleRecord] {
        &self.samples
    }

    pub fn matrix(&self) -> &CorrelationMatrix {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Matrix rows carrying `perturbation`, in matrix order.
    pub fn indices_of(&self, perturbation: &str) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.perturbation == perturbation)
            .map(|(i, _)| i)
            .collect()
    }

    /// Matrix rows whose `sample_type` equals `controls_value`.
    pub fn control_indices(&self, controls_value: &str) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.sample_type == controls_value)
            .map(|(i, _)| i)
            .collect()
    }

    /// Matrix rows that are not controls.
    pub fn treated_indices(&self, controls_value: &str) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.sample_type != controls_value)
            .map(|(i, _)| i)
            .collect()
    }

    /// Distinct perturbation labels in first-appearance order.
    pub fn perturbations(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.samples
            .iter()
            .map(|s| s.perturbation.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, perturbation: &str, sample_type: &str, plate: &str) -> SampleRecord {
        SampleRecord {
            id: id.into(),
            perturbation: perturbation.into(),
            sample_type: sample_type.into(),
            plate: plate.into(),
        }
    }

    fn identity(ids: &[&str]) -> CorrelationMatrix {
        let n = ids.len();
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        CorrelationMatrix::new(ids.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn aligns_metadata_to_matrix_order() {
        let meta = vec![
            record("b", "GENE_WT", "treated", "P1"),
            record("a", "ctl", "control", "P1"),
            record("zz", "GENE_X", "treated", "P2"),
        ];
        let ds = Dataset::new(meta, identity(&["a", "b"])).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.samples()[0].id, "a");
        assert_eq!(ds.indices_of("GENE_WT"), vec![1]);
        assert_eq!(ds.control_indices("control"), vec![0]);
        assert_eq!(ds.treated_indices("control"), vec![1]);
        assert_eq!(ds.perturbations(), vec!["ctl", "GENE_WT"]);
    }

    #[test]
    fn disjoint_identifiers_are_fatal() {
        let meta = vec![record("x", "p", "treated", "P1")];
        let err = Dataset::new(meta, identity(&["a"])).unwrap_err();
        assert_eq!(err, VipError::DisjointSamples);
        assert!(err.is_fatal());
    }

    #[test]
    fn matrix_row_without_metadata_is_fatal() {
        let meta = vec![record("a", "p", "treated", "P1")];
        let err = Dataset::new(meta, identity(&["a", "b"])).unwrap_err();
        assert_eq!(err, VipError::UnknownSample { id: "b".into() });
    }

    #[test]
    fn repeated_metadata_id_is_fatal() {
        let meta = vec![
            record("a", "GENE_WT", "treated", "P1"),
            record("a", "GENE_X", "treated", "P2"),
            record("b", "ctl", "control", "P1"),
        ];
        let err = Dataset::new(meta, identity(&["a", "b"])).unwrap_err();
        assert_eq!(
            err,
            VipError::DuplicateSample {
                id: "a".into(),
                origin: "metadata"
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn repeated_matrix_id_is_fatal() {
        let meta = vec![
            record("a", "GENE_WT", "treated", "P1"),
            record("b", "ctl", "control", "P1"),
        ];
        let err = Dataset::new(meta, identity(&["a", "b", "a"])).unwrap_err();
        assert_eq!(
            err,
            VipError::DuplicateSample {
                id: "a".into(),
                origin: "correlation matrix"
            }
        );
    }
}
