//! Multiple-testing correction and the significance-to-label decision tables.
//!
//! Each battery test field is corrected independently across every evaluated
//! pair. The resulting flags feed the battery's ordered rule list, where the
//! last matching rule decides the label.

use morphvip_stats::benjamini_hochberg;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::battery::TestBattery;
use crate::config::SignificancePolicy;
use crate::evaluator::EvaluationRecord;

/// Phenotype-impact call for one mutant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    /// Gain of function.
    Gof,
    /// Loss of function.
    Lof,
    /// Change of function.
    Cof,
    /// No transformation: both alleles active, indistinguishable.
    Nt,
    /// No impact.
    Ni,
}

impl Impact {
    pub const ALL: [Impact; 5] = [Impact::Gof, Impact::Lof, Impact::Cof, Impact::Nt, Impact::Ni];

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Gof => "GOF",
            Impact::Lof => "LOF",
            Impact::Cof => "COF",
            Impact::Nt => "NT",
            Impact::Ni => "NI",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decision rules
// ---------------------------------------------------------------------------

/// Significance flags of one pair, keyed by test field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignificanceFlags {
    pub significant: BTreeMap<String, bool>,
    /// CNN directionality: mutant self-correlation above wild type.
    pub direction: Option<bool>,
}

impl SignificanceFlags {
    /// Whether `field` is significant. Unknown fields are not.
    pub fn is(&self, field: &str) -> bool {
        self.significant.get(field).copied().unwrap_or(false)
    }

    pub fn direction(&self) -> bool {
        self.direction.unwrap_or(false)
    }
}

/// One row of a decision table.
#[derive(Clone, Copy)]
pub struct DecisionRule {
    pub label: Impact,
    pub when: fn(&SignificanceFlags) -> bool,
}

impl fmt::Debug for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionRule").field("label", &self.label).finish()
    }
}

/// Evaluate `rules` in order; the last applicable one wins, `NI` if none apply.
pub fn apply_rules(rules: &[DecisionRule], flags: &SignificanceFlags) -> Impact {
    rules
        .iter()
        .rev()
        .find(|rule| (rule.when)(flags))
        .map_or(Impact::Ni, |rule| rule.label)
}

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

/// Raw, adjusted and final significance of one test field for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSignificance {
    pub field: String,
    pub raw: Option<f64>,
    /// Benjamini-Hochberg adjusted p-value; `None` under the raw-threshold policy.
    pub adjusted: Option<f64>,
    pub significant: bool,
}

/// An evaluation record with its significance flags and label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub record: EvaluationRecord,
    pub significance: Vec<FieldSignificance>,
    pub prediction: Impact,
}

impl ClassifiedRecord {
    pub fn flags(&self) -> SignificanceFlags {
        SignificanceFlags {
            significant: self
                .significance
                .iter()
                .map(|s| (s.field.clone(), s.significant))
                .collect(),
            direction: self.record.directionality,
        }
    }

    pub fn field(&self, field: &str) -> Option<&FieldSignificance> {
        self.significance.iter().find(|s| s.field == field)
    }
}

/// Benjamini-Hochberg over the defined entries of one test column.
///
/// Returns `(adjusted, significant)` per entry. Undefined p-values stay
/// undefined and are never significant; they do not count towards the number
/// of hypotheses.
pub fn adjust_pvalues(raw: &[Option<f64>], q: f64) -> Vec<(Option<f64>, bool)> {
    let defined: Vec<(usize, f64)> = raw
        .iter()
        .enumerate()
        .filter_map(|(i, &p)| p.filter(|v| v.is_finite()).map(|v| (i, v)))
        .collect();
    let pvalues: Vec<f64> = defined.iter().map(|&(_, p)| p).collect();
    let adjusted = benjamini_hochberg(&pvalues);

    let mut out = vec![(None, false); raw.len()];
    for (&(i, _), adj) in defined.iter().zip(adjusted) {
        out[i] = (Some(adj), adj <= q);
    }
    out
}

/// Uncorrected `p < threshold`.
pub fn eval_pvalues(raw: &[Option<f64>], threshold: f64) -> Vec<bool> {
    raw.iter()
        .map(|p| p.is_some_and(|v| v < threshold))
        .collect()
}

/// Correct every test field of `battery` across all records and label each pair.
pub fn apply_significance(
    records: Vec<EvaluationRecord>,
    battery: &dyn TestBattery,
    policy: SignificancePolicy,
) -> Vec<ClassifiedRecord> {
    let mut per_record: Vec<Vec<FieldSignificance>> = vec![Vec::new(); records.len()];

    for &field in battery.fields() {
        let raw: Vec<Option<f64>> = records.iter().map(|r| r.p_value(field)).collect();
        let column: Vec<(Option<f64>, bool)> = match policy {
            SignificancePolicy::Fdr { q } => adjust_pvalues(&raw, q),
            SignificancePolicy::Raw { threshold } => eval_pvalues(&raw, threshold)
                .into_iter()
                .map(|sig| (None, sig))
                .collect(),
        };
        for ((slot, raw), (adjusted, significant)) in per_record.iter_mut().zip(raw).zip(column) {
            slot.push(FieldSignificance {
                field: field.to_string(),
                raw,
                adjusted,
                significant,
            });
        }
    }

    records
        .into_iter()
        .zip(per_record)
        .map(|(record, significance)| {
            let mut classified = ClassifiedRecord {
                record,
                significance,
                prediction: Impact::Ni,
            };
            classified.prediction = battery.classify(&classified.flags());
            classified
        })
        .collect()
}

/// Count of each label, in GOF, LOF, COF, NT, NI order.
pub fn label_counts(classified: &[ClassifiedRecord]) -> BTreeMap<Impact, usize> {
    let mut counts: BTreeMap<Impact, usize> = Impact::ALL.iter().map(|&i| (i, 0)).collect();
    for record in classified {
        *counts.entry(record.prediction).or_default() += 1;
    }
    counts
}
