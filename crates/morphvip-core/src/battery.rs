//! Statistical test batteries.
//!
//! A battery turns the five correlation sub-matrices of one allele pair into a
//! fixed set of named p-values, and owns the decision table that maps their
//! significance flags to an [`Impact`] label.

use morphvip_stats::{TestResult, kruskal_wallis, median, rank_sums, wilcoxon_signed_rank};
use serde::{Deserialize, Serialize};

use crate::config::BatteryKind;
use crate::correlation::{SubMatrix, median_row};
use crate::null::NullDistribution;
use crate::significance::{DecisionRule, Impact, SignificanceFlags, apply_rules};

/// The five sub-matrices of one (wild type, mutant) pair.
#[derive(Debug, Clone)]
pub struct PairMatrices {
    pub wt_wt: SubMatrix,
    pub mut_mut: SubMatrix,
    /// Wild-type replicates × matched controls.
    pub wt_ctl: SubMatrix,
    /// Mutant replicates × matched controls.
    pub mut_ctl: SubMatrix,
    /// Wild-type replicates × mutant replicates.
    pub wt_mut: SubMatrix,
}

impl PairMatrices {
    /// Medians of the wild-type/mutant cross-correlations: per mutant column,
    /// then per wild-type row.
    pub fn cross_medians(&self) -> Vec<f64> {
        let mut cross = self.wt_mut.column_medians();
        cross.extend(self.wt_mut.row_medians());
        cross
    }
}

/// One named test of a battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub field: String,
    /// `None` when the test was degenerate.
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
}

impl TestOutcome {
    fn from_result(field: &str, result: TestResult) -> Self {
        TestOutcome {
            field: field.to_string(),
            p_value: result.p_value,
            statistic: result.statistic,
            details: result.details,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryOutcome {
    pub tests: Vec<TestOutcome>,
    pub directionality: Option<bool>,
}

/// A family of tests together with its classification table.
pub trait TestBattery {
    fn kind(&self) -> BatteryKind;

    /// P-value fields, in output order. Each is corrected independently.
    fn fields(&self) -> &'static [&'static str];

    fn run(&self, pair: &PairMatrices, null: Option<&NullDistribution>) -> BatteryOutcome;

    /// Ordered decision table; the last applicable rule wins.
    fn rules(&self) -> &'static [DecisionRule];

    fn classify(&self, flags: &SignificanceFlags) -> Impact {
        apply_rules(self.rules(), flags)
    }
}

pub fn battery_for(kind: BatteryKind) -> Box<dyn TestBattery> {
    match kind {
        BatteryKind::Classic => Box::new(ClassicBattery),
        BatteryKind::Cnn => Box::new(CnnBattery),
        BatteryKind::ClassicRaw => Box::new(ClassicRawBattery),
    }
}

// ---------------------------------------------------------------------------
// Classic
// ---------------------------------------------------------------------------

pub const WT_HAS_EFFECT: &str = "wt_has_effect";
pub const MUT_HAS_EFFECT: &str = "mut_has_effect";
pub const WT_MUT_DIFFERENCE: &str = "wt_mut_difference";

const CLASSIC_FIELDS: &[&str] = &[WT_HAS_EFFECT, MUT_HAS_EFFECT, WT_MUT_DIFFERENCE];

fn classic_gof(f: &SignificanceFlags) -> bool {
    !f.is(WT_HAS_EFFECT) && f.is(MUT_HAS_EFFECT)
}

fn classic_lof(f: &SignificanceFlags) -> bool {
    f.is(WT_HAS_EFFECT) && !f.is(MUT_HAS_EFFECT)
}

fn classic_cof(f: &SignificanceFlags) -> bool {
    f.is(WT_HAS_EFFECT) && f.is(MUT_HAS_EFFECT) && f.is(WT_MUT_DIFFERENCE)
}

fn classic_nt(f: &SignificanceFlags) -> bool {
    f.is(WT_HAS_EFFECT) && f.is(MUT_HAS_EFFECT) && !f.is(WT_MUT_DIFFERENCE)
}

const CLASSIC_RULES: &[DecisionRule] = &[
    DecisionRule { label: Impact::Gof, when: classic_gof },
    DecisionRule { label: Impact::Lof, when: classic_lof },
    DecisionRule { label: Impact::Cof, when: classic_cof },
    DecisionRule { label: Impact::Nt, when: classic_nt },
];

/// Paired signed-rank tests on self-correlation medians.
///
/// Each allele's per-replicate self-correlation median is paired with that
/// replicate's median correlation to its matched controls. The difference test
/// pairs the mutant self medians with the row medians of the wild type × mutant
/// block (one per wild-type replicate); unequal replicate counts leave it
/// undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicBattery;

impl TestBattery for ClassicBattery {
    fn kind(&self) -> BatteryKind {
        BatteryKind::Classic
    }

    fn fields(&self) -> &'static [&'static str] {
        CLASSIC_FIELDS
    }

    fn run(&self, pair: &PairMatrices, _null: Option<&NullDistribution>) -> BatteryOutcome {
        let wt_self = median_row(&pair.wt_wt);
        let mut_self = median_row(&pair.mut_mut);
        let tests = vec![
            TestOutcome::from_result(
                WT_HAS_EFFECT,
                wilcoxon_signed_rank(&wt_self, &pair.wt_ctl.row_medians()),
            ),
            TestOutcome::from_result(
                MUT_HAS_EFFECT,
                wilcoxon_signed_rank(&mut_self, &pair.mut_ctl.row_medians()),
            ),
            TestOutcome::from_result(
                WT_MUT_DIFFERENCE,
                wilcoxon_signed_rank(&mut_self, &pair.wt_mut.row_medians()),
            ),
        ];
        BatteryOutcome {
            tests,
            directionality: None,
        }
    }

    fn rules(&self) -> &'static [DecisionRule] {
        CLASSIC_RULES
    }
}

/// Kruskal-Wallis on raw upper-triangle values against flattened control and
/// cross matrices. Same fields and table as [`ClassicBattery`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicRawBattery;

impl TestBattery for ClassicRawBattery {
    fn kind(&self) -> BatteryKind {
        BatteryKind::ClassicRaw
    }

    fn fields(&self) -> &'static [&'static str] {
        CLASSIC_FIELDS
    }

    fn run(&self, pair: &PairMatrices, _null: Option<&NullDistribution>) -> BatteryOutcome {
        let wt_upper = pair.wt_wt.upper_triangle();
        let mut_upper = pair.mut_mut.upper_triangle();
        let tests = vec![
            TestOutcome::from_result(
                WT_HAS_EFFECT,
                kruskal_wallis(&[wt_upper.as_slice(), pair.wt_ctl.flatten()]),
            ),
            TestOutcome::from_result(
                MUT_HAS_EFFECT,
                kruskal_wallis(&[mut_upper.as_slice(), pair.mut_ctl.flatten()]),
            ),
            TestOutcome::from_result(
                WT_MUT_DIFFERENCE,
                kruskal_wallis(&[wt_upper.as_slice(), pair.wt_mut.flatten()]),
            ),
        ];
        BatteryOutcome {
            tests,
            directionality: None,
        }
    }

    fn rules(&self) -> &'static [DecisionRule] {
        CLASSIC_RULES
    }
}

// ---------------------------------------------------------------------------
// CNN features
// ---------------------------------------------------------------------------

pub const IMPACT_TEST: &str = "impact_test";
pub const STRENGTH_TEST: &str = "strength_test";
pub const POWER_TEST: &str = "power_test";

const CNN_FIELDS: &[&str] = &[IMPACT_TEST, STRENGTH_TEST, POWER_TEST];

fn cnn_gof(f: &SignificanceFlags) -> bool {
    f.is(IMPACT_TEST) && f.is(STRENGTH_TEST) && f.direction()
}

fn cnn_lof(f: &SignificanceFlags) -> bool {
    f.is(IMPACT_TEST) && f.is(STRENGTH_TEST) && !f.direction()
}

fn cnn_cof(f: &SignificanceFlags) -> bool {
    f.is(IMPACT_TEST) && !f.is(STRENGTH_TEST)
}

fn cnn_nt(f: &SignificanceFlags) -> bool {
    !f.is(IMPACT_TEST) && f.is(POWER_TEST)
}

const CNN_RULES: &[DecisionRule] = &[
    DecisionRule { label: Impact::Gof, when: cnn_gof },
    DecisionRule { label: Impact::Lof, when: cnn_lof },
    DecisionRule { label: Impact::Cof, when: cnn_cof },
    DecisionRule { label: Impact::Nt, when: cnn_nt },
];

/// Unpaired tests for profiles built from learned image features.
///
/// `impact_test` compares three groups: wild-type self medians, mutant self
/// medians and the cross medians. `power_test` needs a null distribution and is
/// degenerate without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct CnnBattery;

impl TestBattery for CnnBattery {
    fn kind(&self) -> BatteryKind {
        BatteryKind::Cnn
    }

    fn fields(&self) -> &'static [&'static str] {
        CNN_FIELDS
    }

    fn run(&self, pair: &PairMatrices, null: Option<&NullDistribution>) -> BatteryOutcome {
        let wt_self = median_row(&pair.wt_wt);
        let mut_self = median_row(&pair.mut_mut);
        let cross = pair.cross_medians();

        let power = match null {
            Some(null) if !null.is_empty() => rank_sums(&cross, null.values()),
            _ => TestResult::degenerate("Wilcoxon rank-sum", "no null distribution"),
        };
        let tests = vec![
            TestOutcome::from_result(
                IMPACT_TEST,
                kruskal_wallis(&[wt_self.as_slice(), mut_self.as_slice(), cross.as_slice()]),
            ),
            TestOutcome::from_result(STRENGTH_TEST, rank_sums(&wt_self, &mut_self)),
            TestOutcome::from_result(POWER_TEST, power),
        ];

        // NaN medians compare false
        let directionality = median(&mut_self) > median(&wt_self);
        BatteryOutcome {
            tests,
            directionality: Some(directionality),
        }
    }

    fn rules(&self) -> &'static [DecisionRule] {
        CNN_RULES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Symmetric `n × n` block with unit diagonal and `off` elsewhere, jittered
    /// so rank tests see no ties.
    fn block(n: usize, off: f64) -> SubMatrix {
        SubMatrix::from_rows(
            (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| {
                            if i == j {
                                1.0
                            } else {
                                off + 0.001 * (i + j) as f64
                            }
                        })
                        .collect()
                })
                .collect(),
        )
        .unwrap()
    }

    fn rect(rows: usize, cols: usize, level: f64) -> SubMatrix {
        SubMatrix::from_rows(
            (0..rows)
                .map(|i| (0..cols).map(|j| level + 0.0007 * (i * cols + j) as f64).collect())
                .collect(),
        )
        .unwrap()
    }

    fn pair(wt: f64, mt: f64, cross: f64) -> PairMatrices {
        PairMatrices {
            wt_wt: block(8, wt),
            mut_mut: block(8, mt),
            wt_ctl: rect(8, 10, 0.0),
            mut_ctl: rect(8, 10, 0.0),
            wt_mut: rect(8, 8, cross),
        }
    }

    #[test]
    fn classic_detects_both_effects_and_difference() {
        let out = ClassicBattery.run(&pair(0.8, 0.6, 0.1), None);
        assert_eq!(out.tests.len(), 3);
        let fields: Vec<&str> = out.tests.iter().map(|t| t.field.as_str()).collect();
        assert_eq!(fields, CLASSIC_FIELDS);
        // all 8 paired differences share a sign: exact p = 2/256
        for t in &out.tests {
            let p = t.p_value.unwrap();
            assert!((p - 2.0 / 256.0).abs() < 1e-12, "{}: {p}", t.field);
        }
        assert_eq!(out.directionality, None);
    }

    #[test]
    fn classic_difference_uses_cross_row_medians() {
        let wt_mut = SubMatrix::from_rows(vec![
            vec![0.10, 0.11, 0.12, 0.13],
            vec![0.50, 0.52, 0.54, 0.56],
            vec![0.20, 0.23, 0.26, 0.29],
            vec![0.70, 0.71, 0.75, 0.77],
        ])
        .unwrap();
        let p = PairMatrices {
            wt_wt: block(4, 0.6),
            mut_mut: block(4, 0.43),
            wt_ctl: rect(4, 6, 0.0),
            mut_ctl: rect(4, 6, 0.0),
            wt_mut,
        };
        let out = ClassicBattery.run(&p, None);
        let diff = out
            .tests
            .iter()
            .find(|t| t.field == WT_MUT_DIFFERENCE)
            .unwrap();
        // mut self [.432,.433,.433,.434] vs row medians [.115,.53,.245,.73]:
        // W- = 4 of 10, exact two-sided p = 14/16. Column medians would give 2/16.
        assert!((diff.p_value.unwrap() - 0.875).abs() < 1e-12);
    }

    #[test]
    fn classic_difference_undefined_for_unequal_counts() {
        let p = PairMatrices {
            wt_wt: block(3, 0.6),
            mut_mut: block(5, 0.6),
            wt_ctl: rect(3, 6, 0.0),
            mut_ctl: rect(5, 6, 0.0),
            wt_mut: rect(3, 5, 0.1),
        };
        let out = ClassicBattery.run(&p, None);
        let diff = out
            .tests
            .iter()
            .find(|t| t.field == WT_MUT_DIFFERENCE)
            .unwrap();
        assert_eq!(diff.p_value, None);
        assert!(out.tests[0].p_value.is_some());
    }

    #[test]
    fn classic_raw_uses_kruskal_wallis() {
        let out = ClassicRawBattery.run(&pair(0.8, 0.6, 0.1), None);
        assert_eq!(ClassicRawBattery.kind(), BatteryKind::ClassicRaw);
        for t in &out.tests {
            assert!(t.p_value.unwrap() < 1e-6, "{}", t.field);
        }
    }

    #[test]
    fn cnn_reports_direction_and_needs_null_for_power() {
        let out = CnnBattery.run(&pair(0.3, 0.8, 0.1), None);
        assert_eq!(out.directionality, Some(true));
        let power = out.tests.iter().find(|t| t.field == POWER_TEST).unwrap();
        assert_eq!(power.p_value, None);

        let null = NullDistribution::new((0..40).map(|i| 0.5 + 0.001 * i as f64).collect());
        let out = CnnBattery.run(&pair(0.3, 0.8, 0.1), Some(&null));
        let power = out.tests.iter().find(|t| t.field == POWER_TEST).unwrap();
        assert!(power.p_value.unwrap() < 0.001);
        let strength = out.tests.iter().find(|t| t.field == STRENGTH_TEST).unwrap();
        assert!(strength.p_value.unwrap() < 0.01);
    }

    #[test]
    fn cross_medians_concatenate_columns_then_rows() {
        let p = PairMatrices {
            wt_wt: block(2, 0.5),
            mut_mut: block(3, 0.5),
            wt_ctl: rect(2, 2, 0.0),
            mut_ctl: rect(3, 2, 0.0),
            wt_mut: SubMatrix::from_rows(vec![vec![0.1, 0.2, 0.3], vec![0.5, 0.6, 0.7]]).unwrap(),
        };
        let cross = p.cross_medians();
        assert_eq!(cross.len(), 5);
        let expected = [0.3, 0.4, 0.5, 0.2, 0.6];
        for (a, b) in cross.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn battery_for_matches_kind() {
        for kind in [BatteryKind::Classic, BatteryKind::Cnn, BatteryKind::ClassicRaw] {
            assert_eq!(battery_for(kind).kind(), kind);
        }
        assert_eq!(battery_for(BatteryKind::Cnn).fields(), CNN_FIELDS);
    }
}
