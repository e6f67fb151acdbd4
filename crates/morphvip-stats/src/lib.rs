//! Nonparametric test battery for comparing correlation distributions.
//!
//! Provides the Wilcoxon signed-rank, Wilcoxon rank-sum and Kruskal-Wallis tests
//! used by the variant-impact evaluator, plus the Benjamini-Hochberg adjustment
//! applied across all evaluated allele pairs. Each test returns a [`TestResult`].
//! A test whose input cannot produce a defined statistic (identical values, empty
//! groups, mismatched pairs) returns `p_value: None` with the reason in `details`
//! rather than panicking.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::cmp::Ordering;

/// Largest number of non-zero paired differences for which the signed-rank test
/// enumerates the exact null distribution. Above this, or with tied differences,
/// the normal approximation is used.
pub const EXACT_SIGNED_RANK_MAX: usize = 25;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single hypothesis test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
}

impl TestResult {
    /// A test that could not produce a p-value.
    pub fn degenerate(name: &str, reason: impl Into<String>) -> Self {
        TestResult {
            name: name.to_string(),
            p_value: None,
            statistic: 0.0,
            details: reason.into(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.p_value.is_none()
    }

    /// Raw-threshold significance. An undefined p-value is never significant.
    pub fn significant_at(&self, threshold: f64) -> bool {
        match self.p_value {
            Some(p) => p < threshold,
            None => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

fn has_non_finite(values: &[f64]) -> bool {
    values.iter().any(|v| !v.is_finite())
}

/// Median with the two middle values averaged for even lengths. NaN when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(cmp_f64);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// 1-based ranks where tied values share the mean of their positions.
///
/// Also returns the size of every tie group larger than one, which the tie
/// corrections below need.
pub fn rank_average(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| cmp_f64(&values[i], &values[j]));

    let mut ranks = vec![0.0; n];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }
    (ranks, ties)
}

fn two_sided_normal_p(z: f64) -> f64 {
    let norm = Normal::standard();
    (2.0 * norm.sf(z.abs())).min(1.0)
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. PAIRED TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Two-sided Wilcoxon signed-rank test on paired samples `x[i]`, `y[i]`.
///
/// Zero differences are discarded before ranking. The statistic is
/// `min(R+, R-)`. With at most [`EXACT_SIGNED_RANK_MAX`] non-zero differences and
/// no ties in their magnitudes the p-value comes from the exact permutation
/// distribution; otherwise from the normal approximation with tie correction and
/// no continuity correction.
pub fn wilcoxon_signed_rank(x: &[f64], y: &[f64]) -> TestResult {
    let name = "Wilcoxon Signed-Rank";
    if x.len() != y.len() {
        return TestResult::degenerate(
            name,
            format!("paired samples differ in length: {} vs {}", x.len(), y.len()),
        );
    }
    if x.is_empty() {
        return TestResult::degenerate(name, "no paired observations");
    }
    if has_non_finite(x) || has_non_finite(y) {
        return TestResult::degenerate(name, "non-finite input");
    }

    let diffs: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(a, b)| a - b)
        .filter(|d| *d != 0.0)
        .collect();
    let n = diffs.len();
    let zeros = x.len() - n;
    if n == 0 {
        return TestResult::degenerate(name, "all paired differences are zero");
    }

    let magnitudes: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let (ranks, ties) = rank_average(&magnitudes);
    let r_plus: f64 = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let total = (n * (n + 1)) as f64 / 2.0;
    let t = r_plus.min(total - r_plus);

    let (p, method) = if n <= EXACT_SIGNED_RANK_MAX && ties.is_empty() {
        (signed_rank_exact_p(n, t), "exact")
    } else {
        match signed_rank_normal_p(n, t, &ties) {
            Some(p) => (p, "normal"),
            None => return TestResult::degenerate(name, "zero variance in signed ranks"),
        }
    };

    TestResult {
        name: name.to_string(),
        p_value: Some(p),
        statistic: t,
        details: format!("n={n}, zeros={zeros}, r_plus={r_plus:.1}, method={method}"),
    }
}

/// Exact two-sided p-value: `2 * P(W <= t)` under the signed-rank null.
fn signed_rank_exact_p(n: usize, t: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    // counts[s] = number of sign assignments whose positive-rank sum is s
    let mut counts = vec![0.0_f64; max_sum + 1];
    counts[0] = 1.0;
    for k in 1..=n {
        for s in (k..=max_sum).rev() {
            counts[s] += counts[s - k];
        }
    }
    let t = (t.round() as usize).min(max_sum);
    let below: f64 = counts[..=t].iter().sum();
    let total = 2.0_f64.powi(n as i32);
    (2.0 * below / total).min(1.0)
}

fn signed_rank_normal_p(n: usize, t: f64, ties: &[usize]) -> Option<f64> {
    let nf = n as f64;
    let mean = nf * (nf + 1.0) / 4.0;
    let mut var = nf * (nf + 1.0) * (2.0 * nf + 1.0);
    var -= 0.5
        * ties
            .iter()
            .map(|&c| {
                let c = c as f64;
                c * (c * c - 1.0)
            })
            .sum::<f64>();
    let se = (var / 24.0).sqrt();
    if !(se > 0.0) {
        return None;
    }
    Some(two_sided_normal_p((t - mean) / se))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. INDEPENDENT-SAMPLE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Two-sided Wilcoxon rank-sum test (normal approximation, no tie correction).
pub fn rank_sums(x: &[f64], y: &[f64]) -> TestResult {
    let name = "Wilcoxon Rank-Sum";
    if x.is_empty() || y.is_empty() {
        return TestResult::degenerate(
            name,
            format!("empty sample: n1={}, n2={}", x.len(), y.len()),
        );
    }
    if has_non_finite(x) || has_non_finite(y) {
        return TestResult::degenerate(name, "non-finite input");
    }

    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, _) = rank_average(&combined);
    let n1 = x.len() as f64;
    let n2 = y.len() as f64;
    let s: f64 = ranks[..x.len()].iter().sum();
    let expected = n1 * (n1 + n2 + 1.0) / 2.0;
    let se = (n1 * n2 * (n1 + n2 + 1.0) / 12.0).sqrt();
    let z = (s - expected) / se;
    let p = two_sided_normal_p(z);

    TestResult {
        name: name.to_string(),
        p_value: Some(p),
        statistic: z,
        details: format!("n1={}, n2={}, rank_sum={s:.1}", x.len(), y.len()),
    }
}

/// Kruskal-Wallis H test across two or more groups, with tie correction.
pub fn kruskal_wallis(groups: &[&[f64]]) -> TestResult {
    let name = "Kruskal-Wallis H";
    if groups.len() < 2 {
        return TestResult::degenerate(
            name,
            format!("need at least two groups, got {}", groups.len()),
        );
    }
    if let Some(pos) = groups.iter().position(|g| g.is_empty()) {
        return TestResult::degenerate(name, format!("group {pos} is empty"));
    }
    if groups.iter().any(|g| has_non_finite(g)) {
        return TestResult::degenerate(name, "non-finite input");
    }

    let combined: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = combined.len() as f64;
    let (ranks, ties) = rank_average(&combined);

    let mut offset = 0;
    let mut weighted = 0.0;
    for group in groups {
        let r: f64 = ranks[offset..offset + group.len()].iter().sum();
        weighted += r * r / group.len() as f64;
        offset += group.len();
    }
    let h_raw = 12.0 / (n * (n + 1.0)) * weighted - 3.0 * (n + 1.0);

    let tie_sum: f64 = ties
        .iter()
        .map(|&c| {
            let c = c as f64;
            c * c * c - c
        })
        .sum();
    let correction = 1.0 - tie_sum / (n * n * n - n);
    if correction <= 0.0 {
        return TestResult::degenerate(name, "all values are identical");
    }
    let h = (h_raw / correction).max(0.0);

    let df = (groups.len() - 1) as f64;
    let p = match ChiSquared::new(df) {
        Ok(dist) => dist.sf(h),
        Err(e) => return TestResult::degenerate(name, format!("chi-squared({df}): {e}")),
    };

    TestResult {
        name: name.to_string(),
        p_value: Some(p),
        statistic: h,
        details: format!("groups={}, N={}, df={df}", groups.len(), combined.len()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. MULTIPLE TESTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Benjamini-Hochberg adjusted p-values, returned in input order.
///
/// Step-up procedure: `q_(k) = min_{j >= k} p_(j) * m / j`, capped at 1.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    if pvalues.is_empty() {
        return Vec::new();
    }
    let m = pvalues.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&i, &j| cmp_f64(&pvalues[i], &pvalues[j]).then(i.cmp(&j)));

    let mut q = vec![1.0; m];
    let mut prev = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let rank = rank0 + 1;
        let adj = (pvalues[idx] * m as f64 / rank as f64).min(1.0);
        prev = prev.min(adj);
        q[idx] = prev;
    }
    q
}
