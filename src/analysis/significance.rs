//! Mann-Whitney U test and Vargha-Delaney A12 effect size
//!
//! Each baseline is compared against the reference approach. The reference
//! usually has a single run, so its sample is replicated before testing to
//! match the baselines' run count. A non-significant U test yields `SAME`;
//! otherwise the A12 statistic is bucketed into a direction and magnitude.
//! A12 values outside every bucket are reported as unclassified, never folded
//! into a neighbouring label.

use crate::analysis::stats::CoverageRow;
use crate::config::AnalysisConfig;
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

/// Exact U distribution is used when either sample has at most this many values
pub const EXACT_LIMIT: usize = 8;

/// Result of a two-sided Mann-Whitney U test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannWhitney {
    /// U statistic of the first sample
    pub statistic: f64,
    /// Two-sided p-value
    pub pvalue: f64,
    /// Whether the exact distribution (rather than the normal
    /// approximation) produced the p-value
    pub exact: bool,
}

/// Average ranks (1-based), ties share the mean of their positions
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = rank;
        }
        start = end + 1;
    }
    ranks
}

/// Sizes of every group of tied values
fn tie_groups(values: &[f64]) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut groups = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        groups.push(end - start);
        start = end;
    }
    groups
}

/// Frequencies of every U value for sample sizes `n1`, `n2` without ties
fn exact_u_frequencies(n1: usize, n2: usize) -> Vec<f64> {
    // table[i][j][u]: arrangements of i and j values giving U = u
    let mut table: Vec<Vec<Vec<f64>>> = vec![vec![Vec::new(); n2 + 1]; n1 + 1];
    for i in 0..=n1 {
        for j in 0..=n2 {
            table[i][j] = if i == 0 || j == 0 {
                vec![1.0]
            } else {
                let mut frequencies = vec![0.0; i * j + 1];
                for (u, count) in table[i - 1][j].iter().enumerate() {
                    frequencies[u + j] += count;
                }
                for (u, count) in table[i][j - 1].iter().enumerate() {
                    frequencies[u] += count;
                }
                frequencies
            };
        }
    }
    std::mem::take(&mut table[n1][n2])
}

/// Two-sided Mann-Whitney U test of `x` against `y`.
///
/// Uses the exact distribution when either sample has at most
/// [`EXACT_LIMIT`] values and there are no ties, otherwise the normal approximation
/// with tie correction and continuity correction. Returns `None` when either
/// sample is empty.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Option<MannWhitney> {
    if x.is_empty() || y.is_empty() {
        return None;
    }

    let n1 = x.len();
    let n2 = y.len();
    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let ranks = rank_average(&combined);
    let rank_sum_x: f64 = ranks[..n1].iter().sum();
    let u1 = rank_sum_x - (n1 * (n1 + 1)) as f64 / 2.0;
    let u2 = (n1 * n2) as f64 - u1;
    let u = u1.max(u2);

    let ties = tie_groups(&combined);
    let has_ties = ties.iter().any(|&t| t > 1);

    if (n1 <= EXACT_LIMIT || n2 <= EXACT_LIMIT) && !has_ties {
        let frequencies = exact_u_frequencies(n1, n2);
        let total: f64 = frequencies.iter().sum();
        let threshold = u.round() as usize;
        let upper: f64 = frequencies.iter().skip(threshold).sum();
        return Some(MannWhitney {
            statistic: u1,
            pvalue: (2.0 * upper / total).min(1.0),
            exact: true,
        });
    }

    let n = (n1 + n2) as f64;
    let mu = (n1 * n2) as f64 / 2.0;
    let tie_term: f64 = ties.iter().map(|&t| (t * t * t - t) as f64).sum();
    let variance = (n1 * n2) as f64 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));

    let pvalue = if variance > 0.0 {
        let z = (u - mu - 0.5) / variance.sqrt();
        let normal = Normal::standard();
        (2.0 * normal.sf(z)).clamp(0.0, 1.0)
    } else {
        // Every value tied: the samples are indistinguishable
        1.0
    };

    Some(MannWhitney {
        statistic: u1,
        pvalue,
        exact: false,
    })
}

/// Vargha-Delaney A12: probability that a value from `treatment` exceeds one
/// from `control` (ties count half). `None` when either sample is empty.
pub fn vargha_delaney_a12(treatment: &[f64], control: &[f64]) -> Option<f64> {
    if treatment.is_empty() || control.is_empty() {
        return None;
    }

    let m = treatment.len() as f64;
    let n = control.len() as f64;
    let combined: Vec<f64> = treatment.iter().chain(control).copied().collect();
    let ranks = rank_average(&combined);
    let rank_sum: f64 = ranks[..treatment.len()].iter().sum();
    Some((2.0 * rank_sum - m * (m + 1.0)) / (2.0 * n * m))
}

/// Which side the reference lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Better,
    Worse,
}

/// Effect size magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

/// Outcome of comparing the reference approach to one baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// U test not significant
    Same,
    /// Significant difference with its A12 bucket
    Effect {
        direction: Direction,
        magnitude: Magnitude,
    },
    /// Significant, but A12 falls in no bucket (exactly 0.5, NaN, no data)
    Unclassified,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Same => write!(f, "SAME"),
            Verdict::Unclassified => write!(f, "SAME (A12)"),
            Verdict::Effect {
                direction,
                magnitude,
            } => {
                let direction = match direction {
                    Direction::Better => "BETTER",
                    Direction::Worse => "WORSE",
                };
                let magnitude = match magnitude {
                    Magnitude::Negligible => "NEGLIGIBLE",
                    Magnitude::Small => "SMALL",
                    Magnitude::Medium => "MEDIUM",
                    Magnitude::Large => "LARGE",
                };
                write!(f, "{} {}", direction, magnitude)
            }
        }
    }
}

/// Bucket an A12 value. Upper bounds are exclusive above 0.5 and lower
/// bounds are exclusive below it.
pub fn classify_a12(a12: f64) -> Verdict {
    use Direction::{Better, Worse};
    use Magnitude::{Large, Medium, Negligible, Small};

    let effect = |direction, magnitude| Verdict::Effect {
        direction,
        magnitude,
    };

    if 0.5 < a12 && a12 < 0.556 {
        effect(Better, Negligible)
    } else if (0.556..0.638).contains(&a12) {
        effect(Better, Small)
    } else if (0.638..0.714).contains(&a12) {
        effect(Better, Medium)
    } else if 0.714 <= a12 {
        effect(Better, Large)
    } else if 0.444 < a12 && a12 < 0.5 {
        effect(Worse, Negligible)
    } else if 0.362 < a12 && a12 <= 0.444 {
        effect(Worse, Small)
    } else if 0.286 < a12 && a12 <= 0.362 {
        effect(Worse, Medium)
    } else if a12 <= 0.286 {
        effect(Worse, Large)
    } else {
        Verdict::Unclassified
    }
}

/// Combine a p-value and an A12 value into a verdict.
///
/// Only `p > alpha` counts as non-significant, so a NaN p-value falls
/// through to the A12 buckets.
pub fn classify(pvalue: f64, a12: f64, alpha: f64) -> Verdict {
    if pvalue > alpha {
        Verdict::Same
    } else {
        classify_a12(a12)
    }
}

/// Full comparison of the reference sample against one baseline sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub test: Option<MannWhitney>,
    pub a12: Option<f64>,
    pub verdict: Verdict,
}

/// Compare `baseline` to `reference` replicated `replication` times
pub fn compare(reference: &[f64], baseline: &[f64], replication: usize, alpha: f64) -> Comparison {
    let replicated: Vec<f64> = std::iter::repeat(reference)
        .take(replication)
        .flatten()
        .copied()
        .collect();

    let Some(test) = mann_whitney_u(baseline, &replicated) else {
        return Comparison {
            test: None,
            a12: None,
            verdict: Verdict::Unclassified,
        };
    };

    if test.pvalue > alpha {
        return Comparison {
            test: Some(test),
            a12: None,
            verdict: Verdict::Same,
        };
    }

    let a12 = vargha_delaney_a12(&replicated, baseline);
    Comparison {
        test: Some(test),
        a12,
        verdict: a12.map_or(Verdict::Unclassified, |a| classify(test.pvalue, a, alpha)),
    }
}

/// One line of the comparison output
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub app: String,
    pub approach: String,
    pub comparison: Comparison,
}

/// Compare every baseline to the reference, per app in first-seen order
pub fn compare_summary(rows: &[CoverageRow], config: &AnalysisConfig) -> Vec<ComparisonRow> {
    let mut apps: Vec<&str> = Vec::new();
    for row in rows {
        if !apps.contains(&row.app.as_str()) {
            apps.push(&row.app);
        }
    }

    let sample = |app: &str, approach: &str| -> Vec<f64> {
        rows.iter()
            .filter(|row| row.app == app && row.approach == approach)
            .map(|row| row.coverage)
            .collect()
    };

    let mut results = Vec::new();
    for app in apps {
        let reference = sample(app, &config.reference_approach);
        for approach in &config.baseline_approaches {
            let baseline = sample(app, approach);
            let comparison = compare(
                &reference,
                &baseline,
                config.reference_replication,
                config.significance_level,
            );
            if comparison.test.is_none() {
                tracing::warn!(
                    "Cannot compare {} with {} for {}: missing coverage sample",
                    config.reference_approach,
                    approach,
                    app
                );
            }
            results.push(ComparisonRow {
                app: app.to_string(),
                approach: approach.clone(),
                comparison,
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rank_average_with_ties() {
        assert_eq!(
            rank_average(&[10.0, 20.0, 10.0, 30.0]),
            vec![1.5, 3.0, 1.5, 4.0]
        );
    }

    #[test]
    fn test_exact_frequencies_sum_to_binomial() {
        let frequencies = exact_u_frequencies(3, 4);
        assert_eq!(frequencies.len(), 13);
        assert_eq!(frequencies.iter().sum::<f64>(), 35.0);
        // Symmetric around n1 * n2 / 2
        assert_eq!(frequencies[0], frequencies[12]);
        assert_eq!(frequencies[2], frequencies[10]);
    }

    #[test]
    fn test_mann_whitney_exact_complete_separation() {
        let test = mann_whitney_u(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap();
        assert!(test.exact);
        assert_eq!(test.statistic, 0.0);
        // Two of the 20 arrangements are at least this extreme
        assert_relative_eq!(test.pvalue, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_mann_whitney_exact_when_one_side_is_small() {
        let baseline: Vec<f64> = (1..=10).map(f64::from).collect();
        let test = mann_whitney_u(&[100.0], &baseline).unwrap();
        assert!(test.exact);
        assert_eq!(test.statistic, 10.0);
        // One of 11 equally likely positions is this extreme on each side
        assert_relative_eq!(test.pvalue, 2.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mann_whitney_asymptotic_when_both_large() {
        let x: Vec<f64> = (1..=9).map(f64::from).collect();
        let y: Vec<f64> = (10..=18).map(f64::from).collect();
        let test = mann_whitney_u(&x, &y).unwrap();
        assert!(!test.exact);
    }

    #[test]
    fn test_mann_whitney_asymptotic_with_ties() {
        let baseline = [10.0, 11.0, 12.0, 10.5, 11.5, 12.5, 10.0, 11.0, 12.0, 10.5];
        let reference = [30.0; 10];
        let test = mann_whitney_u(&baseline, &reference).unwrap();
        assert!(!test.exact);
        assert_eq!(test.statistic, 0.0);
        assert!(test.pvalue < 0.001, "p-value {} should be tiny", test.pvalue);
    }

    #[test]
    fn test_mann_whitney_all_tied() {
        let test = mann_whitney_u(&[5.0; 10], &[5.0; 10]).unwrap();
        assert_eq!(test.pvalue, 1.0);
    }

    #[test]
    fn test_mann_whitney_empty() {
        assert!(mann_whitney_u(&[], &[1.0]).is_none());
    }

    #[test]
    fn test_a12_bounds() {
        assert_eq!(vargha_delaney_a12(&[5.0, 6.0], &[1.0, 2.0]), Some(1.0));
        assert_eq!(vargha_delaney_a12(&[1.0, 2.0], &[5.0, 6.0]), Some(0.0));
        assert_eq!(vargha_delaney_a12(&[3.0, 3.0], &[3.0, 3.0]), Some(0.5));
        assert_eq!(vargha_delaney_a12(&[], &[1.0]), None);
    }

    #[test]
    fn test_classify_not_significant_is_same() {
        assert_eq!(classify(0.10, 0.99, 0.05), Verdict::Same);
        assert_eq!(classify(0.10, 0.01, 0.05), Verdict::Same);
    }

    #[test]
    fn test_classify_better_large() {
        let verdict = classify(0.01, 0.72, 0.05);
        assert_eq!(verdict.to_string(), "BETTER LARGE");
    }

    #[test]
    fn test_classify_worse_medium() {
        let verdict = classify(0.01, 0.30, 0.05);
        assert_eq!(verdict.to_string(), "WORSE MEDIUM");
    }

    #[test]
    fn test_classify_bucket_edges() {
        assert_eq!(classify_a12(0.556).to_string(), "BETTER SMALL");
        assert_eq!(classify_a12(0.638).to_string(), "BETTER MEDIUM");
        assert_eq!(classify_a12(0.714).to_string(), "BETTER LARGE");
        assert_eq!(classify_a12(0.444).to_string(), "WORSE SMALL");
        assert_eq!(classify_a12(0.362).to_string(), "WORSE MEDIUM");
        assert_eq!(classify_a12(0.286).to_string(), "WORSE LARGE");
        assert_eq!(classify_a12(0.52).to_string(), "BETTER NEGLIGIBLE");
        assert_eq!(classify_a12(0.47).to_string(), "WORSE NEGLIGIBLE");
    }

    #[test]
    fn test_classify_degenerate_values() {
        assert_eq!(classify_a12(0.5), Verdict::Unclassified);
        assert_eq!(classify_a12(f64::NAN), Verdict::Unclassified);
        assert_eq!(Verdict::Unclassified.to_string(), "SAME (A12)");
    }

    #[test]
    fn test_classify_nan_pvalue_uses_a12() {
        assert_eq!(classify(f64::NAN, 0.9, 0.05).to_string(), "BETTER LARGE");
    }

    #[test]
    fn test_compare_reference_dominates() {
        let baseline = [20.0, 21.0, 22.0, 20.5, 21.5, 22.5, 20.0, 21.0, 22.0, 20.5];
        let comparison = compare(&[40.0], &baseline, 10, 0.05);
        assert_eq!(comparison.a12, Some(1.0));
        assert_eq!(comparison.verdict.to_string(), "BETTER LARGE");
    }

    #[test]
    fn test_compare_identical_samples_is_same() {
        let comparison = compare(&[30.0], &[30.0; 10], 10, 0.05);
        assert_eq!(comparison.verdict, Verdict::Same);
    }

    #[test]
    fn test_compare_missing_reference_is_unclassified() {
        let comparison = compare(&[], &[30.0; 10], 10, 0.05);
        assert_eq!(comparison.verdict, Verdict::Unclassified);
        assert!(comparison.test.is_none());
    }

    #[test]
    fn test_compare_summary_orders_by_app_then_baseline() {
        let mut rows = Vec::new();
        for app in ["Zeta", "Alpha"] {
            rows.push(CoverageRow::new(app, "padraig", 50.0));
            for approach in ["monkey", "monkey-click", "s-smog", "stoat"] {
                for run in 0..10 {
                    rows.push(CoverageRow::new(app, approach, 10.0 + run as f64));
                }
            }
        }

        let results = compare_summary(&rows, &AnalysisConfig::default());
        assert_eq!(results.len(), 8);
        assert_eq!(results[0].app, "Zeta");
        assert_eq!(results[0].approach, "monkey");
        assert_eq!(results[4].app, "Alpha");
        assert!(results
            .iter()
            .all(|row| row.comparison.verdict.to_string() == "BETTER LARGE"));
    }
}
