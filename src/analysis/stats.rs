//! Per-approach aggregation (average, minimum, maximum)

use std::ops::Add;

/// Aggregate of one approach's measurements for one app
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ApproachStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl ApproachStats {
    /// All zero, the value reported when no measurement exists
    pub const EMPTY: ApproachStats = ApproachStats {
        average: 0.0,
        min: 0.0,
        max: 0.0,
    };

    /// Aggregate a sample; an empty sample gives [`ApproachStats::EMPTY`]
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::EMPTY;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        // Keep rounding error from pushing the mean outside [min, max]
        Self {
            average: mean.clamp(min, max),
            min,
            max,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Log the aggregate at debug level
    pub fn log(&self, what: &str, location: &str) {
        tracing::debug!("Average {} is {} in {}", what, self.average, location);
        tracing::debug!("Minimum {} is {} in {}", what, self.min, location);
        tracing::debug!("Maximum {} is {} in {}", what, self.max, location);
    }
}

/// Component-wise sum, used to add stage runtimes to the reference runtime
impl Add for ApproachStats {
    type Output = ApproachStats;

    fn add(self, other: ApproachStats) -> ApproachStats {
        ApproachStats {
            average: self.average + other.average,
            min: self.min + other.min,
            max: self.max + other.max,
        }
    }
}

/// One coverage measurement of the summary table
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRow {
    pub app: String,
    pub approach: String,
    pub coverage: f64,
}

impl CoverageRow {
    pub fn new(app: impl Into<String>, approach: impl Into<String>, coverage: f64) -> Self {
        Self {
            app: app.into(),
            approach: approach.into(),
            coverage,
        }
    }
}

/// Plain arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
