//! Exclusion rules applied to every catalog entry
//!
//! Rules are checked in a fixed order and the first match wins:
//! manual list → excluded category → age → source availability → SDK range.

use crate::config::SelectionConfig;
use crate::selection::catalog::CatalogEntry;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why an entry was left out of the study
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Listed in the manual exclusion table, with its note
    Manual(String),
    /// Declares at least one excluded category
    Category,
    /// Not updated within the maximum age
    TooOld,
    /// Selected version has no source archive
    NoSource,
    /// SDK bounds undeclared or outside the accepted range
    UnsupportedSdk(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Manual(note) => write!(f, "{}", note),
            ExclusionReason::Category => write!(f, "App category does not meet requirements."),
            ExclusionReason::TooOld => write!(f, "App is not maintained, too old."),
            ExclusionReason::NoSource => write!(f, "App does not provide source code."),
            ExclusionReason::UnsupportedSdk(detail) => write!(f, "{}", detail),
        }
    }
}

/// Result of running the rules over one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Kept,
    Excluded(ExclusionReason),
}

impl FilterOutcome {
    pub fn is_kept(&self) -> bool {
        matches!(self, FilterOutcome::Kept)
    }
}

/// Per-rule tallies for one filtering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    pub manual: usize,
    pub category: usize,
    pub age: usize,
    pub source: usize,
    pub sdk: usize,
    pub kept: usize,
}

impl FilterCounts {
    pub fn record(&mut self, outcome: &FilterOutcome) {
        match outcome {
            FilterOutcome::Kept => self.kept += 1,
            FilterOutcome::Excluded(ExclusionReason::Manual(_)) => self.manual += 1,
            FilterOutcome::Excluded(ExclusionReason::Category) => self.category += 1,
            FilterOutcome::Excluded(ExclusionReason::TooOld) => self.age += 1,
            FilterOutcome::Excluded(ExclusionReason::NoSource) => self.source += 1,
            FilterOutcome::Excluded(ExclusionReason::UnsupportedSdk(_)) => self.sdk += 1,
        }
    }

    pub fn excluded(&self) -> usize {
        self.manual + self.category + self.age + self.source + self.sdk
    }

    /// Log the tallies the way the selection run reports them
    pub fn log_summary(&self) {
        tracing::info!("Filtered {} packages manually.", self.manual);
        tracing::info!("Filtered {} packages with category filter.", self.category);
        tracing::info!("Filtered {} packages above max age.", self.age);
        tracing::info!("Filtered {} packages with no source code.", self.source);
        tracing::info!("Filtered {} packages with unsuitable SDK version.", self.sdk);
        tracing::info!("{} packages remain after filtering.", self.kept);
    }
}

/// Applies the exclusion rules against a fixed "now"
#[derive(Debug, Clone)]
pub struct AppFilter {
    max_age_years: u32,
    min_sdk: u32,
    max_sdk: u32,
    manual_exclusions: BTreeMap<String, String>,
    excluded_categories: BTreeSet<String>,
    now: DateTime<Utc>,
}

impl AppFilter {
    pub fn new(config: &SelectionConfig, now: DateTime<Utc>) -> Self {
        Self {
            max_age_years: config.max_age_years,
            min_sdk: config.min_sdk,
            max_sdk: config.max_sdk,
            manual_exclusions: config.manual_exclusions.clone(),
            excluded_categories: config.excluded_categories.iter().cloned().collect(),
            now,
        }
    }

    /// Whether a category name is excluded outright
    pub fn is_excluded_category(&self, category: &str) -> bool {
        self.excluded_categories.contains(category)
    }

    /// Years since `last_updated` (epoch millis), counted in whole days / 365
    fn age_in_years(&self, last_updated: i64) -> Option<f64> {
        let updated = DateTime::<Utc>::from_timestamp_millis(last_updated)?;
        Some((self.now - updated).num_days() as f64 / 365.0)
    }

    fn in_sdk_range(&self, value: u32) -> bool {
        (self.min_sdk..=self.max_sdk).contains(&value)
    }

    /// Run the rules over one entry
    pub fn evaluate(&self, entry: &CatalogEntry) -> FilterOutcome {
        if let Some(note) = self.manual_exclusions.get(&entry.package) {
            return FilterOutcome::Excluded(ExclusionReason::Manual(note.clone()));
        }

        if entry
            .categories
            .iter()
            .any(|category| self.is_excluded_category(category))
        {
            return FilterOutcome::Excluded(ExclusionReason::Category);
        }

        let too_old = match entry.last_updated.and_then(|ts| self.age_in_years(ts)) {
            Some(years) => years > f64::from(self.max_age_years),
            None => true,
        };
        if too_old {
            return FilterOutcome::Excluded(ExclusionReason::TooOld);
        }

        let Some(version) = entry.version.as_ref().filter(|v| v.src.is_some()) else {
            return FilterOutcome::Excluded(ExclusionReason::NoSource);
        };

        let Some(uses_sdk) = version.manifest.uses_sdk else {
            return FilterOutcome::Excluded(ExclusionReason::UnsupportedSdk(
                "App does not declare SDK version.".to_string(),
            ));
        };

        match (uses_sdk.min_sdk_version, uses_sdk.target_sdk_version) {
            (Some(min), Some(target)) if self.in_sdk_range(min) && self.in_sdk_range(target) => {
                FilterOutcome::Kept
            }
            (Some(_), Some(_)) => FilterOutcome::Excluded(ExclusionReason::UnsupportedSdk(format!(
                "App SDK is less than the minimum {} or greater than the maximum {}.",
                self.min_sdk, self.max_sdk
            ))),
            _ => FilterOutcome::Excluded(ExclusionReason::UnsupportedSdk(
                "App does not declare SDK version.".to_string(),
            )),
        }
    }

    /// Filter all entries, returning the kept ones and the per-rule tallies
    pub fn filter_entries(&self, entries: Vec<CatalogEntry>) -> (Vec<CatalogEntry>, FilterCounts) {
        let mut counts = FilterCounts::default();
        let mut kept = Vec::new();

        for entry in entries {
            let outcome = self.evaluate(&entry);
            counts.record(&outcome);
            match outcome {
                FilterOutcome::Kept => kept.push(entry),
                FilterOutcome::Excluded(reason) => {
                    tracing::debug!("Filtering '{}': {}", entry.package, reason);
                }
            }
        }

        (kept, counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::catalog::{FileRef, Manifest, UsesSdk, Version};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn entry(package: &str, categories: &[&str]) -> CatalogEntry {
        let updated = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        CatalogEntry {
            package: package.to_string(),
            name: package.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            last_updated: Some(updated.timestamp_millis()),
            version: Some(Version {
                manifest: Manifest {
                    uses_sdk: Some(UsesSdk {
                        min_sdk_version: Some(21),
                        target_sdk_version: Some(28),
                    }),
                    version_code: Some(1),
                },
                src: Some(FileRef {
                    name: "/src.tar.gz".to_string(),
                }),
                file: Some(FileRef {
                    name: "/app.apk".to_string(),
                }),
                added: Some(updated.timestamp_millis()),
            }),
        }
    }

    fn filter() -> AppFilter {
        AppFilter::new(&SelectionConfig::default(), now())
    }

    #[test]
    fn test_valid_entry_is_kept() {
        assert_eq!(filter().evaluate(&entry("org.example", &["Tools"])), FilterOutcome::Kept);
    }

    #[test]
    fn test_manual_exclusion_wins_over_category() {
        let outcome = filter().evaluate(&entry("se.manyver", &["Games"]));
        assert_eq!(
            outcome,
            FilterOutcome::Excluded(ExclusionReason::Manual(
                "App would not install on the Android emulator.".to_string()
            ))
        );
    }

    #[test]
    fn test_category_exclusion() {
        let outcome = filter().evaluate(&entry("org.example", &["Tools", "Games"]));
        assert_eq!(outcome, FilterOutcome::Excluded(ExclusionReason::Category));
    }

    #[test]
    fn test_too_old() {
        let mut old = entry("org.example", &["Tools"]);
        old.last_updated = Some(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap().timestamp_millis());
        assert_eq!(
            filter().evaluate(&old),
            FilterOutcome::Excluded(ExclusionReason::TooOld)
        );
    }

    #[test]
    fn test_missing_last_updated_is_too_old() {
        let mut undated = entry("org.example", &["Tools"]);
        undated.last_updated = None;
        assert_eq!(
            filter().evaluate(&undated),
            FilterOutcome::Excluded(ExclusionReason::TooOld)
        );
    }

    #[test]
    fn test_no_source() {
        let mut closed = entry("org.example", &["Tools"]);
        closed.version.as_mut().unwrap().src = None;
        assert_eq!(
            filter().evaluate(&closed),
            FilterOutcome::Excluded(ExclusionReason::NoSource)
        );
    }

    #[test]
    fn test_no_versions_is_no_source() {
        let mut bare = entry("org.example", &["Tools"]);
        bare.version = None;
        assert_eq!(
            filter().evaluate(&bare),
            FilterOutcome::Excluded(ExclusionReason::NoSource)
        );
    }

    #[test]
    fn test_undeclared_sdk() {
        let mut undeclared = entry("org.example", &["Tools"]);
        undeclared.version.as_mut().unwrap().manifest.uses_sdk = None;
        assert!(matches!(
            filter().evaluate(&undeclared),
            FilterOutcome::Excluded(ExclusionReason::UnsupportedSdk(_))
        ));
    }

    #[test]
    fn test_target_sdk_above_max() {
        let mut modern = entry("org.example", &["Tools"]);
        modern.version.as_mut().unwrap().manifest.uses_sdk = Some(UsesSdk {
            min_sdk_version: Some(21),
            target_sdk_version: Some(33),
        });
        assert!(matches!(
            filter().evaluate(&modern),
            FilterOutcome::Excluded(ExclusionReason::UnsupportedSdk(_))
        ));
    }

    #[test]
    fn test_sdk_bounds_are_inclusive() {
        let mut edge = entry("org.example", &["Tools"]);
        edge.version.as_mut().unwrap().manifest.uses_sdk = Some(UsesSdk {
            min_sdk_version: Some(16),
            target_sdk_version: Some(29),
        });
        assert!(filter().evaluate(&edge).is_kept());
    }

    #[test]
    fn test_filter_entries_counts() {
        let mut no_source = entry("org.closed", &["Tools"]);
        no_source.version.as_mut().unwrap().src = None;

        let entries = vec![
            entry("org.kept", &["Tools"]),
            entry("se.manyver", &["Internet"]),
            entry("org.game", &["Games"]),
            no_source,
        ];

        let (kept, counts) = filter().filter_entries(entries);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].package, "org.kept");
        assert_eq!(
            counts,
            FilterCounts {
                manual: 1,
                category: 1,
                age: 0,
                source: 1,
                sdk: 0,
                kept: 1,
            }
        );
        assert_eq!(counts.excluded(), 3);
    }
}
