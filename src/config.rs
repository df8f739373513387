//! Tunable tables for the selection and analysis pipelines
//!
//! Both configs carry the study's fixed values as defaults and can be
//! overridden from a TOML file passed with `--config`. Fields missing from the
//! file keep their defaults.

use crate::error::StudyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Public F-Droid index (v2 format)
pub const DEFAULT_INDEX_URL: &str = "https://f-droid.org/repo/index-v2.json";

/// Configuration for app selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Where the catalog index is downloaded from when the local copy is missing
    pub index_url: String,

    /// Maximum years since the last update before an app counts as unmaintained
    pub max_age_years: u32,

    /// Lowest accepted `minSdkVersion` / `targetSdkVersion`
    pub min_sdk: u32,

    /// Highest accepted `minSdkVersion` / `targetSdkVersion`
    pub max_sdk: u32,

    /// Categories never sampled from.
    ///
    /// Games commonly ship engines (e.g. Unity) that static and dynamic
    /// analysis tools cannot see into.
    pub excluded_categories: Vec<String>,

    /// Package id → reason the app was excluded by hand
    pub manual_exclusions: BTreeMap<String, String>,

    /// One seed per category slot, consumed in category order
    pub seeds: Vec<u64>,

    /// Packages always selected because a previous publication used them
    pub manual_selection: Vec<String>,
}

fn default_manual_exclusions() -> BTreeMap<String, String> {
    [
        (
            "com.androidfromfrankfurt.workingtimealert",
            "App will not install on the Android emulator.",
        ),
        (
            "click.dummer.yidkey",
            "Keyboard app not suitable for interface tests, no isolation.",
        ),
        (
            "org.retroshare.android.qml_app",
            "App will not install on the Android emulator.",
        ),
        (
            "pl.net.szafraniec.NFCTagmaker",
            "App launch fails on the Android emulator.",
        ),
        (
            "com.diblui.fullcolemak",
            "App would not install on the Android emulator.",
        ),
        (
            "de.cketti.dashclock.k9",
            "Not a standard app, appears to be an extension of some sort.",
        ),
        ("se.manyver", "App would not install on the Android emulator."),
        (
            "de.devmil.muzei.bingimageofthedayartsource",
            "Extension app not suitable for interface tests.",
        ),
        (
            "info.tangential.cone",
            "App would not install on the Android emulator.",
        ),
        (
            "org.weilbach.splitbills",
            "App can't be instrumented. Code is obfuscated.",
        ),
        (
            "io.lbry.browser",
            "App would not install on the Android emulator.",
        ),
        (
            "org.bitbucket.watashi564.combapp",
            "App can't be instrumented. Code is obfuscated.",
        ),
        (
            "org.dash.electrum.electrum_dash",
            "App would not install on the Android emulator.",
        ),
        (
            "com.mmazzarolo.breathly",
            "App can't be instrumented. Code is obfuscated.",
        ),
    ]
    .into_iter()
    .map(|(package, note)| (package.to_string(), note.to_string()))
    .collect()
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            max_age_years: 10,
            min_sdk: 16,
            max_sdk: 29,
            excluded_categories: vec!["Games".to_string()],
            manual_exclusions: default_manual_exclusions(),
            seeds: vec![29, 147, 5, 86, 24, 61, 55, 44, 88, 32, 27, 1, 121, 14, 31, 17],
            manual_selection: vec![
                "com.lako.moclock".to_string(),
                "com.punksta.apps.volumecontrol".to_string(),
            ],
        }
    }
}

impl SelectionConfig {
    /// Load from a TOML file, falling back to defaults for missing fields
    pub fn from_file(path: &Path) -> Result<Self, StudyError> {
        load_toml(path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.min_sdk > self.max_sdk {
            return Err(format!(
                "min_sdk ({}) must not exceed max_sdk ({})",
                self.min_sdk, self.max_sdk
            ));
        }

        if self.seeds.is_empty() {
            return Err("seeds must contain at least one value".to_string());
        }

        Ok(())
    }
}

/// Configuration for results analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Approach every baseline is compared against
    pub reference_approach: String,

    /// Approaches compared against the reference (in table column order)
    pub baseline_approaches: Vec<String>,

    /// Baselines shown in the runtime table
    pub runtime_baselines: Vec<String>,

    /// Preparation stages whose runtime is added to the reference runtime
    pub reference_stages: Vec<String>,

    /// Approaches that store one measurement directly under their directory
    pub single_run_approaches: Vec<String>,

    /// Number of `test_N` runs expected for multi-run approaches
    pub expected_runs: usize,

    /// How often the reference sample is repeated before the U test
    pub reference_replication: usize,

    /// Mann-Whitney significance level
    pub significance_level: f64,

    /// Bundle path → package prefixes counted instead of the bundle itself
    /// (apps whose package was renamed between versions)
    pub package_aliases: BTreeMap<String, Vec<String>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let package_aliases = [
            (
                "com/punksta/apps/volumecontrol",
                vec!["com/punksta/apps", "com/example/punksta/volumecontrol"],
            ),
            ("com/asdoi/timetable", vec!["com/ulan/timetable"]),
        ]
        .into_iter()
        .map(|(bundle, prefixes)| {
            (
                bundle.to_string(),
                prefixes.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        Self {
            reference_approach: "padraig".to_string(),
            baseline_approaches: ["monkey", "monkey-click", "s-smog", "stoat"]
                .map(String::from)
                .to_vec(),
            runtime_baselines: ["s-smog", "stoat"].map(String::from).to_vec(),
            reference_stages: ["traversal", "model"].map(String::from).to_vec(),
            single_run_approaches: ["traversal", "model", "padraig"]
                .map(String::from)
                .to_vec(),
            expected_runs: 10,
            reference_replication: 10,
            significance_level: 0.05,
            package_aliases,
        }
    }
}

impl AnalysisConfig {
    /// Load from a TOML file, falling back to defaults for missing fields
    pub fn from_file(path: &Path) -> Result<Self, StudyError> {
        load_toml(path)
    }

    /// Whether `approach` stores a single measurement (no `test_N` directories)
    pub fn is_single_run(&self, approach: &str) -> bool {
        self.single_run_approaches.iter().any(|a| a == approach)
    }

    /// Reference followed by baselines, the column order of every table
    pub fn coverage_approaches(&self) -> Vec<&str> {
        std::iter::once(self.reference_approach.as_str())
            .chain(self.baseline_approaches.iter().map(String::as_str))
            .collect()
    }

    /// Reference followed by the runtime baselines
    pub fn runtime_approaches(&self) -> Vec<&str> {
        std::iter::once(self.reference_approach.as_str())
            .chain(self.runtime_baselines.iter().map(String::as_str))
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.significance_level) {
            return Err(format!(
                "significance_level must be in [0, 1], got {}",
                self.significance_level
            ));
        }

        if self.reference_replication == 0 {
            return Err("reference_replication must be >= 1".to_string());
        }

        if self.baseline_approaches.contains(&self.reference_approach) {
            return Err(format!(
                "reference approach '{}' is also listed as a baseline",
                self.reference_approach
            ));
        }

        Ok(())
    }
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StudyError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| StudyError::InvalidConfig(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selection_config() {
        let config = SelectionConfig::default();
        assert_eq!(config.max_age_years, 10);
        assert_eq!(config.min_sdk, 16);
        assert_eq!(config.max_sdk, 29);
        assert_eq!(config.excluded_categories, vec!["Games".to_string()]);
        assert_eq!(config.seeds.len(), 16);
        assert_eq!(config.seeds[0], 29);
        assert_eq!(config.manual_exclusions.len(), 14);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_analysis_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.reference_approach, "padraig");
        assert_eq!(config.expected_runs, 10);
        assert_eq!(config.significance_level, 0.05);
        assert!(config.is_single_run("traversal"));
        assert!(config.is_single_run("model"));
        assert!(!config.is_single_run("monkey"));
        assert_eq!(
            config.coverage_approaches(),
            vec!["padraig", "monkey", "monkey-click", "s-smog", "stoat"]
        );
        assert_eq!(config.runtime_approaches(), vec!["padraig", "s-smog", "stoat"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SelectionConfig = toml::from_str("max_age_years = 3\n").unwrap();
        assert_eq!(config.max_age_years, 3);
        assert_eq!(config.max_sdk, 29);
        assert_eq!(config.seeds.len(), 16);
    }

    #[test]
    fn test_analysis_toml_aliases() {
        let toml = r#"
reference_approach = "ours"
baseline_approaches = ["monkey"]

[package_aliases]
"org/example/app" = ["org/example/legacy"]
"#;
        let config: AnalysisConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.reference_approach, "ours");
        assert_eq!(config.package_aliases.len(), 1);
        assert_eq!(config.expected_runs, 10);
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_sdk_range() {
        let mut config = SelectionConfig::default();
        config.min_sdk = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_invalid_significance_level() {
        let mut config = AnalysisConfig::default();
        config.significance_level = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(clippy::field_reassign_with_default)]
    fn test_reference_listed_as_baseline() {
        let mut config = AnalysisConfig::default();
        config.baseline_approaches.push("padraig".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_reports_bad_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("study.toml");
        std::fs::write(&path, "max_sdk = \"high\"").unwrap();
        let err = SelectionConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, StudyError::InvalidConfig(_)));
    }
}
