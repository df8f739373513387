//! Results analysis pipeline
//!
//! Walks a results tree produced by the experiment harness, aggregates
//! coverage and runtime per app and approach, and writes the tables, charts
//! and significance comparison used in the paper.

mod chart;
mod report;
mod scanner;
mod significance;
mod stats;

pub use chart::{BarChart, ChartError, Plot, ScatterChart, Series, CHART_SIZE};
pub use report::{
    comparison_csv, coverage_summary_csv, float_text, float_text_grouped, latex_table, round2,
    u_test_table, verdict_cell, Emphasis, TableRow,
};
pub use scanner::{
    app_directories, bundle_prefixes, filtered_instruction_totals, run_directories,
    CoverageSource, InstructionTotals, ReportError, ReportParser, ResultScanner, RunDirectory,
    HTML_REPORT, XML_REPORT,
};
pub use significance::{
    classify, classify_a12, compare, compare_summary, mann_whitney_u, rank_average,
    vargha_delaney_a12, Comparison, ComparisonRow, Direction, Magnitude, MannWhitney, Verdict,
};
pub use stats::{mean, ApproachStats, CoverageRow};

use crate::config::AnalysisConfig;
use crate::error::StudyError;
use crate::naming::{app_display_name, title_case};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const LINE_TABLE_FILE: &str = "padraig_line_table.txt";
pub const LINE_PLOT_FILE: &str = "padraig_line_bar_plot";
pub const RUNTIME_TABLE_FILE: &str = "padraig_runtime_table.txt";
pub const RUNTIME_PLOT_FILE: &str = "padraig_runtime_plot";
pub const COVERAGE_SUMMARY_FILE: &str = "coverage_summary.csv";
pub const COMPARISON_FILE: &str = "comparison_results.csv";
pub const U_TEST_TABLE_FILE: &str = "u_test_table.txt";

/// Prefix of the outputs computed from the filtered XML reports
pub const FILTERED_PREFIX: &str = "filtered_";

/// Input and output locations of one analysis run
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub results: PathBuf,
    pub output: PathBuf,
}

/// Per-run values of every approach of one app
#[derive(Debug, Clone, PartialEq)]
pub struct AppResults {
    pub directory: PathBuf,
    pub name: String,
    /// `None` when the approach directory does not exist
    pub samples: Vec<(String, Option<Vec<f64>>)>,
}

impl AppResults {
    pub fn sample(&self, approach: &str) -> Option<&[f64]> {
        self.samples
            .iter()
            .find(|(name, _)| name == approach)
            .and_then(|(_, values)| values.as_deref())
    }

    /// Aggregate of one approach, zero when it has no data
    pub fn stats(&self, approach: &str) -> ApproachStats {
        ApproachStats::from_values(self.sample(approach).unwrap_or_default())
    }

    pub fn has_data(&self) -> bool {
        self.samples
            .iter()
            .any(|(_, values)| values.as_ref().is_some_and(|v| !v.is_empty()))
    }
}

/// What an analysis run produced
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub apps: Vec<String>,
    pub coverage_increase: f64,
    pub filtered_coverage_increase: f64,
    pub runtime_decrease: f64,
    pub comparisons: Vec<ComparisonRow>,
}

/// Measure every approach of every app
pub fn collect_results<F>(
    apps: &[(String, PathBuf)],
    approaches: &[&str],
    what: &str,
    mut measure: F,
) -> Vec<AppResults>
where
    F: FnMut(&Path, &str) -> Vec<f64>,
{
    apps.iter()
        .map(|(directory, path)| {
            tracing::debug!("Searching app directory {}", path.display());
            let samples = approaches
                .iter()
                .map(|&approach| {
                    let approach_dir = path.join(approach);
                    let values = approach_dir.is_dir().then(|| {
                        tracing::debug!("Searching approach directory {}", approach_dir.display());
                        let values = measure(&approach_dir, approach);
                        ApproachStats::from_values(&values)
                            .log(what, &approach_dir.display().to_string());
                        values
                    });
                    (approach.to_string(), values)
                })
                .collect();

            let results = AppResults {
                directory: path.clone(),
                name: app_display_name(directory),
                samples,
            };
            if !results.has_data() {
                tracing::warn!("No {} data found for {}", what, path.display());
            }
            results
        })
        .collect()
}

/// Runtime of `approach`; the reference also pays for its preparation stages
pub fn runtime_stats(app: &AppResults, approach: &str, config: &AnalysisConfig) -> ApproachStats {
    let stats = app.stats(approach);
    if approach != config.reference_approach || app.sample(approach).is_none() {
        return stats;
    }
    config
        .reference_stages
        .iter()
        .fold(stats, |total, stage| total + app.stats(stage))
}

/// Mean of reference minus baseline averages over every app and baseline
pub fn average_difference<F>(apps: &[AppResults], baselines: &[String], reference: &str, mut value: F) -> f64
where
    F: FnMut(&AppResults, &str) -> f64,
{
    let differences: Vec<f64> = apps
        .iter()
        .flat_map(|app| {
            let reference_value = value(app, reference);
            baselines
                .iter()
                .map(|baseline| reference_value - value(app, baseline))
                .collect::<Vec<_>>()
        })
        .collect();
    mean(&differences)
}

/// Coverage summary rows: every measured run, multi-run approaches padded to
/// the expected run count with their last value (0 when none)
pub fn summary_rows(apps: &[AppResults], config: &AnalysisConfig) -> Vec<CoverageRow> {
    let mut rows = Vec::new();
    for app in apps {
        for approach in config.coverage_approaches() {
            let Some(values) = app.sample(approach) else {
                continue;
            };
            for &value in values {
                rows.push(CoverageRow::new(&app.name, approach, value));
            }
            if !config.is_single_run(approach) {
                let last = values.last().copied().unwrap_or(0.0);
                for _ in values.len()..config.expected_runs {
                    rows.push(CoverageRow::new(&app.name, approach, last));
                }
            }
        }
    }
    rows
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Coverage table, bar chart and average increase for one report source
fn coverage_comparison(
    apps: &[AppResults],
    config: &AnalysisConfig,
    output: &Path,
    prefix: &str,
) -> Result<f64> {
    let rows: Vec<TableRow> = apps
        .iter()
        .map(|app| {
            let baselines: Vec<ApproachStats> = config
                .baseline_approaches
                .iter()
                .map(|approach| app.stats(approach))
                .collect();
            TableRow::from_stats(&app.name, &app.stats(&config.reference_approach), &baselines)
        })
        .collect();
    write_output(
        &output.join(format!("{}{}", prefix, LINE_TABLE_FILE)),
        &latex_table(&rows, Emphasis::Max, false),
    )?;

    let chart = BarChart {
        title: "Automated Input Generation Tools Line Coverage".to_string(),
        x_label: "AUT".to_string(),
        y_label: "Coverage (%)".to_string(),
        categories: apps.iter().map(|app| app.name.clone()).collect(),
        series: config
            .coverage_approaches()
            .into_iter()
            .map(|approach| {
                Series::new(
                    title_case(approach),
                    apps.iter().map(|app| app.stats(approach).average).collect(),
                )
            })
            .collect(),
    };
    chart.write_all(&output.join(format!("{}{}", prefix, LINE_PLOT_FILE)))?;

    let increase = average_difference(
        apps,
        &config.baseline_approaches,
        &config.reference_approach,
        |app, approach| app.stats(approach).average,
    );
    tracing::info!("Average increase: {}", increase);
    Ok(increase)
}

/// Runtime table and average decrease
fn runtime_comparison(apps: &[AppResults], config: &AnalysisConfig, output: &Path) -> Result<f64> {
    let rows: Vec<TableRow> = apps
        .iter()
        .map(|app| {
            let baselines: Vec<ApproachStats> = config
                .runtime_baselines
                .iter()
                .map(|approach| runtime_stats(app, approach, config))
                .collect();
            let reference = runtime_stats(app, &config.reference_approach, config);
            TableRow::from_stats(&app.name, &reference, &baselines)
        })
        .collect();
    write_output(
        &output.join(RUNTIME_TABLE_FILE),
        &latex_table(&rows, Emphasis::Min, true),
    )?;

    let decrease = -average_difference(
        apps,
        &config.runtime_baselines,
        &config.reference_approach,
        |app, approach| runtime_stats(app, approach, config).average,
    );
    tracing::info!("Average decrease: {}", decrease);
    Ok(decrease)
}

/// Filtered coverage against runtime, one point per app and approach
fn runtime_scatter(
    coverage: &[AppResults],
    runtimes: &[AppResults],
    config: &AnalysisConfig,
    output: &Path,
) -> Result<()> {
    let chart = ScatterChart {
        title: "Automated Input Generation Tool Runtime".to_string(),
        x_label: "Coverage (%)".to_string(),
        y_label: "Runtime (s)".to_string(),
        series: config
            .coverage_approaches()
            .into_iter()
            .map(|approach| {
                let points = coverage
                    .iter()
                    .zip(runtimes)
                    .map(|(cov, run)| {
                        (
                            cov.stats(approach).average,
                            runtime_stats(run, approach, config).average,
                        )
                    })
                    .collect();
                Series::new(title_case(approach), points)
            })
            .collect(),
    };
    chart.write_all(&output.join(RUNTIME_PLOT_FILE))?;
    Ok(())
}

/// Run the whole analysis pipeline
pub fn run_analysis(options: &AnalyzeOptions, config: &AnalysisConfig) -> Result<AnalysisSummary> {
    if !options.output.is_dir() {
        return Err(StudyError::MissingOutputDirectory(options.output.clone()).into());
    }
    if !options.results.is_dir() {
        return Err(StudyError::MissingResultsDirectory(options.results.clone()).into());
    }
    config.validate().map_err(StudyError::InvalidConfig)?;

    let scanner = ResultScanner::new(config).context("Failed to compile report patterns")?;
    let output = options.output.as_path();

    tracing::debug!("Searching sub-directories of {}", options.results.display());
    let apps = app_directories(&options.results);
    if apps.is_empty() {
        tracing::warn!("No data available to plot.");
        write_output(&output.join(COVERAGE_SUMMARY_FILE), &coverage_summary_csv(&[]))?;
        write_output(&output.join(COMPARISON_FILE), &comparison_csv(&[]))?;
        return Ok(AnalysisSummary {
            apps: Vec::new(),
            coverage_increase: 0.0,
            filtered_coverage_increase: 0.0,
            runtime_decrease: 0.0,
            comparisons: Vec::new(),
        });
    }

    let coverage_columns = config.coverage_approaches();
    let mut runtime_columns = coverage_columns.clone();
    for approach in config
        .runtime_approaches()
        .into_iter()
        .chain(config.reference_stages.iter().map(String::as_str))
    {
        if !runtime_columns.contains(&approach) {
            runtime_columns.push(approach);
        }
    }

    tracing::info!("Plotting coverage data for app comparison.");
    let html = collect_results(&apps, &coverage_columns, "coverage", |dir, approach| {
        scanner.coverage_values(dir, approach, CoverageSource::Html)
    });
    let coverage_increase = coverage_comparison(&html, config, output, "")?;

    tracing::info!("Plotting filtered coverage data for app comparison.");
    let filtered = collect_results(&apps, &coverage_columns, "filtered coverage", |dir, approach| {
        scanner.coverage_values(dir, approach, CoverageSource::FilteredXml)
    });
    let filtered_coverage_increase = coverage_comparison(&filtered, config, output, FILTERED_PREFIX)?;

    tracing::info!("Tabling runtime data for app comparison.");
    let runtimes = collect_results(&apps, &runtime_columns, "runtime", |dir, approach| {
        scanner
            .runtime_values(dir, approach)
            .into_iter()
            .map(|seconds| seconds as f64)
            .collect()
    });
    let runtime_decrease = runtime_comparison(&runtimes, config, output)?;

    tracing::info!("Plotting runtime data for app comparison.");
    runtime_scatter(&filtered, &runtimes, config, output)?;

    tracing::info!("Creating coverage summary CSV file.");
    let rows = summary_rows(&filtered, config);
    write_output(&output.join(COVERAGE_SUMMARY_FILE), &coverage_summary_csv(&rows))?;

    tracing::info!("Running Mann-Whitney U Test");
    let comparisons = compare_summary(&rows, config);
    write_output(&output.join(COMPARISON_FILE), &comparison_csv(&comparisons))?;

    tracing::info!("Creating statistical analysis table.");
    if comparisons.is_empty() {
        tracing::warn!("No table data available.");
    }
    write_output(
        &output.join(U_TEST_TABLE_FILE),
        &u_test_table(&comparisons, &config.baseline_approaches),
    )?;

    Ok(AnalysisSummary {
        apps: html.into_iter().map(|app| app.name).collect(),
        coverage_increase,
        filtered_coverage_increase,
        runtime_decrease,
        comparisons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(samples: &[(&str, Option<Vec<f64>>)]) -> AppResults {
        AppResults {
            directory: PathBuf::from("results/clock_1"),
            name: "Clock".to_string(),
            samples: samples
                .iter()
                .map(|(approach, values)| (approach.to_string(), values.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_missing_approach_is_empty_stats() {
        let results = app(&[("padraig", None), ("monkey", Some(Vec::new()))]);
        assert!(results.stats("padraig").is_empty());
        assert!(results.stats("monkey").is_empty());
        assert!(results.stats("stoat").is_empty());
        assert!(!results.has_data());
    }

    #[test]
    fn test_reference_runtime_includes_stages() {
        let config = AnalysisConfig::default();
        let results = app(&[
            ("padraig", Some(vec![100.0])),
            ("traversal", Some(vec![20.0])),
            ("model", None),
            ("stoat", Some(vec![500.0, 700.0])),
        ]);
        assert_eq!(runtime_stats(&results, "padraig", &config).average, 120.0);
        assert_eq!(runtime_stats(&results, "stoat", &config).average, 600.0);
    }

    #[test]
    fn test_stages_ignored_without_reference() {
        let config = AnalysisConfig::default();
        let results = app(&[("padraig", None), ("traversal", Some(vec![20.0]))]);
        assert!(runtime_stats(&results, "padraig", &config).is_empty());
    }

    #[test]
    fn test_summary_rows_pad_multi_run() {
        let config = AnalysisConfig::default();
        let results = app(&[
            ("padraig", Some(vec![50.0])),
            ("monkey", Some(vec![10.0, 12.0])),
            ("monkey-click", Some(Vec::new())),
            ("s-smog", None),
        ]);
        let rows = summary_rows(&[results], &config);

        let count = |approach: &str| rows.iter().filter(|r| r.approach == approach).count();
        assert_eq!(count("padraig"), 1);
        assert_eq!(count("monkey"), 10);
        assert_eq!(count("monkey-click"), 10);
        assert_eq!(count("s-smog"), 0);

        let monkey: Vec<f64> = rows
            .iter()
            .filter(|r| r.approach == "monkey")
            .map(|r| r.coverage)
            .collect();
        assert_eq!(&monkey[..3], &[10.0, 12.0, 12.0]);
        assert!(rows
            .iter()
            .filter(|r| r.approach == "monkey-click")
            .all(|r| r.coverage == 0.0));
    }

    #[test]
    fn test_average_difference() {
        let results = app(&[
            ("padraig", Some(vec![50.0])),
            ("monkey", Some(vec![30.0])),
            ("stoat", Some(vec![10.0])),
        ]);
        let baselines = vec!["monkey".to_string(), "stoat".to_string()];
        let difference = average_difference(&[results], &baselines, "padraig", |app, approach| {
            app.stats(approach).average
        });
        assert_eq!(difference, 30.0);
    }
}
