//! Extraction of coverage and runtime measurements from a results tree
//!
//! Layout: `<results>/<app>_<id>/<approach>/[test_<n>/]report_<n>/{index.html |
//! acvtool-report.xml}` with a `cmd.log` (single run) or `test_<n>/cmd_<n>.log`
//! (multi run) next to the reports. Anything missing or malformed is logged
//! and contributes no value.

use crate::config::AnalysisConfig;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// HTML coverage report name inside `report_<n>/`
pub const HTML_REPORT: &str = "index.html";

/// Instrumentation coverage report name inside `report_<n>/`
pub const XML_REPORT: &str = "acvtool-report.xml";

/// Errors while reading a single report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed report: {0}")]
    Malformed(String),
}

/// Which coverage report to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageSource {
    /// Overall line coverage from the HTML report footer
    Html,
    /// Instruction coverage restricted to the app's own packages
    FilteredXml,
}

/// Summed INSTRUCTION counters of the matching classes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstructionTotals {
    pub covered: u64,
    pub missed: u64,
}

impl InstructionTotals {
    /// Coverage percentage, `None` when no instruction was counted
    pub fn percentage(&self) -> Option<f64> {
        let total = self.covered as f64 + self.missed as f64;
        (total > 0.0).then(|| self.covered as f64 / total * 100.0)
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, ReportError> {
    match element.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Package prefixes (slash separated) counted for a report's bundle id
pub fn bundle_prefixes(bundle_name: &str, aliases: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let replaced = bundle_name.replace('.', "/");
    let without_debug = replaced.strip_suffix("/debug").unwrap_or(&replaced);
    let bundle = without_debug
        .strip_suffix("/osmdroid")
        .unwrap_or(without_debug);

    aliases
        .get(bundle)
        .cloned()
        .unwrap_or_else(|| vec![bundle.to_string()])
}

/// Sum class-level INSTRUCTION counters of packages under the bundle prefixes.
///
/// Only `<counter>` elements that are direct children of a `<class>` that is a
/// direct child of a matching top-level `<package>` are counted; method-level
/// and package-level counters would double count.
pub fn filtered_instruction_totals(
    xml: &str,
    aliases: &BTreeMap<String, Vec<String>>,
) -> Result<InstructionTotals, ReportError> {
    let mut reader = Reader::from_str(xml);
    let mut totals = InstructionTotals::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut prefixes: Option<Vec<String>> = None;
    let mut package_matches = false;

    loop {
        let (element, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(_) => {
                stack.pop();
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let name = element.name().as_ref().to_vec();
        match stack.len() {
            0 => {
                let bundle = attribute(&element, b"name")?
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| ReportError::Malformed("report has no bundle name".to_string()))?;
                prefixes = Some(bundle_prefixes(&bundle, aliases));
            }
            1 if name == b"package" => {
                let package = attribute(&element, b"name")?.unwrap_or_default();
                package_matches = prefixes
                    .iter()
                    .flatten()
                    .any(|prefix| package.starts_with(prefix.as_str()));
            }
            3 if name == b"counter"
                && package_matches
                && stack[1] == b"package"
                && stack[2] == b"class" =>
            {
                if attribute(&element, b"type")?.as_deref() == Some("INSTRUCTION") {
                    totals.covered = checked_total(totals.covered, counter_value(&element, b"covered")?)?;
                    totals.missed = checked_total(totals.missed, counter_value(&element, b"missed")?)?;
                }
            }
            _ => {}
        }

        if !is_empty {
            stack.push(name);
        }
    }

    if prefixes.is_none() {
        return Err(ReportError::Malformed("document has no root element".to_string()));
    }

    Ok(totals)
}

fn checked_total(total: u64, value: u64) -> Result<u64, ReportError> {
    total
        .checked_add(value)
        .ok_or_else(|| ReportError::Malformed("instruction counters overflow".to_string()))
}

fn counter_value(element: &BytesStart<'_>, name: &[u8]) -> Result<u64, ReportError> {
    let raw = attribute(element, name)?.unwrap_or_default();
    raw.trim().parse().map_err(|_| {
        ReportError::Malformed(format!(
            "counter attribute {} is not a count: '{}'",
            String::from_utf8_lossy(name),
            raw
        ))
    })
}

/// Compiled patterns for HTML reports and command logs
#[derive(Debug, Clone)]
pub struct ReportParser {
    footer_row: Regex,
    cell: Regex,
    tag: Regex,
    runtime: Regex,
}

impl ReportParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            footer_row: Regex::new(r"(?is)<tfoot[^>]*>.*?<tr[^>]*>(.*?)</tr>")?,
            cell: Regex::new(r"(?is)<td[^>]*>(.*?)</td>")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            runtime: Regex::new(r"\[INFO\] \(.+\) - Execution time: (\d+):(\d+):(\d+)\.")?,
        })
    }

    /// Coverage percentage from the third cell of the report footer row
    pub fn html_coverage(&self, html: &str) -> Result<f64, ReportError> {
        let row = self
            .footer_row
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| ReportError::Malformed("no <tfoot> row".to_string()))?;

        let cell = self
            .cell
            .captures_iter(row.as_str())
            .nth(2)
            .and_then(|c| c.get(1))
            .ok_or_else(|| ReportError::Malformed("footer row has fewer than 3 cells".to_string()))?;

        let text = self.tag.replace_all(cell.as_str(), "");
        let text = text.trim();
        let number = text.strip_suffix('%').unwrap_or(text).trim();
        number
            .parse()
            .map_err(|_| ReportError::Malformed(format!("coverage cell is not a percentage: '{}'", text)))
    }

    /// Seconds of the last `Execution time: H:M:S.` line, 0 when absent.
    ///
    /// A line whose duration does not fit in `u64` seconds does not match.
    pub fn runtime_seconds(&self, log: &str) -> u64 {
        log.lines()
            .filter_map(|line| {
                let c = self.runtime.captures(line)?;
                let part = |i: usize| c[i].parse::<u64>().ok();
                part(1)?
                    .checked_mul(3600)?
                    .checked_add(part(2)?.checked_mul(60)?)?
                    .checked_add(part(3)?)
            })
            .last()
            .unwrap_or(0)
    }
}

/// One discovered `test_<n>` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    pub number: String,
    pub path: PathBuf,
}

/// Sorted subdirectory names of `base` (unreadable directories yield none)
fn sorted_entries(base: &Path) -> Vec<(String, PathBuf)> {
    let Ok(read_dir) = fs::read_dir(base) else {
        tracing::warn!("Could not list {}", base.display());
        return Vec::new();
    };
    let mut entries: Vec<(String, PathBuf)> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    entries.sort();
    entries
}

/// Application directories directly under the results root, by name
pub fn app_directories(results: &Path) -> Vec<(String, PathBuf)> {
    sorted_entries(results)
        .into_iter()
        .filter(|(_, path)| path.is_dir())
        .collect()
}

/// `test_<n>` directories of a multi-run approach, by name
pub fn run_directories(approach_dir: &Path) -> Vec<RunDirectory> {
    sorted_entries(approach_dir)
        .into_iter()
        .filter_map(|(name, path)| {
            let number = name.strip_prefix("test_")?.trim().to_string();
            path.is_dir().then_some(RunDirectory { number, path })
        })
        .collect()
}

/// Walks approach directories and extracts per-run measurements
#[derive(Debug, Clone)]
pub struct ResultScanner<'a> {
    config: &'a AnalysisConfig,
    parser: ReportParser,
}

impl<'a> ResultScanner<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            config,
            parser: ReportParser::new()?,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        self.config
    }

    /// Read one report, logging and discarding failures
    pub fn read_coverage(&self, path: &Path, source: CoverageSource) -> Option<f64> {
        tracing::debug!("Reading coverage from {}", path.display());
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Could not read coverage report {}: {}", path.display(), e);
                return None;
            }
        };

        let coverage = match source {
            CoverageSource::Html => self.parser.html_coverage(&content).map(Some),
            CoverageSource::FilteredXml => {
                filtered_instruction_totals(&content, &self.config.package_aliases)
                    .map(|totals| totals.percentage())
            }
        };

        match coverage {
            Ok(Some(value)) => {
                tracing::debug!("Coverage from {} is {}", path.display(), value);
                Some(value)
            }
            Ok(None) => {
                tracing::error!("Problem filtering coverage in XML file ({})", path.display());
                None
            }
            Err(e) => {
                tracing::error!("Could not parse coverage report {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Runtime in seconds from a command log
    pub fn read_runtime(&self, path: &Path) -> Option<u64> {
        tracing::debug!("Reading execution runtime from {}", path.display());
        match fs::read_to_string(path) {
            Ok(content) => {
                let runtime = self.parser.runtime_seconds(&content);
                tracing::debug!("Runtime from {} is {}", path.display(), runtime);
                Some(runtime)
            }
            Err(e) => {
                tracing::error!("Could not read log {}: {}", path.display(), e);
                None
            }
        }
    }

    fn report_name(source: CoverageSource) -> &'static str {
        match source {
            CoverageSource::Html => HTML_REPORT,
            CoverageSource::FilteredXml => XML_REPORT,
        }
    }

    /// Report files of one approach, one per run
    pub fn coverage_reports(&self, approach_dir: &Path, approach: &str, source: CoverageSource) -> Vec<PathBuf> {
        let report = Self::report_name(source);
        if self.config.is_single_run(approach) {
            tracing::debug!("Looking for results in {}", approach_dir.display());
            let path = approach_dir.join("report_1").join(report);
            return if path.is_file() { vec![path] } else { Vec::new() };
        }

        tracing::debug!("Looking for results in sub-directories of {}", approach_dir.display());
        run_directories(approach_dir)
            .into_iter()
            .map(|run| {
                tracing::debug!("Looking for results in {}", run.path.display());
                run.path.join(format!("report_{}", run.number)).join(report)
            })
            .filter(|path| path.is_file())
            .collect()
    }

    /// Coverage of every run of one approach
    pub fn coverage_values(&self, approach_dir: &Path, approach: &str, source: CoverageSource) -> Vec<f64> {
        let values: Vec<f64> = self
            .coverage_reports(approach_dir, approach, source)
            .iter()
            .filter_map(|path| self.read_coverage(path, source))
            .collect();
        self.check_run_count(approach_dir, approach, values.len(), "coverage");
        values
    }

    /// Runtime of every run of one approach
    pub fn runtime_values(&self, approach_dir: &Path, approach: &str) -> Vec<u64> {
        let logs: Vec<PathBuf> = if self.config.is_single_run(approach) {
            tracing::debug!("Looking for results in {}", approach_dir.display());
            vec![approach_dir.join("cmd.log")]
        } else {
            tracing::debug!("Looking for results in sub-directories of {}", approach_dir.display());
            run_directories(approach_dir)
                .into_iter()
                .map(|run| run.path.join(format!("cmd_{}.log", run.number)))
                .collect()
        };

        let values: Vec<u64> = logs
            .iter()
            .filter(|path| path.is_file())
            .filter_map(|path| self.read_runtime(path))
            .collect();
        self.check_run_count(approach_dir, approach, values.len(), "runtime");
        values
    }

    /// Warn about unexpected run counts; never fails
    fn check_run_count(&self, approach_dir: &Path, approach: &str, count: usize, what: &str) {
        if count == 0 {
            tracing::error!("No {} data found in {}", what, approach_dir.display());
        } else if self.config.is_single_run(approach) {
            if count != 1 {
                tracing::warn!("Number of {} values is not 1 for {}", what, approach_dir.display());
            }
        } else if count < self.config.expected_runs {
            tracing::warn!(
                "Average does not include {} {} values for {}",
                self.config.expected_runs,
                what,
                approach_dir.display()
            );
        }
    }
}
