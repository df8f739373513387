//! CLI argument parsing for droidstudy

use crate::selection::INDEX_FILE;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "droidstudy")]
#[command(version)]
#[command(
    about = "App selection and coverage/runtime analysis for an Android testing study",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Select apps from the F-Droid catalog
    Select(SelectArgs),
    /// Aggregate coverage and runtime results
    Analyze(AnalyzeArgs),
}

impl Command {
    pub fn output(&self) -> &PathBuf {
        match self {
            Command::Select(args) => &args.output,
            Command::Analyze(args) => &args.output,
        }
    }

    pub fn verbose(&self) -> bool {
        match self {
            Command::Select(args) => args.verbose,
            Command::Analyze(args) => args.verbose,
        }
    }
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Output directory (must exist)
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    pub output: PathBuf,

    /// Download APK files of the selected apps
    #[arg(short = 'd', long = "download")]
    pub download: bool,

    /// Download and extract source archives of the selected apps
    #[arg(short = 's', long = "source")]
    pub source: bool,

    /// Rewrite the index file pretty-printed
    #[arg(short = 'f', long = "format")]
    pub format: bool,

    /// Maximum years since the last update
    #[arg(short = 'a', long = "age", value_name = "YEARS")]
    pub age: Option<u32>,

    /// Minimum accepted SDK version
    #[arg(short = 'i', long = "min", value_name = "SDK")]
    pub min_sdk: Option<u32>,

    /// Maximum accepted SDK version
    #[arg(short = 'x', long = "max", value_name = "SDK")]
    pub max_sdk: Option<u32>,

    /// Write the category list
    #[arg(short = 'c', long = "category")]
    pub category: bool,

    /// Write the filtered package list
    #[arg(short = 'p', long = "package")]
    pub package: bool,

    /// Write the packages of every category
    #[arg(short = 'g', long = "category-packages")]
    pub category_packages: bool,

    /// Output all log messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Local catalog index, downloaded when missing
    #[arg(long, value_name = "FILE", default_value = INDEX_FILE)]
    pub index: PathBuf,

    /// TOML file overriding the selection tables
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Results base directory
    #[arg(short, long, value_name = "DIR")]
    pub results: PathBuf,

    /// Output directory (must exist)
    #[arg(short, long, value_name = "DIR", default_value = "output")]
    pub output: PathBuf,

    /// Output all log messages
    #[arg(short, long)]
    pub verbose: bool,

    /// TOML file overriding the analysis tables
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_defaults() {
        let cli = Cli::parse_from(["droidstudy", "select"]);
        let Command::Select(args) = cli.command else {
            panic!("expected select");
        };
        assert_eq!(args.output, PathBuf::from("output"));
        assert_eq!(args.index, PathBuf::from("index.json"));
        assert!(!args.download);
        assert!(!args.source);
        assert!(args.age.is_none());
        assert!(args.min_sdk.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_select_short_flags() {
        let cli = Cli::parse_from([
            "droidstudy", "select", "-o", "out", "-d", "-s", "-f", "-a", "5", "-i", "21", "-x",
            "28", "-c", "-p", "-g", "-v",
        ]);
        let Command::Select(args) = cli.command else {
            panic!("expected select");
        };
        assert_eq!(args.output, PathBuf::from("out"));
        assert!(args.download && args.source && args.format);
        assert_eq!(args.age, Some(5));
        assert_eq!(args.min_sdk, Some(21));
        assert_eq!(args.max_sdk, Some(28));
        assert!(args.category && args.package && args.category_packages);
        assert!(args.verbose);
    }

    #[test]
    fn test_analyze_requires_results() {
        assert!(Cli::try_parse_from(["droidstudy", "analyze"]).is_err());
    }

    #[test]
    fn test_analyze_parses() {
        let cli = Cli::parse_from([
            "droidstudy",
            "analyze",
            "-r",
            "results",
            "--config",
            "study.toml",
            "-v",
        ]);
        assert!(cli.command.verbose());
        assert_eq!(cli.command.output(), &PathBuf::from("output"));
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.results, PathBuf::from("results"));
        assert_eq!(args.config, Some(PathBuf::from("study.toml")));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["droidstudy"]).is_err());
    }
}
