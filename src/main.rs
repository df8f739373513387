use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use droidstudy::analysis::{run_analysis, AnalyzeOptions};
use droidstudy::cli::{AnalyzeArgs, Cli, Command, SelectArgs};
use droidstudy::config::{AnalysisConfig, SelectionConfig};
use droidstudy::error::{exit_code_for, EXIT_FAILURE};
use droidstudy::logging::{init_logging, ANALYSIS_LOG, SELECTION_LOG};
use droidstudy::selection::{run_selection, HttpDownloader, SelectOptions};

const TIME_FORMAT: &str = "%d/%m/%Y-%H:%M:%S";

/// Load the selection tables and apply threshold flags on top
fn selection_config(args: &SelectArgs) -> Result<SelectionConfig> {
    let mut config = match &args.config {
        Some(path) => SelectionConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => SelectionConfig::default(),
    };
    if let Some(age) = args.age {
        config.max_age_years = age;
    }
    if let Some(min_sdk) = args.min_sdk {
        config.min_sdk = min_sdk;
    }
    if let Some(max_sdk) = args.max_sdk {
        config.max_sdk = max_sdk;
    }
    Ok(config)
}

fn run_select(args: &SelectArgs, now: DateTime<Utc>) -> Result<()> {
    let config = selection_config(args)?;
    let options = SelectOptions {
        download_binaries: args.download,
        download_sources: args.source,
        format_index: args.format,
        write_categories: args.category,
        write_packages: args.package,
        write_category_packages: args.category_packages,
        ..SelectOptions::new(&args.output, &args.index)
    };
    let downloader = HttpDownloader::new().context("Failed to create HTTP client")?;

    let summary = run_selection(&options, &config, &downloader, now)?;
    tracing::info!(
        "Selected {} random and {} manual apps.",
        summary.picks.len(),
        summary.manual.len()
    );
    Ok(())
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let options = AnalyzeOptions {
        results: args.results.clone(),
        output: args.output.clone(),
    };

    let summary = run_analysis(&options, &config)?;
    tracing::info!("Analysed results of {} apps.", summary.apps.len());
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let log_name = match cli.command {
        Command::Select(_) => SELECTION_LOG,
        Command::Analyze(_) => ANALYSIS_LOG,
    };
    let log_file = cli.command.output().join(log_name);
    if let Err(e) = init_logging(cli.command.verbose(), Some(&log_file)) {
        eprintln!("{:#}", e);
        std::process::exit(EXIT_FAILURE);
    }

    let start = Local::now();
    tracing::info!("Start time: {}", start.format(TIME_FORMAT));

    let result = match &cli.command {
        Command::Select(args) => run_select(args, start.with_timezone(&Utc)),
        Command::Analyze(args) => run_analyze(args),
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        std::process::exit(exit_code_for(&e));
    }

    let end = Local::now();
    tracing::info!("End time: {}", end.format(TIME_FORMAT));
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    tracing::info!("Execution time: {} second(s)", seconds.round());
}
