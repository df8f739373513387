//! App selection pipeline
//!
//! Loads the F-Droid catalog, filters out apps unsuitable for the study,
//! groups the rest by category and deterministically picks one app per
//! category plus a fixed manual list. Selected apps can optionally have their
//! APK and source archive downloaded.

mod catalog;
mod category;
mod fetch;
mod filter;
mod sampler;

pub use catalog::{
    select_version, write_json_file, Catalog, CatalogEntry, CatalogLoader, LoadedCatalog,
    PackageRecord, INDEX_FILE,
};
pub use category::{index_by_category, selectable_categories, CategoryBuckets, PackageMap};
pub use fetch::{extract_tar_gz, ArtifactFetcher, Downloader, FetchError, HttpDownloader};
pub use filter::{AppFilter, ExclusionReason, FilterCounts, FilterOutcome};
pub use sampler::{manual_selection, picks_by_category, DeterministicSampler, Pick};

use crate::config::SelectionConfig;
use crate::error::StudyError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub const CATEGORIES_FILE: &str = "f_droid_categories.json";
pub const PACKAGES_FILE: &str = "f_droid_packages.json";
pub const CATEGORY_PACKAGES_FILE: &str = "f_droid_category_packages.json";
pub const RANDOM_APPS_FILE: &str = "f_droid_random_apps.json";
pub const MANUAL_APPS_FILE: &str = "f_droid_manual_apps.json";

/// Switches for one selection run
#[derive(Debug, Clone)]
pub struct SelectOptions {
    pub output: PathBuf,
    pub index: PathBuf,
    pub download_binaries: bool,
    pub download_sources: bool,
    pub format_index: bool,
    pub write_categories: bool,
    pub write_packages: bool,
    pub write_category_packages: bool,
}

impl SelectOptions {
    /// Only the two always-written outputs, no downloads
    pub fn new(output: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            index: index.into(),
            download_binaries: false,
            download_sources: false,
            format_index: false,
            write_categories: false,
            write_packages: false,
            write_category_packages: false,
        }
    }
}

/// What a selection run produced
#[derive(Debug, Clone)]
pub struct SelectionSummary {
    pub categories: Vec<String>,
    pub counts: FilterCounts,
    pub packages: PackageMap,
    pub picks: Vec<Pick>,
    pub manual: Vec<PackageRecord>,
}

/// Run the whole selection pipeline
pub fn run_selection(
    options: &SelectOptions,
    config: &SelectionConfig,
    downloader: &dyn Downloader,
    now: DateTime<Utc>,
) -> Result<SelectionSummary> {
    if !options.output.is_dir() {
        return Err(StudyError::MissingOutputDirectory(options.output.clone()).into());
    }
    config.validate().map_err(StudyError::InvalidConfig)?;

    let loader = CatalogLoader::new(&options.index, &config.index_url);
    loader.ensure_available(downloader)?;
    let LoadedCatalog { raw, catalog } = loader.load()?;
    if options.format_index {
        write_json_file(loader.path(), &raw).context("Failed to format app index")?;
    }

    tracing::info!("Finding categories in app index.");
    tracing::info!("Filtering categories that do not meet requirements.");
    let categories = selectable_categories(catalog.category_names(), &config.excluded_categories);
    if options.write_categories {
        write_json_file(&options.output.join(CATEGORIES_FILE), &categories)?;
    }
    tracing::info!("Index contains {} categories.", categories.len());

    tracing::info!("Filtering packages that do not meet requirements.");
    let address = catalog.repo.address.clone().unwrap_or_default();
    let filter = AppFilter::new(config, now);
    let (kept, counts) = filter.filter_entries(catalog.entries());
    let packages: PackageMap = kept
        .iter()
        .map(|entry| (entry.package.clone(), entry.to_record(&address)))
        .collect();
    if options.write_packages {
        write_json_file(&options.output.join(PACKAGES_FILE), &packages)?;
    }
    counts.log_summary();

    tracing::info!("Creating list of packages per category.");
    let buckets = index_by_category(&categories, &packages);
    if options.write_category_packages {
        write_json_file(&options.output.join(CATEGORY_PACKAGES_FILE), &buckets)?;
    }

    tracing::info!("Selecting random app per category.");
    let picks = DeterministicSampler::new(config.seeds.clone()).select(&buckets);
    write_json_file(
        &options.output.join(RANDOM_APPS_FILE),
        &picks_by_category(&picks),
    )?;

    tracing::info!("Gathering apps from previous publication.");
    let manual = manual_selection(&packages, &config.manual_selection);
    write_json_file(&options.output.join(MANUAL_APPS_FILE), &manual)?;

    if options.download_binaries || options.download_sources {
        let fetcher = ArtifactFetcher::new(&options.output, downloader);
        let selected = picks.iter().map(|pick| &pick.record).chain(manual.iter());
        for record in selected {
            if options.download_binaries {
                fetcher.fetch_binary(record);
            }
            if options.download_sources {
                fetcher.fetch_source(record);
            }
        }
    }

    Ok(SelectionSummary {
        categories,
        counts,
        packages,
        picks,
        manual,
    })
}
