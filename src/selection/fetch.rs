//! Binary and source artifact downloads for selected apps
//!
//! Every step is idempotent: an artifact already on disk is not downloaded
//! again and an archive already extracted is not unpacked again. A failure on
//! one app is logged and leaves that artifact absent.

use crate::naming::{artifact_stem, title_case};
use crate::selection::catalog::PackageRecord;
use flate2::read::GzDecoder;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while fetching a single artifact
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No {kind} URL recorded for {package}")]
    MissingUrl { kind: &'static str, package: String },
}

/// Anything that can copy a URL to a local file
pub trait Downloader {
    fn download(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}

/// Blocking HTTP downloader
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("droidstudy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

impl Downloader for HttpDownloader {
    /// Stream the body into `<destination>.part`, then rename into place so an
    /// interrupted download is never mistaken for a finished one.
    fn download(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        let mut response = self.client.get(url).send()?.error_for_status()?;
        let partial = partial_path(destination);
        let mut file = File::create(&partial)?;
        if let Err(e) = response.copy_to(&mut file) {
            let _ = fs::remove_file(&partial);
            return Err(e.into());
        }
        fs::rename(&partial, destination)?;
        Ok(())
    }
}

/// Unpack a `.tar.gz` archive into `directory`
pub fn extract_tar_gz(archive: &Path, directory: &Path) -> std::io::Result<()> {
    let decoder = GzDecoder::new(File::open(archive)?);
    tar::Archive::new(decoder).unpack(directory)
}

/// Directory names an extracted source archive may use
fn extracted_directory_candidates(source_url: &str) -> Vec<String> {
    let archive_name = source_url.rsplit('/').next().unwrap_or(source_url);
    let mut candidates = vec![archive_name.to_string()];
    for suffix in ["_src.tar.gz", ".tar.gz"] {
        if let Some(stem) = archive_name.strip_suffix(suffix) {
            candidates.push(stem.to_string());
        }
    }
    candidates
}

/// Downloads artifacts under `<output>/{apk,archive,source}`
pub struct ArtifactFetcher<'a> {
    output: PathBuf,
    downloader: &'a dyn Downloader,
}

impl<'a> ArtifactFetcher<'a> {
    pub fn new(output: impl Into<PathBuf>, downloader: &'a dyn Downloader) -> Self {
        Self {
            output: output.into(),
            downloader,
        }
    }

    pub fn apk_path(&self, record: &PackageRecord) -> PathBuf {
        self.output
            .join("apk")
            .join(format!("{}.apk", artifact_stem(&record.name, record.version_code)))
    }

    pub fn archive_path(&self, record: &PackageRecord) -> PathBuf {
        self.output.join("archive").join(format!(
            "{}.tar.gz",
            artifact_stem(&record.name, record.version_code)
        ))
    }

    pub fn source_path(&self, record: &PackageRecord) -> PathBuf {
        self.output
            .join("source")
            .join(artifact_stem(&record.name, record.version_code))
    }

    /// Download `url` to `destination` unless it already exists
    fn download_once(
        &self,
        kind: &'static str,
        record: &PackageRecord,
        url: Option<&str>,
        destination: &Path,
    ) -> Result<(), FetchError> {
        let app_name = title_case(&record.name);
        if destination.is_file() {
            tracing::info!("{} {} already downloaded.", app_name, kind);
            return Ok(());
        }

        let url = url.ok_or_else(|| FetchError::MissingUrl {
            kind,
            package: record.package.clone(),
        })?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!("Downloading {} {}.", app_name, kind);
        self.downloader.download(url, destination)?;
        tracing::info!("Download successful.");
        Ok(())
    }

    /// Fetch the APK; returns its path when present afterwards
    pub fn fetch_binary(&self, record: &PackageRecord) -> Option<PathBuf> {
        let path = self.apk_path(record);
        match self.download_once("APK", record, record.url.as_deref(), &path) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::error!(
                    "Error downloading APK file from {}. {}",
                    record.url.as_deref().unwrap_or("<none>"),
                    e
                );
                None
            }
        }
    }

    /// Fetch and extract the source archive; returns the extracted directory
    pub fn fetch_source(&self, record: &PackageRecord) -> Option<PathBuf> {
        let archive = self.archive_path(record);
        if let Err(e) = self.download_once("source", record, record.source.as_deref(), &archive) {
            tracing::error!(
                "Error downloading source archive from {}. {}",
                record.source.as_deref().unwrap_or("<none>"),
                e
            );
        }

        if !archive.is_file() {
            return None;
        }

        let directory = self.source_path(record);
        if directory.is_dir() {
            tracing::info!("{} archive already extracted.", title_case(&record.name));
            return Some(directory);
        }

        self.extract(record, &archive, &directory)
    }

    fn extract(&self, record: &PackageRecord, archive: &Path, directory: &Path) -> Option<PathBuf> {
        let source_root = self.output.join("source");
        tracing::info!("Extracting {} source.", title_case(&record.name));
        if let Err(e) = extract_tar_gz(archive, &source_root) {
            tracing::error!("Extracting {} failed. {}", archive.display(), e);
            return None;
        }
        tracing::info!("Extracting successful.");

        let candidates = record
            .source
            .as_deref()
            .map(extracted_directory_candidates)
            .unwrap_or_default();
        let Some(extracted) = candidates
            .iter()
            .map(|name| source_root.join(name))
            .find(|path| path.is_dir())
        else {
            tracing::error!(
                "Rename failed, could not find directory {}.",
                source_root
                    .join(candidates.first().map(String::as_str).unwrap_or_default())
                    .display()
            );
            return None;
        };

        tracing::info!("Renaming extracted directory '{}'.", extracted.display());
        match fs::rename(&extracted, directory) {
            Ok(()) => {
                tracing::info!("Rename successful.");
                Some(directory.to_path_buf())
            }
            Err(e) => {
                tracing::error!("Rename of {} failed. {}", extracted.display(), e);
                None
            }
        }
    }
}
