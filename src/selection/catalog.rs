//! App catalog (F-Droid index v2) model and loader
//!
//! The index is a large JSON document. Only the handful of fields the
//! selection needs are modelled, and each of them is read leniently: a field
//! that is missing or has an unexpected shape becomes `None` (or empty) and is
//! left for the filter to reject. One malformed package never fails the load.

use crate::error::StudyError;
use crate::selection::fetch::Downloader;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default local file name of the downloaded index
pub const INDEX_FILE: &str = "index.json";

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Object of records where each malformed record falls back to its default
fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let serde_json::Value::Object(entries) = serde_json::Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .map(|(key, value)| (key, serde_json::from_value(value).unwrap_or_default()))
        .collect())
}

/// Top level of the index document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub repo: Repo,
    #[serde(default, deserialize_with = "lenient_map")]
    pub packages: BTreeMap<String, CatalogPackage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repo {
    /// Base URL that `src.name` and `file.name` are relative to
    #[serde(default, deserialize_with = "lenient")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub categories: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogPackage {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub metadata: Metadata,
    #[serde(default, deserialize_with = "lenient_map")]
    pub versions: BTreeMap<String, Version>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    /// Localised display names
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub categories: Option<Vec<String>>,
    /// Epoch milliseconds
    #[serde(rename = "lastUpdated", default, deserialize_with = "lenient")]
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Version {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub manifest: Manifest,
    #[serde(default, deserialize_with = "lenient")]
    pub src: Option<FileRef>,
    #[serde(default, deserialize_with = "lenient")]
    pub file: Option<FileRef>,
    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient")]
    pub added: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(rename = "usesSdk", default, deserialize_with = "lenient")]
    pub uses_sdk: Option<UsesSdk>,
    #[serde(rename = "versionCode", default, deserialize_with = "lenient")]
    pub version_code: Option<i64>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct UsesSdk {
    #[serde(rename = "minSdkVersion", default, deserialize_with = "lenient")]
    pub min_sdk_version: Option<u32>,
    #[serde(rename = "targetSdkVersion", default, deserialize_with = "lenient")]
    pub target_sdk_version: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
}

/// One package resolved to the version the study would test
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub package: String,
    pub name: String,
    pub categories: Vec<String>,
    pub last_updated: Option<i64>,
    pub version: Option<Version>,
}

/// Flattened view of a kept entry, as written to the JSON outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub name: String,
    pub target_sdk_version: Option<u32>,
    pub min_sdk_version: Option<u32>,
    pub package: String,
    pub source: Option<String>,
    pub categories: Vec<String>,
    pub url: Option<String>,
    pub last_updated: Option<i64>,
    pub version_code: Option<i64>,
}

/// Pick the version matching `last_updated`, else the most recently added one
pub fn select_version<'a, I>(last_updated: Option<i64>, versions: I) -> Option<&'a Version>
where
    I: IntoIterator<Item = &'a Version>,
{
    let mut latest: Option<&Version> = None;
    for version in versions {
        if last_updated.is_some() && version.added == last_updated {
            return Some(version);
        }
        if latest.map_or(true, |current| current.added < version.added) {
            latest = Some(version);
        }
    }
    latest
}

impl Catalog {
    /// Parse a catalog from an already-decoded JSON document
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Declared category names, alphabetical
    pub fn category_names(&self) -> Vec<String> {
        self.repo.categories.keys().cloned().collect()
    }

    /// Every package resolved to its selected version, ordered by package id
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.packages
            .iter()
            .map(|(package, details)| {
                let metadata = &details.metadata;
                let name = metadata
                    .name
                    .as_ref()
                    .and_then(|names| names.get("en-US").or_else(|| names.values().next()))
                    .cloned()
                    .unwrap_or_else(|| package.clone());

                CatalogEntry {
                    package: package.clone(),
                    name,
                    categories: metadata.categories.clone().unwrap_or_default(),
                    last_updated: metadata.last_updated,
                    version: select_version(metadata.last_updated, details.versions.values())
                        .cloned(),
                }
            })
            .collect()
    }
}

impl CatalogEntry {
    /// Flatten into the output record, resolving artifact URLs against `address`
    pub fn to_record(&self, address: &str) -> PackageRecord {
        let version = self.version.as_ref();
        let uses_sdk = version.and_then(|v| v.manifest.uses_sdk);

        PackageRecord {
            name: self.name.clone(),
            target_sdk_version: uses_sdk.and_then(|sdk| sdk.target_sdk_version),
            min_sdk_version: uses_sdk.and_then(|sdk| sdk.min_sdk_version),
            package: self.package.clone(),
            source: version
                .and_then(|v| v.src.as_ref())
                .map(|src| format!("{}{}", address, src.name)),
            categories: self.categories.clone(),
            url: version
                .and_then(|v| v.file.as_ref())
                .map(|file| format!("{}{}", address, file.name)),
            last_updated: self.last_updated,
            version_code: version.and_then(|v| v.manifest.version_code),
        }
    }
}

/// A loaded index: the raw document (for `--format`) and its typed view
#[derive(Debug)]
pub struct LoadedCatalog {
    pub raw: serde_json::Value,
    pub catalog: Catalog,
}

/// Locates, downloads and parses the catalog index
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    path: PathBuf,
    url: String,
}

impl CatalogLoader {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Download the index unless a local copy already exists
    pub fn ensure_available(&self, downloader: &dyn Downloader) -> Result<(), StudyError> {
        if self.path.is_file() {
            return Ok(());
        }

        tracing::info!("Downloading {}.", self.path.display());
        downloader
            .download(&self.url, &self.path)
            .map_err(|e| StudyError::IndexDownload {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!("Download successful.");
        Ok(())
    }

    /// Read and parse the local index
    pub fn load(&self) -> Result<LoadedCatalog, StudyError> {
        tracing::info!("Loading app index from file '{}'.", self.path.display());
        let content = fs::read_to_string(&self.path)?;
        let raw: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| StudyError::IndexFormat {
                path: self.path.clone(),
                source,
            })?;
        let catalog =
            Catalog::from_value(raw.clone()).map_err(|source| StudyError::IndexFormat {
                path: self.path.clone(),
                source,
            })?;
        tracing::info!("Index contains {} packages.", catalog.packages.len());
        Ok(LoadedCatalog { raw, catalog })
    }
}

/// Write `data` as 4-space indented JSON, creating parent directories
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, data: &T) -> std::io::Result<()> {
    tracing::info!(
        "Writing JSON data in '{}'.",
        path.file_name().unwrap_or_default().to_string_lossy()
    );

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    data.serialize(&mut serializer)
        .map_err(std::io::Error::other)?;

    let mut file = fs::File::create(path)?;
    file.write_all(&buffer)?;
    Ok(())
}
