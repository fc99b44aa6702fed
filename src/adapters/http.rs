//! Download of the Statbel building-permits archive.
//!
//! Statbel publishes the dataset as a ZIP holding a single `|`-delimited
//! `.txt` file. The fetcher downloads that archive and unpacks the data file
//! next to where the pipeline expects its input. It runs before, and
//! separately from, the synchronous batch pipeline.

use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zip::ZipArchive;

pub const STATBEL_PERMITS_URL: &str =
    "https://statbel.fgov.be/sites/default/files/files/opendata/Building%20permits/TF_BUILDING_PERMITS.zip";

pub struct ArchiveFetcher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl ArchiveFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Downloads the archive; any non-success status is an error.
    pub async fn download(&self) -> Result<Vec<u8>> {
        tracing::info!("📥 Downloading {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;
        tracing::debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Downloads and unpacks; returns the path of the extracted data file.
    pub async fn fetch_into(&self, data_dir: &Path) -> Result<PathBuf> {
        let archive = self.download().await?;
        extract_data_file(&archive, data_dir, &self.url)
    }
}

/// Writes the first `.txt` entry of `archive` into `dest_dir`.
pub fn extract_data_file(archive: &[u8], dest_dir: &Path, source_url: &str) -> Result<PathBuf> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if !entry.is_file() {
            continue;
        }

        // entries escaping the archive root are ignored
        let Some(name) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry '{}'", entry.name());
            continue;
        };

        let is_data = name
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        let Some(file_name) = name.file_name().filter(|_| is_data) else {
            continue;
        };

        fs::create_dir_all(dest_dir)?;
        let destination = dest_dir.join(file_name);
        let mut out = File::create(&destination)?;
        std::io::copy(&mut entry, &mut out)?;

        tracing::info!("📦 Extracted {}", destination.display());
        return Ok(destination);
    }

    Err(EtlError::EmptyArchive {
        source_url: source_url.to_string(),
    })
}
