//! Local data directory and downloads.

use crate::archive::{extract, write_atomic};
use crate::error::{DataError, Result};
use crate::registry::{self, DataEntry, DataKind};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "GEOLAB_DATA_DIR";

/// Directory under the data root that receives ad-hoc URL downloads
const DOWNLOADS_DIR: &str = "downloads";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Download behaviour
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Download again even when the target already exists
    pub replace: bool,
}

/// A data directory holding downloaded datasets
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `GEOLAB_DATA_DIR`, else `~/earth-analytics/data`
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory is unknown")
        })?;
        Ok(Self::new(home.join("earth-analytics").join("data")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the registered datasets, sorted
    pub fn keys(&self) -> Vec<&'static str> {
        registry::keys()
    }

    /// Local paths of a registered dataset, downloading what is missing.
    ///
    /// Entries land under `<root>/<key>/<name>`; archives are extracted into
    /// that path.
    pub fn fetch(&self, key: &str, options: &FetchOptions) -> Result<Vec<PathBuf>> {
        let entries = registry::lookup(key).ok_or_else(|| {
            DataError::NotFound(format!(
                "dataset '{}'; choose one of: {}",
                key,
                registry::keys().join(", ")
            ))
        })?;

        let dataset_dir = self.root.join(key);
        entries
            .iter()
            .map(|entry| self.download(entry.url, &entry_path(&dataset_dir, entry), entry.kind, options))
            .collect()
    }

    /// Fetch an ad-hoc URL into `<root>/downloads`.
    ///
    /// The name comes from `filename`, the server's Content-Disposition or the
    /// last URL segment, in that order; the kind from that name's extension.
    pub fn fetch_url(&self, url: &str, filename: Option<&str>, options: &FetchOptions) -> Result<PathBuf> {
        let name = match filename {
            Some(name) => name.to_string(),
            None => remote_file_name(&client()?, url)?,
        };
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(DataError::NotFound(format!("no usable file name for {}", url)));
        }

        let kind = DataKind::from_file_name(&name);
        let target = self.root.join(DOWNLOADS_DIR).join(kind.strip_extension(&name));
        self.download(url, &target, kind, options)
    }

    fn download(&self, url: &str, target: &Path, kind: DataKind, options: &FetchOptions) -> Result<PathBuf> {
        if is_cached(target, options) {
            debug!(path = %target.display(), "already downloaded");
            return Ok(target.to_path_buf());
        }

        info!("Downloading from {}", url);
        let response = checked(client()?.get(url).send()?, url)?;
        let bytes = response.bytes()?;

        if kind.is_archive() {
            extract(&bytes, kind, target)?;
            info!("Extracted output to {}", target.display());
        } else {
            write_atomic(&bytes, target)?;
            debug!(path = %target.display(), bytes = bytes.len(), "wrote file");
        }
        Ok(target.to_path_buf())
    }
}

/// A target counts as downloaded once it exists; partial downloads never do
fn is_cached(target: &Path, options: &FetchOptions) -> bool {
    !options.replace && target.exists()
}

fn entry_path(dataset_dir: &Path, entry: &DataEntry) -> PathBuf {
    if entry.name == "." {
        dataset_dir.to_path_buf()
    } else {
        dataset_dir.join(entry.name)
    }
}

fn client() -> Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn checked(response: Response, url: &str) -> Result<Response> {
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(DataError::NotFound(url.to_string())),
        s => Err(DataError::Network(format!("{} returned {}", url, s))),
    }
}

/// File name announced by the server, else the last path segment of the URL
fn remote_file_name(client: &Client, url: &str) -> Result<String> {
    let response = checked(client.head(url).send()?, url)?;
    let announced = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_file_name);
    Ok(announced.unwrap_or_else(|| url_file_name(url)))
}

fn disposition_file_name(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let name = rest.split(';').next()?.trim().trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

fn url_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
