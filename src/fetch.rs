//! Dataset download-and-cache step.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Dataset {0} not found and downloading is disabled")]
    Missing(PathBuf),
    #[error("Download from {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Downloads the source dataset once and reuses the local copy afterwards.
pub struct DatasetFetcher {
    url: String,
    timeout: Duration,
}

impl DatasetFetcher {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
        }
    }

    /// Return `path` if it exists, otherwise download to it when allowed.
    pub fn ensure(&self, path: &Path, allow_download: bool) -> Result<PathBuf, FetchError> {
        if path.is_file() {
            info!(path = %path.display(), "using cached dataset");
            return Ok(path.to_path_buf());
        }
        if !allow_download {
            return Err(FetchError::Missing(path.to_path_buf()));
        }
        self.download(path)?;
        Ok(path.to_path_buf())
    }

    fn download(&self, path: &Path) -> Result<(), FetchError> {
        let io_err = |source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        };
        let http_err = |source| FetchError::Http {
            url: self.url.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        info!(url = %self.url, path = %path.display(), "downloading dataset");
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(http_err)?;
        let mut response = client
            .get(&self.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?;

        let bytes = Self::store(&mut response, path)?;

        info!(bytes, path = %path.display(), "dataset downloaded");
        Ok(())
    }

    /// Stream `body` to `path` via a `.part` sibling. The cached path only
    /// ever holds a complete download, and a failed write leaves no file.
    fn store(body: &mut impl Read, path: &Path) -> Result<u64, FetchError> {
        let partial = Self::partial_path(path);
        let written = File::create(&partial)
            .and_then(|mut file| io::copy(body, &mut file))
            .and_then(|bytes| fs::rename(&partial, path).map(|()| bytes));
        written.map_err(|source| {
            let _ = fs::remove_file(&partial);
            FetchError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        path.with_file_name(name)
    }
}
