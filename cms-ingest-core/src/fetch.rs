//! HTTP implementation of [`Fetcher`].
//!
//! Streams the response body to `<destination_dir>/<last path segment>`. The
//! destination directory is created on demand. Any non-success status is an
//! error; nothing is retried. A download that fails midway leaves no file behind.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::contract::{Fetcher, TransferError};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

/// Name of the local file for `locator`: its last non-empty path segment.
pub fn file_name_for(locator: &Url) -> Result<String, TransferError> {
    locator
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TransferError::MissingFileName(locator.to_string()))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &Url, destination_dir: &Path) -> Result<PathBuf, TransferError> {
        let file_name = file_name_for(locator)?;
        let output_path = destination_dir.join(&file_name);

        debug!(path = %destination_dir.display(), "Ensuring staging directory exists");
        fs::create_dir_all(destination_dir)
            .await
            .map_err(|source| TransferError::Io {
                path: destination_dir.to_path_buf(),
                source,
            })?;

        let start = Instant::now();
        info!(url = %locator, "Starting file download");

        let request_error = |source| TransferError::Request {
            url: locator.to_string(),
            source,
        };
        let mut response = self
            .client
            .get(locator.clone())
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status {
                url: locator.to_string(),
                status: status.as_u16(),
            });
        }

        let io_error = |source| TransferError::Io {
            path: output_path.clone(),
            source,
        };
        let mut file = File::create(&output_path).await.map_err(io_error)?;
        let streamed = async {
            let mut written: u64 = 0;
            while let Some(chunk) = response.chunk().await.map_err(request_error)? {
                file.write_all(&chunk).await.map_err(io_error)?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_error)?;
            Ok::<_, TransferError>(written)
        }
        .await;
        drop(file);

        let written = match streamed {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = fs::remove_file(&output_path).await {
                    warn!(path = %output_path.display(), error = %remove_err, "Could not remove partial download");
                }
                return Err(e);
            }
        };

        info!(
            url = %locator,
            path = %output_path.display(),
            size_mb = written as f64 / BYTES_PER_MB,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Downloaded file"
        );
        Ok(output_path)
    }
}
