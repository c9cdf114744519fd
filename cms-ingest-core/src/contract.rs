//! # contract: collaborator interfaces for the ingestion run
//!
//! The orchestrator in [`crate::ingest`] never talks to HTTP, S3 or SES directly.
//! It drives three collaborators through the traits defined here:
//!
//! - [`Fetcher`]: retrieve one remote file into a local staging directory.
//! - [`Publisher`]: store one staged file in the object store under a key.
//! - [`Notifier`]: render and send the end-of-run report.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the generated `MockFetcher`,
//!   `MockPublisher` and `MockNotifier` are exported under the default
//!   `test-export-mocks` feature so integration tests can substitute them.
//!
//! ## Errors
//! - Fetch and publish failures are [`TransferError`]s. The orchestrator turns them
//!   into report data and keeps going.
//! - A failed report is a [`NotificationError`]. Nothing is left to do after the
//!   report, so the orchestrator returns it to the caller.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::result::RunResult;

/// A fetch or publish of a single locator failed.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The locator has no final path segment to name the local file after.
    #[error("locator {0} has no file name in its path")]
    MissingFileName(String),

    /// The remote host could not be reached or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote host answered with a non-success status.
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Reading or writing a local file failed.
    #[error("local I/O on {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object store rejected or did not complete the upload.
    #[error("upload of {key} failed: {message}")]
    ObjectStore { key: String, message: String },
}

/// The end-of-run report could not be delivered.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The message could not be assembled (e.g. a required field was empty).
    #[error("could not build report message: {0}")]
    Build(String),

    /// The mail service refused or never acknowledged the message.
    #[error("could not send report: {0}")]
    Send(String),
}

/// Acknowledgement returned by the mail service for a delivered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Retrieves remote content into a local directory.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `locator` into `destination_dir`, creating the directory (and its
    /// parents) if needed. Returns the path of the written file, which is named
    /// after the last path segment of the locator.
    async fn fetch(&self, locator: &Url, destination_dir: &Path) -> Result<PathBuf, TransferError>;
}

/// Durably stores a local file in the object store.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload `local_path` under `destination_key`. Returns only once the object is
    /// fully stored, or with an error if it is not.
    async fn publish(&self, local_path: &Path, destination_key: &str) -> Result<(), TransferError>;
}

/// Renders and dispatches the run report.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the report for `run_result` from `sender` to every address in `recipients`.
    async fn notify(
        &self,
        sender: &str,
        recipients: &[String],
        report_title: &str,
        run_result: &RunResult,
    ) -> Result<DeliveryReceipt, NotificationError>;
}
