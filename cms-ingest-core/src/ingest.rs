//! High-level pipeline: fetch → publish every catalog locator, then report the run.
//!
//! [`Orchestrator`] walks the [`Catalog`] in order. For every locator of every
//! category it stages the file under `<staging_root>/<category>/`, publishes it to
//! `<category>/<YYYY>/<MM>-<DD>/<filename>` and records the filename. A failed
//! fetch or publish is recorded against its category and the loop moves on to
//! the next locator; it never aborts the run.
//!
//! # Error slot policy
//! Under [`crate::result::ErrorPolicy::LastWins`] a category keeps only its latest
//! failure. Under [`crate::result::ErrorPolicy::Accumulate`] all failures are kept
//! in order.
//!
//! # Completion
//! The notifier is called exactly once per run, whatever happened, and the run
//! completes with status 200. Only a failed notification escapes as an error.
//!
//! # Dates
//! The run date is fixed once at the start; every key in the run uses it even if
//! the run crosses midnight UTC.

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::contract::{Fetcher, NotificationError, Notifier, Publisher, TransferError};
use crate::result::{Completion, DownloadArtifact, RunResult};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("run report could not be delivered: {0}")]
    Notification(#[from] NotificationError),
}

pub struct Orchestrator<'a, F, P, N> {
    catalog: &'a Catalog,
    settings: &'a Settings,
    fetcher: &'a F,
    publisher: &'a P,
    notifier: &'a N,
}

impl<'a, F, P, N> Orchestrator<'a, F, P, N>
where
    F: Fetcher,
    P: Publisher,
    N: Notifier,
{
    pub fn new(
        catalog: &'a Catalog,
        settings: &'a Settings,
        fetcher: &'a F,
        publisher: &'a P,
        notifier: &'a N,
    ) -> Self {
        Self {
            catalog,
            settings,
            fetcher,
            publisher,
            notifier,
        }
    }

    /// Run with today's UTC date.
    pub async fn run(&self, trigger: &Value) -> Result<Completion, IngestError> {
        self.run_on(trigger, Utc::now().date_naive()).await
    }

    /// Run with an explicit date for every destination key.
    pub async fn run_on(&self, trigger: &Value, run_date: NaiveDate) -> Result<Completion, IngestError> {
        info!(%trigger, %run_date, categories = self.catalog.len(), "[INGEST] Starting run");
        debug!(catalog = ?self.catalog, "[INGEST] Catalog for this run");

        let policy = self.settings.error_policy;
        let mut result = RunResult::new(self.settings.bucket.clone());

        for (category, locators) in self.catalog.iter() {
            info!(category, locators = locators.len(), "[INGEST] Processing category");
            result.start_category(category);
            let staging_dir = self.settings.staging_root.join(category);

            for locator in locators {
                match self
                    .ingest_locator(category, locator, &staging_dir, run_date)
                    .await
                {
                    Ok(filename) => {
                        info!(category, %locator, filename = %filename, "[INGEST] Uploaded");
                        result.record_upload(category, filename);
                    }
                    Err(e) => {
                        error!(category, %locator, error = %e, "[INGEST][ERROR] Locator failed");
                        result.record_error(category, format!("{locator}: {e}"), policy);
                    }
                }
            }
        }

        info!(
            bucket = %result.destination_bucket,
            categories = result.per_category_uploads.len(),
            failed_categories = result.per_category_errors.len(),
            "[INGEST] All categories processed, sending report"
        );
        debug!(?result, "[INGEST] Run result");

        let receipt = self
            .notifier
            .notify(
                &self.settings.sender,
                &self.settings.recipients,
                &self.settings.report_title,
                &result,
            )
            .await
            .map_err(|e| {
                error!(error = %e, "[INGEST][ERROR] Report delivery failed");
                e
            })?;
        info!(message_id = %receipt.message_id, "[INGEST] Report delivered");

        Ok(Completion::ok(result))
    }

    async fn ingest_locator(
        &self,
        category: &str,
        locator: &Url,
        staging_dir: &Path,
        run_date: NaiveDate,
    ) -> Result<String, TransferError> {
        let local_path = self.fetcher.fetch(locator, staging_dir).await?;
        let artifact = match DownloadArtifact::new(category, &local_path, run_date) {
            Ok(artifact) => artifact,
            Err(e) => {
                discard_staged(&local_path).await;
                return Err(e);
            }
        };
        debug!(
            category,
            path = %artifact.local_path.display(),
            destination_key = %artifact.destination_key,
            "[INGEST] Publishing staged file"
        );
        let published = self
            .publisher
            .publish(&artifact.local_path, &artifact.destination_key)
            .await;
        discard_staged(&artifact.local_path).await;
        published?;
        Ok(artifact.filename)
    }
}

/// Remove a staged file once its publish attempt is over. Failures are logged only.
async fn discard_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed staged file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Staged file already gone")
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove staged file"),
    }
}
