//! Run Result, completion payload and per-item artifacts of one ingestion run.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::contract::TransferError;

/// Status code returned to the caller whenever the orchestrator completed its loop.
pub const STATUS_OK: u16 = 200;

/// Separator between failures of one category under [`ErrorPolicy::Accumulate`].
pub const ERROR_SEPARATOR: &str = "; ";

/// What happens when a category fails more than once in the same run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Keep only the most recent failure; earlier ones are overwritten.
    #[default]
    LastWins,
    /// Keep every failure, in the order encountered.
    Accumulate,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorPolicy::LastWins => f.write_str("last-wins"),
            ErrorPolicy::Accumulate => f.write_str("accumulate"),
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-wins" | "last_wins" | "lastwins" => Ok(ErrorPolicy::LastWins),
            "accumulate" => Ok(ErrorPolicy::Accumulate),
            other => Err(format!(
                "unknown error policy {other:?}, expected \"last-wins\" or \"accumulate\""
            )),
        }
    }
}

/// Everything one run uploaded and every category that failed.
///
/// `per_category_uploads` holds an entry for every catalog category, even when
/// nothing was uploaded for it. `per_category_errors` only holds categories that
/// failed at least once. A category can be in both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    #[serde(rename = "messages", serialize_with = "serialize_uploads")]
    pub per_category_uploads: IndexMap<String, Vec<String>>,
    #[serde(rename = "errors")]
    pub per_category_errors: IndexMap<String, String>,
    #[serde(rename = "bucket")]
    pub destination_bucket: String,
}

impl RunResult {
    pub fn new(destination_bucket: impl Into<String>) -> Self {
        Self {
            per_category_uploads: IndexMap::new(),
            per_category_errors: IndexMap::new(),
            destination_bucket: destination_bucket.into(),
        }
    }

    /// Register a category with an empty upload list. Existing uploads are kept.
    pub fn start_category(&mut self, category: &str) {
        self.per_category_uploads
            .entry(category.to_string())
            .or_default();
    }

    pub fn record_upload(&mut self, category: &str, filename: impl Into<String>) {
        self.per_category_uploads
            .entry(category.to_string())
            .or_default()
            .push(filename.into());
    }

    pub fn record_error(&mut self, category: &str, message: impl Into<String>, policy: ErrorPolicy) {
        let message = message.into();
        match (policy, self.per_category_errors.get_mut(category)) {
            (ErrorPolicy::Accumulate, Some(existing)) => {
                existing.push_str(ERROR_SEPARATOR);
                existing.push_str(&message);
            }
            _ => {
                self.per_category_errors.insert(category.to_string(), message);
            }
        }
    }

    pub fn uploads(&self, category: &str) -> Option<&[String]> {
        self.per_category_uploads.get(category).map(Vec::as_slice)
    }

    pub fn error(&self, category: &str) -> Option<&str> {
        self.per_category_errors.get(category).map(String::as_str)
    }

    pub fn has_errors(&self) -> bool {
        !self.per_category_errors.is_empty()
    }
}

fn serialize_uploads<S>(uploads: &IndexMap<String, Vec<String>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    #[derive(Serialize)]
    struct Entry<'a> {
        uploaded_files: &'a [String],
    }

    let mut map = serializer.serialize_map(Some(uploads.len()))?;
    for (category, files) in uploads {
        map.serialize_entry(category, &Entry { uploaded_files: files })?;
    }
    map.end()
}

/// Value handed back to the invoker once a run completes.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: RunResult,
}

impl Completion {
    pub fn ok(body: RunResult) -> Self {
        Self {
            status_code: STATUS_OK,
            body,
        }
    }
}

/// Object-store key for a file: `<category>/<YYYY>/<MM>-<DD>/<filename>`.
pub fn destination_key(category: &str, run_date: NaiveDate, filename: &str) -> String {
    format!("{}/{}/{}", category, run_date.format("%Y/%m-%d"), filename)
}

/// A staged download together with the key it will be published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub local_path: PathBuf,
    pub filename: String,
    pub destination_key: String,
}

impl DownloadArtifact {
    pub fn new(category: &str, local_path: &Path, run_date: NaiveDate) -> Result<Self, TransferError> {
        let filename = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TransferError::MissingFileName(local_path.display().to_string()))?
            .to_string();
        Ok(Self {
            local_path: local_path.to_path_buf(),
            destination_key: destination_key(category, run_date, &filename),
            filename,
        })
    }
}
