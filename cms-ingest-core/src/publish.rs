//! S3 implementation of [`Publisher`].
//!
//! Small files go up in a single `PutObject`. Files at or above the multipart
//! threshold are split into fixed-size parts and uploaded with S3 multipart
//! upload, several parts in flight at once. The concurrency stays inside one
//! `publish` call: the caller still sees one call that either stores the whole
//! object or fails. A multipart upload that fails is aborted before returning.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

use crate::contract::{Publisher, TransferError};

const MIB: u64 = 1024 * 1024;

pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 8 * MIB;
pub const DEFAULT_PART_SIZE: u64 = 8 * MIB;
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// S3 requires every part except the last to be at least 5 MiB.
pub const MIN_PART_SIZE: u64 = 5 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    pub multipart_threshold: u64,
    pub part_size: u64,
    pub max_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// One slice of a file in a multipart upload. Part numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: i32,
    pub offset: u64,
    pub len: u64,
}

/// Split `total_size` bytes into consecutive parts of `part_size` (the last may be shorter).
pub fn part_ranges(total_size: u64, part_size: u64) -> Vec<PartRange> {
    let part_size = part_size.max(MIN_PART_SIZE);
    let mut ranges = Vec::new();
    let mut offset = 0;
    let mut part_number = 1;
    while offset < total_size {
        let len = part_size.min(total_size - offset);
        ranges.push(PartRange {
            part_number,
            offset,
            len,
        });
        offset += len;
        part_number += 1;
    }
    ranges
}

pub struct S3Publisher {
    client: Client,
    bucket: String,
    transfer: TransferConfig,
}

impl S3Publisher {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            transfer: TransferConfig::default(),
        }
    }

    pub fn with_transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    fn store_error(key: &str, message: impl Into<String>) -> TransferError {
        TransferError::ObjectStore {
            key: key.to_string(),
            message: message.into(),
        }
    }

    async fn put_single(&self, local_path: &Path, key: &str) -> Result<(), TransferError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Self::store_error(key, format!("cannot read {}: {e}", local_path.display())))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| Self::store_error(key, DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn put_multipart(&self, local_path: &Path, key: &str, size: u64) -> Result<(), TransferError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::store_error(key, DisplayErrorContext(&e).to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Self::store_error(key, "create_multipart_upload returned no upload id"))?
            .to_string();

        match self.upload_parts(local_path, key, &upload_id, size).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                let result = self
                    .client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| Self::store_error(key, DisplayErrorContext(&e).to_string()));
                if let Err(e) = result {
                    self.abort(key, &upload_id).await;
                    return Err(e);
                }
                Ok(())
            }
            Err(e) => {
                self.abort(key, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        size: u64,
    ) -> Result<Vec<CompletedPart>, TransferError> {
        let ranges = part_ranges(size, self.transfer.part_size);
        let total_parts = ranges.len();
        let seen = AtomicU64::new(0);
        let seen = &seen;

        let mut parts: Vec<CompletedPart> = stream::iter(ranges)
            .map(|range| async move {
                let part = self.upload_part(local_path, key, upload_id, range).await?;
                let so_far = seen.fetch_add(range.len, Ordering::Relaxed) + range.len;
                debug!(
                    key,
                    part = range.part_number,
                    total_parts,
                    bytes = so_far,
                    size,
                    percent = %format!("{:.2}", so_far as f64 / size as f64 * 100.0),
                    "Uploaded part"
                );
                Ok::<_, TransferError>(part)
            })
            .buffer_unordered(self.transfer.max_concurrency.max(1))
            .try_collect()
            .await?;

        parts.sort_by_key(|part| part.part_number());
        Ok(parts)
    }

    async fn upload_part(
        &self,
        local_path: &Path,
        key: &str,
        upload_id: &str,
        range: PartRange,
    ) -> Result<CompletedPart, TransferError> {
        let io_error = |source| TransferError::Io {
            path: local_path.to_path_buf(),
            source,
        };
        let mut file = File::open(local_path).await.map_err(io_error)?;
        file.seek(SeekFrom::Start(range.offset))
            .await
            .map_err(io_error)?;
        let mut buf = vec![0u8; range.len as usize];
        file.read_exact(&mut buf).await.map_err(io_error)?;

        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(range.part_number)
            .body(ByteStream::from(buf))
            .send()
            .await
            .map_err(|e| Self::store_error(key, DisplayErrorContext(&e).to_string()))?;

        Ok(CompletedPart::builder()
            .set_e_tag(output.e_tag().map(str::to_string))
            .part_number(range.part_number)
            .build())
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        let aborted = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        match aborted {
            Ok(_) => warn!(key, upload_id, "Aborted multipart upload"),
            Err(e) => error!(key, upload_id, error = %DisplayErrorContext(&e), "Failed to abort multipart upload"),
        }
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    async fn publish(&self, local_path: &Path, destination_key: &str) -> Result<(), TransferError> {
        let size = fs::metadata(local_path)
            .await
            .map_err(|source| TransferError::Io {
                path: local_path.to_path_buf(),
                source,
            })?
            .len();

        let start = Instant::now();
        let multipart = size >= self.transfer.multipart_threshold;
        info!(
            bucket = %self.bucket,
            key = destination_key,
            path = %local_path.display(),
            size,
            multipart,
            "Uploading file to S3"
        );

        if multipart {
            self.put_multipart(local_path, destination_key, size).await?;
        } else {
            self.put_single(local_path, destination_key).await?;
        }

        info!(
            bucket = %self.bucket,
            key = destination_key,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Upload complete"
        );
        Ok(())
    }
}
