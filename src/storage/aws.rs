//! S3-compatible listing backend.
//!
//! Wraps `ListObjectsV2` on a single bucket.  The client is built once from
//! the static credentials, region and endpoint in [`StorageConfig`] and is
//! reused by every refresh.  Path-style addressing is always forced so that
//! non-AWS endpoints (R2, MinIO, ...) resolve the bucket correctly.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info};

use super::lister::{ListPage, ListedObject, ObjectLister};
use crate::config::StorageConfig;

/// Lister that pages through a bucket with `ListObjectsV2`.
pub struct S3Lister {
    /// AWS S3 SDK client.
    client: Client,
    /// Bucket being listed.
    bucket: String,
}

impl S3Lister {
    /// Create a lister for the configured bucket using static credentials.
    pub async fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let creds = aws_sdk_s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None, // session_token
            None, // expiry
            "bucket-index-env",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint_url)
            .credentials_provider(creds)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "S3 lister initialized: bucket={} endpoint={} region={}",
            config.bucket, config.endpoint_url, config.region
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

/// Convert a smithy timestamp to chrono, falling back to the epoch.
fn to_chrono(t: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    t.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default()
}

/// Continuation token for the next page, honouring the truncation flag.
fn next_token(is_truncated: Option<bool>, token: Option<&str>) -> Option<String> {
    if is_truncated == Some(true) {
        token.map(|s| s.to_string())
    } else {
        None
    }
}

impl ObjectLister for S3Lister {
    fn list_page(
        &self,
        continuation_token: Option<String>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ListPage>> + Send + '_>> {
        Box::pin(async move {
            debug!(
                "S3 list_objects_v2: bucket={} token={:?}",
                self.bucket, continuation_token
            );

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("list_objects_v2", DisplayErrorContext(e)))?;

            let objects = resp
                .contents()
                .iter()
                .filter_map(|obj| {
                    obj.key().map(|key| ListedObject {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0),
                        last_modified: to_chrono(obj.last_modified()),
                    })
                })
                .collect();

            Ok(ListPage {
                objects,
                next_continuation_token: next_token(
                    resp.is_truncated(),
                    resp.next_continuation_token(),
                ),
            })
        })
    }
}

// -- Tests -------------------------------------------------------------------
