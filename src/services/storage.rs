use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::core::config::Settings;
use crate::core::metrics;
use crate::db::models::StoredImage;

/// Object storage used for assignment files and solution images.
#[async_trait]
pub(crate) trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<StoredImage>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> anyhow::Result<String>;

    fn public_url(&self, key: &str) -> String;
}

/// S3-compatible store (R2, MinIO, AWS).
#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    client: Client,
    bucket: String,
    public_base: String,
}

impl StorageService {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let s3 = settings.s3();
        if s3.access_key.is_empty() || s3.secret_key.is_empty() {
            return Ok(None);
        }

        let creds = Credentials::new(
            s3.access_key.clone(),
            s3.secret_key.clone(),
            None,
            None,
            "tutoring-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(s3.endpoint.clone())
            .region(aws_config::Region::new(s3.region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config).force_path_style(true).build();
        let client = Client::from_conf(s3_config);

        let public_base = match s3.public_base_url.as_deref() {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{}/{}", s3.endpoint.trim_end_matches('/'), s3.bucket),
        };

        Ok(Some(Self { client, bucket: s3.bucket.clone(), public_base }))
    }

    pub(crate) fn shared(self) -> Arc<dyn BlobStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl BlobStore for StorageService {
    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<StoredImage> {
        let size = bytes.len() as i64;
        let sha256 = hex::encode(Sha256::digest(&bytes));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        Ok(StoredImage {
            key: key.to_string(),
            url: self.public_url(key),
            content_type: content_type.to_string(),
            size,
            sha256,
        })
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.client.delete_object().bucket(&self.bucket).key(key).send().await?;
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> anyhow::Result<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await?;

        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum DataUriError {
    #[error("payload is not a base64 data URI")]
    NotDataUri,
    #[error("unsupported media type {0}")]
    UnsupportedType(String),
    #[error("invalid base64 payload")]
    InvalidBase64,
    #[error("image is empty")]
    Empty,
    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

#[derive(Debug)]
pub(crate) struct DecodedImage {
    pub(crate) content_type: String,
    pub(crate) extension: &'static str,
    pub(crate) bytes: Vec<u8>,
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Decodes `data:image/<type>;base64,<payload>`.
pub(crate) fn decode_image_data_uri(
    raw: &str,
    max_bytes: usize,
) -> Result<DecodedImage, DataUriError> {
    let rest = raw.trim().strip_prefix("data:").ok_or(DataUriError::NotDataUri)?;
    let (meta, payload) = rest.split_once(',').ok_or(DataUriError::NotDataUri)?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or(DataUriError::NotDataUri)?
        .trim()
        .to_ascii_lowercase();

    let extension = image_extension(&content_type)
        .ok_or_else(|| DataUriError::UnsupportedType(content_type.clone()))?;

    // base64 expands 3 bytes into 4 characters
    if payload.len() / 4 * 3 > max_bytes.saturating_add(3) {
        return Err(DataUriError::TooLarge { limit: max_bytes });
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| DataUriError::InvalidBase64)?;

    if bytes.is_empty() {
        return Err(DataUriError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(DataUriError::TooLarge { limit: max_bytes });
    }

    Ok(DecodedImage { content_type, extension, bytes })
}

/// Deletes every key as an independent task. Failures are logged once in aggregate and
/// never abort the caller; returns how many deletions failed.
pub(crate) async fn purge_blobs(
    store: Arc<dyn BlobStore>,
    keys: Vec<String>,
    context: &'static str,
) -> usize {
    if keys.is_empty() {
        return 0;
    }

    let total = keys.len();
    let mut tasks = JoinSet::new();
    for key in keys {
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            let result = store.delete(&key).await;
            (key, result)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((key, Err(err))) => failed.push(format!("{key}: {err}")),
            Err(err) => failed.push(format!("task: {err}")),
        }
    }

    if !failed.is_empty() {
        tracing::warn!(
            context,
            failed = failed.len(),
            total,
            errors = %failed.join("; "),
            "Blob cleanup finished with failures"
        );
        metrics::record_blob_failures("delete", failed.len());
    }
    failed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, MemoryBlobStore};

    const PNG_1X1: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_image_data_uri(PNG_1X1, 1024).expect("decode");
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn rejects_non_image_and_garbage_payloads() {
        assert_eq!(
            decode_image_data_uri("https://example.com/a.png", 1024).unwrap_err(),
            DataUriError::NotDataUri
        );
        assert_eq!(
            decode_image_data_uri("data:application/pdf;base64,JVBERi0=", 1024).unwrap_err(),
            DataUriError::UnsupportedType("application/pdf".to_string())
        );
        assert_eq!(
            decode_image_data_uri("data:image/png;base64,@@@@", 1024).unwrap_err(),
            DataUriError::InvalidBase64
        );
        assert_eq!(
            decode_image_data_uri(PNG_1X1, 16).unwrap_err(),
            DataUriError::TooLarge { limit: 16 }
        );
    }

    #[tokio::test]
    async fn purge_reports_failures_without_stopping() {
        let store = Arc::new(MemoryBlobStore::default());
        for key in ["a", "b", "c"] {
            store.upload(key, "image/png", vec![1]).await.expect("seed");
        }
        store.fail_deletes_for("b");

        let failed = purge_blobs(
            store.clone(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            "test",
        )
        .await;

        assert_eq!(failed, 1);
        assert_eq!(store.keys(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn presign_put_returns_signed_url() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        test_support::set_test_storage_env();

        let settings = Settings::load().expect("settings");
        let storage = StorageService::from_settings(&settings)
            .await
            .expect("storage")
            .expect("storage enabled");

        let key = "assignments/test/worksheet.pdf";
        let put_url = storage
            .presign_put(key, "application/pdf", Duration::from_secs(300))
            .await
            .expect("presign put");

        assert!(put_url.contains("worksheet.pdf"));
        assert!(put_url.contains("X-Amz-Signature"));
        assert_eq!(
            storage.public_url(key),
            "https://files.example.test/assignments/test/worksheet.pdf"
        );
    }
}
