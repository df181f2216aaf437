use crate::storage::Bucket;
use crate::util::BoxResult;
use rusoto_core::{Region, RusotoError};
use rusoto_s3::{
    DeleteObjectRequest, GetObjectError, GetObjectRequest, PutObjectRequest, S3Client, S3,
};
use tokio::io::AsyncReadExt;

/// One S3 bucket. Credentials come from the default provider chain.
pub struct S3Bucket {
    client: S3Client,
    bucket: String,
}

impl S3Bucket {
    pub fn new(region: Region, bucket: &str) -> Self {
        S3Bucket {
            client: S3Client::new(region),
            bucket: bucket.to_string(),
        }
    }

    /// Unknown region names fall back to us-east-1.
    pub fn from_region_name(region: &str, bucket: &str) -> Self {
        let region = region.parse::<Region>().unwrap_or_else(|_| {
            log::warn!("unknown region {}, using {}", region, Region::UsEast1.name());
            Region::UsEast1
        });
        Self::new(region, bucket)
    }
}

#[async_trait::async_trait]
impl Bucket for S3Bucket {
    async fn get(&self, key: &str) -> BoxResult<Option<Vec<u8>>> {
        let input = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };
        let output = match self.client.get_object(input).await {
            Ok(o) => o,
            Err(RusotoError::Service(GetObjectError::NoSuchKey(_))) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::new();
        if let Some(body) = output.body {
            body.into_async_read().read_to_end(&mut buf).await?;
        }
        log::debug!("read s3://{}/{} ({} bytes)", self.bucket, key, buf.len());
        Ok(Some(buf))
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> BoxResult<()> {
        log::debug!("writing s3://{}/{} ({} bytes)", self.bucket, key, body.len());
        let input = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_type: Some(content_type.to_string()),
            body: Some(body.into()),
            ..Default::default()
        };
        self.client.put_object(input).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> BoxResult<()> {
        log::debug!("deleting s3://{}/{}", self.bucket, key);
        let input = DeleteObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            ..Default::default()
        };
        self.client.delete_object(input).await?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
