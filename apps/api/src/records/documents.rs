//! Resume document storage in S3 / MinIO.

use aws_sdk_s3::primitives::ByteStream;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct DocumentStore {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl DocumentStore {
    pub fn new(s3: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    /// Stores a resume PDF under a fresh key and returns the key.
    pub async fn put_resume(&self, data: bytes::Bytes) -> anyhow::Result<String> {
        let key = resume_key(Uuid::new_v4());
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/pdf")
            .body(ByteStream::from(data))
            .send()
            .await?;
        info!("Uploaded resume to s3://{}/{}", self.bucket, key);
        Ok(key)
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.s3
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

fn resume_key(id: Uuid) -> String {
    format!("resumes/{id}.pdf")
}
