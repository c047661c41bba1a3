//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s3k-core.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CompletedMultipartUpload, CompletedPart,
    CreateBucketConfiguration, Delete, ObjectCannedAcl, ObjectIdentifier, StorageClass,
};
use tokio::io::AsyncReadExt;

use s3k_core::config::FALLBACK_REGION;
use s3k_core::traits::{ByteReader, DeleteReport, ListPage, ObjectBody, PutObjectRequest};
use s3k_core::{BucketInfo, CannedAcl, Error, ObjectInfo, ObjectStore, Result, S3Settings};

/// Bodies above this size are uploaded in parts
const MULTIPART_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Size of each uploaded part (S3 requires at least 5 MiB)
const PART_SIZE: u64 = 8 * 1024 * 1024;

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    region: String,
}

impl S3Client {
    /// Create a new S3 client from connection settings and a resolved region
    pub async fn new(settings: &S3Settings, region: String) -> Result<Self> {
        settings.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        {
            let credentials = aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None, // session token
                None, // expiry
                "s3k-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(settings.path_style)
            .build();

        tracing::debug!(region = %region, endpoint = ?settings.endpoint, "Created S3 client");

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            region,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Upload a large body in parts, holding at most one part in memory
    async fn put_multipart(&self, request: PutObjectRequest) -> Result<()> {
        let PutObjectRequest {
            bucket,
            key,
            body,
            content_type,
            storage_class,
            acl,
            ..
        } = request;
        let what = format!("s3://{bucket}/{key}");

        let created = self
            .inner
            .create_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .set_content_type(content_type)
            .set_storage_class(storage_class.map(|sc| StorageClass::from(sc.as_str())))
            .set_acl(acl.map(|acl| ObjectCannedAcl::from(acl.as_str())))
            .send()
            .await
            .map_err(|e| map_error(e, &what))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::General(format!("{what}: no upload id returned")))?
            .to_string();

        let parts = match self.upload_parts(&bucket, &key, &upload_id, body).await {
            Ok(parts) => parts,
            Err(e) => {
                let aborted = self
                    .inner
                    .abort_multipart_upload()
                    .bucket(&bucket)
                    .key(&key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                if let Err(abort) = aborted {
                    tracing::warn!(
                        target = %what,
                        error = %aws_sdk_s3::error::DisplayErrorContext(abort),
                        "Failed to abort multipart upload"
                    );
                }
                return Err(e);
            }
        };

        self.inner
            .complete_multipart_upload()
            .bucket(&bucket)
            .key(&key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_error(e, &what))?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut body: ByteReader,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut part_number = 1;
        loop {
            let mut chunk = Vec::with_capacity(PART_SIZE as usize);
            (&mut body).take(PART_SIZE).read_to_end(&mut chunk).await?;
            if chunk.is_empty() && !parts.is_empty() {
                break;
            }
            let last = (chunk.len() as u64) < PART_SIZE;

            let uploaded = self
                .inner
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(chunk.len() as i64)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| map_error(e, &format!("s3://{bucket}/{key}")))?;
            tracing::debug!(key = %key, part = part_number, "Uploaded part");

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            if last {
                break;
            }
            part_number += 1;
        }
        Ok(parts)
    }
}

/// Map an SDK failure to the core error taxonomy
fn map_error(err: impl std::error::Error, what: &str) -> Error {
    let message = aws_sdk_s3::error::DisplayErrorContext(err).to_string();
    classify(message, what)
}

fn classify(message: String, what: &str) -> Error {
    const NOT_FOUND: [&str; 3] = ["NoSuchKey", "NoSuchBucket", "NotFound"];
    const AUTH: [&str; 3] = ["AccessDenied", "InvalidAccessKeyId", "SignatureDoesNotMatch"];
    const CONFLICT: [&str; 3] = ["BucketAlreadyExists", "BucketAlreadyOwnedByYou", "BucketNotEmpty"];

    let has = |codes: &[&str]| codes.iter().any(|code| message.contains(code));
    if has(&NOT_FOUND) {
        Error::NotFound(what.to_string())
    } else if has(&AUTH) {
        Error::Auth(format!("{what}: {message}"))
    } else if has(&CONFLICT) {
        Error::Conflict(format!("{what}: {message}"))
    } else {
        Error::Network(message)
    }
}

fn timestamp(dt: &aws_smithy_types::DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(dt.secs()).ok()
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let response = self
            .inner
            .list_buckets()
            .send()
            .await
            .map_err(|e| map_error(e, "buckets"))?;

        Ok(response
            .buckets()
            .iter()
            .map(|b| BucketInfo {
                name: b.name().unwrap_or_default().to_string(),
                created: b.creation_date().and_then(timestamp),
            })
            .collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        let mut request = self.inner.list_objects_v2().bucket(bucket);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}/{prefix}")))?;

        let objects = response
            .contents()
            .iter()
            .map(|object| {
                let key = object.key().unwrap_or_default();
                let size = object.size().unwrap_or(0).max(0) as u64;
                let mut info = ObjectInfo::new(key, size);
                info.etag = object.e_tag().map(|e| e.trim_matches('"').to_string());
                info.storage_class = object.storage_class().map(|sc| sc.as_str().to_string());
                info.last_modified = object.last_modified().and_then(timestamp);
                info
            })
            .collect();

        Ok(ListPage {
            objects,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}/{key}")))?;

        let content_type = response.content_type().map(str::to_string);
        let storage_class = response.storage_class().map(|sc| sc.as_str().to_string());

        Ok(ObjectBody {
            reader: Box::pin(response.body.into_async_read()),
            content_type,
            storage_class,
        })
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        if request.size > MULTIPART_THRESHOLD {
            return self.put_multipart(request).await;
        }

        let PutObjectRequest {
            bucket,
            key,
            mut body,
            size,
            content_type,
            storage_class,
            acl,
        } = request;

        // Small bodies are sent in one sized request
        let mut data = Vec::with_capacity(size as usize);
        body.read_to_end(&mut data).await?;

        self.inner
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .content_length(data.len() as i64)
            .body(ByteStream::from(data))
            .set_content_type(content_type)
            .set_storage_class(storage_class.map(|sc| StorageClass::from(sc.as_str())))
            .set_acl(acl.map(|acl| ObjectCannedAcl::from(acl.as_str())))
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}/{key}")))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}/{key}")))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteReport> {
        if keys.is_empty() {
            return Ok(DeleteReport::default());
        }

        let objects = keys
            .iter()
            .map(|k| {
                ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .map_err(|e| Error::General(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| Error::General(e.to_string()))?;

        let response = self
            .inner
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}/")))?;

        let deleted = response
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(str::to_string))
            .collect();
        let failed = response
            .errors()
            .iter()
            .map(|e| {
                (
                    e.key().unwrap_or_default().to_string(),
                    e.message().or(e.code()).unwrap_or("unknown error").to_string(),
                )
            })
            .collect();

        Ok(DeleteReport { deleted, failed })
    }

    async fn create_bucket(&self, bucket: &str, acl: Option<CannedAcl>) -> Result<()> {
        let mut request = self.inner.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if self.region != FALLBACK_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        if let Some(acl) = acl {
            request = request.acl(BucketCannedAcl::from(acl.as_str()));
        }

        request
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}")))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_error(e, &format!("s3://{bucket}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify("NoSuchKey: The specified key does not exist.".into(), "s3://b/k");
        assert!(matches!(err, Error::NotFound(ref what) if what == "s3://b/k"));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_classify_auth() {
        for message in ["AccessDenied: nope", "InvalidAccessKeyId", "SignatureDoesNotMatch"] {
            assert_eq!(classify(message.into(), "x").exit_code(), 4, "{message}");
        }
    }

    #[test]
    fn test_classify_conflict() {
        let err = classify("BucketNotEmpty: The bucket you tried to delete is not empty".into(), "s3://b");
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_classify_falls_back_to_network() {
        let err = classify("dispatch failure: connection refused".into(), "s3://b");
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_acl_names_map_to_sdk_values() {
        for acl in CannedAcl::ALL {
            assert_eq!(ObjectCannedAcl::from(acl.as_str()).as_str(), acl.as_str());
        }
    }
}
