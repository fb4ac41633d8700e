use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream, Client};
use axum::async_trait;

use crate::{
    error::{Error, Result},
    session::Session,
};

/// Anything that can store `body` under `(bucket, key)`.
#[async_trait]
pub trait ObjectWriter: Clone + std::marker::Send + std::marker::Sync + 'static {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> anyhow::Result<()>;
}

#[async_trait]
impl ObjectWriter for Client {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> anyhow::Result<()> {
        Client::put_object(self)
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct S3<W = Client> {
    writer: W,
}

impl S3<Client> {
    pub async fn connect(session: &Session) -> Result<Self> {
        let config = session.load().await?;
        Ok(Self::new(Client::from_conf(config)))
    }

    pub async fn from_env() -> Result<Self> {
        Self::connect(&Session::from_env()?).await
    }
}

impl<W: ObjectWriter> S3<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes `body` to `bucket`/`key`, replacing whatever was stored there.
    pub async fn put(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        let body = body.into();
        let size = body.len();
        tracing::debug!("put object (bucket: {}, key: {}, size: {})", bucket, key, size);

        self.writer
            .put_object(bucket, key, body)
            .await
            .map_err(|err| {
                tracing::warn!("put object failed (bucket: {}, key: {}): {:#}", bucket, key, err);
                Error::Put {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: format!("{:#}", err),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infras::{emulator::Emulator, memory::ObjectStoreForMemory};
    use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
    use std::sync::Arc;

    fn create_memory_client() -> (S3<ObjectStoreForMemory>, ObjectStoreForMemory) {
        let store = ObjectStoreForMemory::new();
        store.create_bucket("test").unwrap();
        (S3::new(store.clone()), store)
    }

    async fn create_bucket(client: &Client, bucket: &str) {
        client
            .create_bucket()
            .bucket(bucket)
            .create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::ApNortheast1)
                    .build(),
            )
            .send()
            .await
            .unwrap();
    }

    async fn get_object(client: &Client, bucket: &str, key: &str) -> Vec<u8> {
        let output = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .unwrap();
        output.body.collect().await.unwrap().into_bytes().to_vec()
    }

    async fn start_emulator() -> (Emulator, S3, Client) {
        let emulator = Emulator::start().await.unwrap();
        let session = emulator.session();
        let s3 = S3::connect(&session).await.unwrap();
        let client = Client::from_conf(session.load().await.unwrap());
        create_bucket(&client, "test").await;
        (emulator, s3, client)
    }

    #[tokio::test]
    async fn should_put_object_to_memory() {
        let (s3, store) = create_memory_client();

        s3.put("test", "alice", "Alice in Wonderland").await.unwrap();

        assert_eq!(
            store.get("test", "alice").unwrap(),
            b"Alice in Wonderland".to_vec()
        );
    }

    #[tokio::test]
    async fn should_put_empty_object_to_memory() {
        let (s3, store) = create_memory_client();

        s3.put("test", "empty", Vec::new()).await.unwrap();

        assert!(store.get("test", "empty").unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_overwrite_object_in_memory() {
        let (s3, store) = create_memory_client();

        s3.put("test", "alice", "first").await.unwrap();
        s3.put("test", "alice", "second").await.unwrap();

        assert_eq!(store.get("test", "alice").unwrap(), b"second".to_vec());
    }

    #[tokio::test]
    async fn should_wrap_error_with_bucket_and_key() {
        let (s3, _) = create_memory_client();

        let err = s3.put("missing", "alice", "Alice").await.unwrap_err();

        assert!(matches!(
            &err,
            Error::Put { bucket, key, .. } if bucket == "missing" && key == "alice"
        ));
        assert_eq!(
            err.to_string(),
            "Failed to add object to storage (bucket: missing, key: alice): \
             NoSuchBucket: The specified bucket does not exist (bucket: missing)"
        );
    }

    #[tokio::test]
    async fn should_put_concurrently() {
        let (s3, store) = create_memory_client();
        let s3 = Arc::new(s3);

        let handles = (0..16)
            .map(|i| {
                let s3 = s3.clone();
                tokio::spawn(async move {
                    s3.put("test", &format!("key-{}", i), format!("body-{}", i))
                        .await
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..16 {
            assert_eq!(
                store.get("test", &format!("key-{}", i)).unwrap(),
                format!("body-{}", i).into_bytes()
            );
        }
    }

    #[tokio::test]
    async fn should_put_object_through_sdk() {
        let (_emulator, s3, client) = start_emulator().await;

        let expected = "Alice in Wonderland";
        s3.put("test", "alice", expected).await.unwrap();

        let actual = get_object(&client, "test", "alice").await;
        assert_eq!(String::from_utf8(actual).unwrap(), expected);
    }

    #[tokio::test]
    async fn should_put_empty_object_through_sdk() {
        let (_emulator, s3, client) = start_emulator().await;

        s3.put("test", "empty", Vec::new()).await.unwrap();

        assert!(get_object(&client, "test", "empty").await.is_empty());
    }

    #[tokio::test]
    async fn should_overwrite_object_through_sdk() {
        let (emulator, s3, client) = start_emulator().await;

        s3.put("test", "alice", "first").await.unwrap();
        s3.put("test", "alice", "second").await.unwrap();

        assert_eq!(get_object(&client, "test", "alice").await, b"second".to_vec());
        assert_eq!(emulator.store().get("test", "alice").unwrap(), b"second".to_vec());
    }

    #[tokio::test]
    async fn should_fail_on_missing_bucket_through_sdk() {
        let (_emulator, s3, _) = start_emulator().await;

        let err = s3.put("missing", "alice", "Alice").await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with(
            "Failed to add object to storage (bucket: missing, key: alice): "
        ));
        assert!(message.contains("NoSuchBucket"), "{}", message);
    }

    /// Needs an S3 emulator such as localstack listening on S3_ENDPOINT_URL
    /// (default http://localhost:4566), e.g. started with docker compose.
    #[cfg(feature = "localstack-tests")]
    #[tokio::test]
    async fn should_put_object_to_localstack() {
        use crate::session::StaticCredentials;

        let endpoint_url = std::env::var("S3_ENDPOINT_URL")
            .unwrap_or_else(|_| "http://localhost:4566".to_string());
        let session = Session {
            region: Some("ap-northeast-1".to_string()),
            endpoint_url: Some(endpoint_url),
            credentials: Some(StaticCredentials::new("dummy", "dummy")),
            force_path_style: true,
        };
        let s3 = S3::connect(&session).await.unwrap();
        let client = Client::from_conf(session.load().await.unwrap());

        // Bucket names only allow lowercase letters and digits here
        let alphabet = ('a'..='z').chain('0'..='9').collect::<Vec<char>>();
        let bucket = format!("test-{}", nanoid::nanoid!(12, &alphabet));
        create_bucket(&client, &bucket).await;

        let expected = "Alice in Wonderland";
        s3.put(&bucket, "alice", expected).await.unwrap();

        let actual = get_object(&client, &bucket, "alice").await;
        assert_eq!(String::from_utf8(actual).unwrap(), expected);
    }
}
