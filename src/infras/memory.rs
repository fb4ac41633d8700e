use axum::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use thiserror::Error;

use crate::infras::s3::ObjectWriter;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("NoSuchBucket: The specified bucket does not exist (bucket: {0})")]
    NoSuchBucket(String),
    #[error("NoSuchKey: The specified key does not exist (bucket: {bucket}, key: {key})")]
    NoSuchKey { bucket: String, key: String },
    #[error("BucketAlreadyOwnedByYou: Your previous request to create the named bucket succeeded and you already own it (bucket: {0})")]
    BucketAlreadyOwnedByYou(String),
}

impl StoreError {
    /// S3 error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket(_) => "NoSuchBucket",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::BucketAlreadyOwnedByYou(_) => "BucketAlreadyOwnedByYou",
        }
    }
}

type Objects = HashMap<String, Vec<u8>>;
type BucketDatas = HashMap<String, Objects>;

#[derive(Debug, Clone, Default)]
pub struct ObjectStoreForMemory {
    store: Arc<RwLock<BucketDatas>>,
}

impl ObjectStoreForMemory {
    pub fn new() -> Self {
        Self {
            store: Arc::default(),
        }
    }

    fn write_store_ref(&self) -> RwLockWriteGuard<'_, BucketDatas> {
        self.store.write().unwrap()
    }

    fn read_store_ref(&self) -> RwLockReadGuard<'_, BucketDatas> {
        self.store.read().unwrap()
    }

    pub fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        let mut store = self.write_store_ref();
        if store.contains_key(bucket) {
            return Err(StoreError::BucketAlreadyOwnedByYou(bucket.to_string()));
        }
        store.insert(bucket.to_string(), Objects::new());
        Ok(())
    }

    pub fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let mut store = self.write_store_ref();
        let objects = store
            .get_mut(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    pub fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let store = self.read_store_ref();
        let objects = store
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket(bucket.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchKey {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl ObjectWriter for ObjectStoreForMemory {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> anyhow::Result<()> {
        self.put(bucket, key, body)?;
        Ok(())
    }
}
