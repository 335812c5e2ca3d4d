use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};

use crate::application::ports::{IndexError, MetadataIndex};
use crate::domain::value_objects::{ObjectKey, ObjectMetadata};

/// In-process [`MetadataIndex`].
///
/// `records` holds every record ever registered (tombstones included) and
/// `known` the keys that are currently live.
#[derive(Debug, Default)]
pub struct InMemoryMetadataIndex {
    records: DashMap<String, ObjectMetadata>,
    known: DashSet<String>,
}

impl InMemoryMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &ObjectKey) -> Option<ObjectMetadata> {
        self.records.get(key.as_hex()).map(|r| r.clone())
    }
}

#[async_trait]
impl MetadataIndex for InMemoryMetadataIndex {
    async fn record_upload(&self, metadata: &ObjectMetadata) -> Result<bool, IndexError> {
        // The record's shard lock serialises this with concurrent uploads
        // and download counts for the same key
        match self.records.entry(metadata.filename.clone()) {
            Entry::Occupied(_) if self.known.contains(&metadata.filename) => Ok(false),
            Entry::Occupied(mut entry) => {
                entry.insert(metadata.clone());
                self.known.insert(metadata.filename.clone());
                Ok(true)
            }
            Entry::Vacant(entry) => {
                let _record = entry.insert(metadata.clone());
                self.known.insert(metadata.filename.clone());
                Ok(true)
            }
        }
    }

    async fn is_known(&self, key: &ObjectKey) -> Result<bool, IndexError> {
        Ok(self.known.contains(key.as_hex()))
    }

    async fn increment_downloads(&self, key: &ObjectKey) -> Result<u64, IndexError> {
        let mut record = self
            .records
            .get_mut(key.as_hex())
            .ok_or_else(|| IndexError::Backend(format!("no metadata record for {}", key)))?;
        record.download_count += 1;
        Ok(record.download_count)
    }

    async fn mark_removed(&self, key: &ObjectKey, at: DateTime<Utc>) -> Result<(), IndexError> {
        self.known.remove(key.as_hex());
        if let Some(mut record) = self.records.get_mut(key.as_hex()) {
            record.remove_date = Some(at);
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ObjectMetadata>, IndexError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }

    async fn ping(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> ObjectKey {
        ObjectKey::from_hex(c.to_string().repeat(64)).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let index = InMemoryMetadataIndex::new();
        let k = key('a');
        let meta = ObjectMetadata::uploaded(k.as_hex(), 42, Utc::now());

        assert!(!index.is_known(&k).await.unwrap());
        index.record_upload(&meta).await.unwrap();
        assert!(index.is_known(&k).await.unwrap());

        assert_eq!(index.increment_downloads(&k).await.unwrap(), 1);
        assert_eq!(index.increment_downloads(&k).await.unwrap(), 2);

        index.mark_removed(&k, Utc::now()).await.unwrap();
        assert!(!index.is_known(&k).await.unwrap());

        let record = index.record(&k).unwrap();
        assert_eq!(record.download_count, 2);
        assert!(record.is_removed());
        assert_eq!(index.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reupload_after_removal_clears_tombstone() {
        let index = InMemoryMetadataIndex::new();
        let k = key('b');
        index
            .record_upload(&ObjectMetadata::uploaded(k.as_hex(), 1, Utc::now()))
            .await
            .unwrap();
        index.mark_removed(&k, Utc::now()).await.unwrap();
        index
            .record_upload(&ObjectMetadata::uploaded(k.as_hex(), 1, Utc::now()))
            .await
            .unwrap();

        assert!(index.is_known(&k).await.unwrap());
        assert!(!index.record(&k).unwrap().is_removed());
    }

    #[tokio::test]
    async fn test_record_upload_keeps_live_record() {
        let index = InMemoryMetadataIndex::new();
        let k = key('d');
        let meta = ObjectMetadata::uploaded(k.as_hex(), 7, Utc::now());

        assert!(index.record_upload(&meta).await.unwrap());
        index.increment_downloads(&k).await.unwrap();
        assert!(!index.record_upload(&meta).await.unwrap());

        assert_eq!(index.record(&k).unwrap().download_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_uploads_record_once() {
        let index = std::sync::Arc::new(InMemoryMetadataIndex::new());
        let k = key('e');

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let index = std::sync::Arc::clone(&index);
                let meta = ObjectMetadata::uploaded(k.as_hex(), 3, Utc::now());
                tokio::spawn(async move { index.record_upload(&meta).await.unwrap() })
            })
            .collect();

        let mut written = 0;
        for handle in handles {
            if handle.await.unwrap() {
                written += 1;
            }
        }
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_increment_unknown_key_fails() {
        let index = InMemoryMetadataIndex::new();
        assert!(index.increment_downloads(&key('c')).await.is_err());
    }
}
