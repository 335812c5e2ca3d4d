use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::application::ports::{IndexError, MetadataIndex};
use crate::domain::value_objects::{ObjectKey, ObjectMetadata};

/// Hash of live keys (`key -> 1`)
const KNOWN_OBJECTS: &str = "files";
/// Set of every key ever registered
const CATALOG: &str = "catalog";
/// Prefix of the per-object record hashes
const META_PREFIX: &str = "meta";

/// KEYS: live hash, record, catalog. ARGV: object key, then field/value
/// pairs. `HSETNX` claims the key so a live record is left untouched.
const RECORD_UPLOAD_SCRIPT: &str = r#"
if redis.call('HSETNX', KEYS[1], ARGV[1], 1) == 0 then
    return 0
end
redis.call('DEL', KEYS[2])
redis.call('HSET', KEYS[2], unpack(ARGV, 2))
redis.call('SADD', KEYS[3], ARGV[1])
return 1
"#;

fn meta_key(key: &str) -> String {
    format!("{}.{}", META_PREFIX, key)
}

/// [`MetadataIndex`] backed by a redis server.
///
/// Multi-key updates go through `MULTI`/`EXEC` pipelines or a server-side
/// script; counters use `HINCRBY`, so every operation is atomic on the
/// server side.
#[derive(Clone)]
pub struct RedisMetadataIndex {
    conn: MultiplexedConnection,
    record_script: Arc<redis::Script>,
}

impl RedisMetadataIndex {
    /// Connect and verify the server answers `PING`
    pub async fn connect(url: &str) -> Result<Self, IndexError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let index = Self {
            conn,
            record_script: Arc::new(redis::Script::new(RECORD_UPLOAD_SCRIPT)),
        };
        index.ping().await?;
        info!("Connected to redis metadata index");
        Ok(index)
    }
}

#[async_trait]
impl MetadataIndex for RedisMetadataIndex {
    async fn record_upload(&self, metadata: &ObjectMetadata) -> Result<bool, IndexError> {
        let mut conn = self.conn.clone();

        let mut invocation = self.record_script.prepare_invoke();
        invocation
            .key(KNOWN_OBJECTS)
            .key(meta_key(&metadata.filename))
            .key(CATALOG)
            .arg(&metadata.filename);
        for (field, value) in metadata.to_fields() {
            invocation.arg(field).arg(value);
        }

        let recorded: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(recorded == 1)
    }

    async fn is_known(&self, key: &ObjectKey) -> Result<bool, IndexError> {
        let mut conn = self.conn.clone();
        let exists: bool = redis::cmd("HEXISTS")
            .arg(KNOWN_OBJECTS)
            .arg(key.as_hex())
            .query_async(&mut conn)
            .await?;
        Ok(exists)
    }

    async fn increment_downloads(&self, key: &ObjectKey) -> Result<u64, IndexError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("HINCRBY")
            .arg(meta_key(key.as_hex()))
            .arg("download_count")
            .arg(1)
            .query_async(&mut conn)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn mark_removed(&self, key: &ObjectKey, at: DateTime<Utc>) -> Result<(), IndexError> {
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .cmd("HDEL")
            .arg(KNOWN_OBJECTS)
            .arg(key.as_hex())
            .ignore()
            .cmd("HSET")
            .arg(meta_key(key.as_hex()))
            .arg("remove_date")
            .arg(at.timestamp())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ObjectMetadata>, IndexError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("SMEMBERS")
            .arg(CATALOG)
            .query_async(&mut conn)
            .await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let fields: HashMap<String, String> = redis::cmd("HGETALL")
                .arg(meta_key(&key))
                .query_async(&mut conn)
                .await?;
            if fields.is_empty() {
                continue;
            }

            let record = ObjectMetadata::from_fields(fields)
                .map_err(|source| IndexError::Corrupt { key, source })?;
            records.push(record);
        }

        Ok(records)
    }

    async fn ping(&self) -> Result<(), IndexError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
