mod memory_index;
mod redis_index;

pub use memory_index::InMemoryMetadataIndex;
pub use redis_index::RedisMetadataIndex;
