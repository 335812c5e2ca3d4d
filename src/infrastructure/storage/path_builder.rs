use std::path::{Path, PathBuf};

use crate::domain::value_objects::ObjectKey;

const TEMP_DIR: &str = "temp";

/// Utility for generating storage paths
#[derive(Debug, Clone)]
pub struct PathBuilder {
    root: PathBuf,
}

impl PathBuilder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory for in-progress writers: /root/temp
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// Generate temp upload path: /root/temp/{uuid}
    pub fn temp_path(&self, id: uuid::Uuid) -> PathBuf {
        self.temp_dir().join(id.to_string())
    }

    /// Shard directory: /root/{prefix}
    pub fn shard_dir(&self, prefix: &str) -> PathBuf {
        self.root.join(prefix)
    }

    /// Generate final content-addressable path: /root/{prefix}/{key}
    pub fn final_path(&self, key: &ObjectKey) -> PathBuf {
        self.shard_dir(key.prefix()).join(key.as_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_path_is_sharded_by_prefix() {
        let builder = PathBuilder::new(PathBuf::from("/data"));
        let key = ObjectKey::from_hex(format!("ab12{}", "0".repeat(60))).unwrap();

        assert_eq!(
            builder.final_path(&key),
            PathBuf::from("/data/ab").join(key.as_hex())
        );
    }

    #[test]
    fn test_temp_path_under_scratch_dir() {
        let builder = PathBuilder::new(PathBuf::from("/data"));
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            builder.temp_path(id),
            PathBuf::from("/data/temp").join(id.to_string())
        );
    }
}
