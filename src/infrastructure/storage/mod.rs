mod content_hasher;
mod indexed_store;
mod local_filesystem_store;
mod memory_store;
mod path_builder;

pub use content_hasher::{ContentHasher, DigestSet, HashAccumulator, BUFFER_SIZE};
pub use indexed_store::IndexedFilesystemStore;
pub use local_filesystem_store::{FsObjectWriter, LocalFilesystemStore};
pub use memory_store::InMemoryObjectStore;
pub use path_builder::PathBuilder;
