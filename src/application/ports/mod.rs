mod metadata_index;
mod object_store;

pub use metadata_index::{IndexError, MetadataIndex};
pub use object_store::{BlobReader, Inspectable, ObjectStore, ObjectWriter, StorageError};

#[cfg(test)]
pub use metadata_index::MockMetadataIndex;
#[cfg(test)]
pub use object_store::{MockInspectable, MockObjectStore};
