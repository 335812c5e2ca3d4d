mod hash_algorithm;
mod object_key;
mod object_metadata;

pub use hash_algorithm::HashAlgorithm;
pub use object_key::ObjectKey;
pub use object_metadata::ObjectMetadata;
