//! # content_vault - Content-Addressable Object Store
//!
//! Blobs are stored under the hex digest of their content and served over
//! HTTP, with per-address admission control in front of every object route.
//!
//! ## Architecture Layers
//!
//! - **Domain**: Value objects (object keys, hash algorithms, metadata records)
//! - **Application**: Ports, use cases and the per-address rate limiter
//! - **Infrastructure**: Storage backends (memory, filesystem, indexed) and
//!   metadata indexes (in-process, redis)
//! - **API**: HTTP handlers and middleware
//!
//! ## Example Usage
//!
//! ```no_run
//! use content_vault::application::ports::ObjectStore;
//! use content_vault::infrastructure::storage::InMemoryObjectStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryObjectStore::new();
//! let mut writer = store.new_object_writer().await?;
//! writer.write(b"hello world").await?;
//! let key = writer.save().await?;
//! assert_eq!(key.prefix(), "b9");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types explicitly to avoid ambiguity
pub use api::errors as api_errors;
pub use application::{dto, ports, use_cases};
pub use config::Config;
pub use domain::errors as domain_errors;
pub use domain::value_objects;
