//! Polytrack Storage Library
//!
//! Object-store abstraction used by the transcoding pipeline: download one
//! source object to a local file, upload single files, and upload a finished
//! output tree recursively. Backends: S3-compatible stores via `object_store`
//! and a local filesystem store for tests and single-node deployments.
//!
//! Clients are constructed explicitly and injected; there is no process-wide
//! global store handle.

#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
