//! Storage fabric for the Hansard knowledge base
//!
//! Three stores with deliberately small surfaces:
//! - [`ObjectStore`]: file-backed JSON artifacts under date-partitioned keys
//! - [`KvStore`]: SQLite-backed TTL cache; writes are advisory
//! - [`VectorIndex`]: LanceDB tables for moment and chunk embeddings

mod error;
mod kv;
mod object;
mod vector;

pub use error::StoreError;
pub use kv::KvStore;
pub use object::{keys, ObjectStore};
pub use vector::{VectorHit, VectorIndex, VectorRecord, CHUNKS_TABLE, MOMENTS_TABLE};
