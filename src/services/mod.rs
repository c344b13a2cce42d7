// src/services/mod.rs

pub mod blob_cache; // durable id-keyed image payloads (filesystem only)
pub mod generation; // remote text/image service behind the RemoteApi seam
pub mod record_store; // the ONLY SQLite writer
pub mod reducer; // pure size-reduction transform for stories
pub mod resolver; // display-time image resolution with a session memo

// Public API
pub use blob_cache::{BlobCache, CachedImage};
pub use generation::{GenerationClient, ImageOutcome, RemoteApi, TextReply};
pub use record_store::RecordStore;
pub use resolver::ImageResolver;
