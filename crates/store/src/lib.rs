//! # anchora snapshot store
//!
//! Single-file container for an immutable retrieval snapshot: an ordered
//! chunk directory, a row-major vector blob, an opaque ANN-index blob, and a
//! trailing metadata record. The read side memory-maps the file and hands out
//! zero-copy views wherever the stored layout allows it; the write side
//! serialises the whole bundle to a temporary file and renames it into place,
//! so an existing container is never left half-written.
//!
//! ## Layout
//!
//! A fixed 128-byte header carries a magic, a format version, the snapshot
//! hash, and `(offset, len)` pairs for the four variable regions:
//!
//! ```text
//! ┌────────┬─────────────────┬─────────────┬────────────┬───────────┐
//! │ header │ chunk directory │ vector blob │ index blob │ metadata  │
//! └────────┴─────────────────┴─────────────┴────────────┴───────────┘
//! ```
//!
//! The chunk directory is a bincode-encoded `Vec<ChunkRecord>`. The vector
//! region starts at a 64-byte-aligned offset so raw `f32` rows can be viewed
//! in place; compressed layouts (`f16`, `i8`, optionally zstd on top) are
//! decompressed into an owned matrix exactly once when the container is
//! opened. The metadata region is a JSON [`SnapshotMetadata`] record.
//!
//! ## Example
//!
//! ```no_run
//! use store::{ChunkRecord, CompressionSpec, Container, SnapshotMetadata};
//!
//! # fn demo() -> Result<(), store::StoreError> {
//! let chunks = vec![ChunkRecord::new(0, "src/auth.rs", 1, 20, None, "fn login() {}")];
//! let vectors = vec![1.0f32, 0.0, 0.0]; // one row, dimension 3
//! let hash = Container::write_snapshot(
//!     "data/context_vectors.acx",
//!     &chunks,
//!     &vectors,
//!     3,
//!     b"index-bytes",
//!     "hash-sin-384",
//!     CompressionSpec::default(),
//! )?;
//! let container = Container::open("data/context_vectors.acx", 3)?;
//! assert_eq!(container.snapshot().metadata.snapshot_hash, hash);
//! # Ok(())
//! # }
//! ```

mod chunk;
mod compression;
mod container;
mod error;

pub use chunk::ChunkRecord;
pub use compression::{CompressionDescriptor, CompressionSpec, Precision, PrecisionSpec};
pub use container::{Container, SnapshotMetadata, SnapshotView, VectorMatrix};
pub use error::{StoreError, StoreResult};

/// Bump whenever the on-disk container layout changes.
pub const CONTAINER_FORMAT_VERSION: u32 = 1;

/// Default file extension for snapshot containers.
pub const CONTAINER_EXTENSION: &str = "acx";
