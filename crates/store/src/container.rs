//! The container file: header parsing, mapped reads, atomic snapshot writes.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::chunk::ChunkRecord;
use crate::compression::{self, CompressionDescriptor, CompressionSpec};
use crate::error::{StoreError, StoreResult};
use crate::CONTAINER_FORMAT_VERSION;

const MAGIC: &[u8; 4] = b"ACRX";
const HEADER_LEN: usize = 128;
const VECTOR_ALIGN: usize = 64;
const NORM_TOLERANCE: f32 = 1e-4;

/// Metadata record stored as JSON in the trailing region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Hex sha-256 over the chunk, vector, and index regions.
    pub snapshot_hash: String,
    /// Number of chunks (== number of vector rows).
    pub chunk_count: usize,
    /// Vector dimension D.
    pub dimension: usize,
    /// Identifier of the model that produced the vector rows. Query-time
    /// embedding must agree with it or the index is unusable.
    pub embedding_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionDescriptor>,
}

/// Row-major vector matrix, either borrowed from the map or owned after
/// decompression.
pub enum VectorMatrix<'a> {
    Mapped(&'a [f32]),
    Owned(&'a [f32]),
}

impl<'a> VectorMatrix<'a> {
    pub fn as_slice(&self) -> &'a [f32] {
        match self {
            VectorMatrix::Mapped(s) | VectorMatrix::Owned(s) => s,
        }
    }
}

/// Zero-copy view over an opened container.
pub struct SnapshotView<'a> {
    pub chunks: &'a [ChunkRecord],
    pub vectors: VectorMatrix<'a>,
    pub index_bytes: &'a [u8],
    pub metadata: &'a SnapshotMetadata,
}

impl SnapshotView<'_> {
    pub fn dimension(&self) -> usize {
        self.metadata.dimension
    }

    /// Row `i` of the vector blob: the embedding of `chunks[i]`.
    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let d = self.metadata.dimension;
        let data = self.vectors.as_slice();
        let start = i.checked_mul(d)?;
        data.get(start..start + d)
    }
}

enum VectorStorage {
    /// Raw f32 region, viewed straight from the map.
    Mapped { offset: usize, len: usize },
    /// Decompressed once at open time.
    Owned(Vec<f32>),
}

/// An opened, read-only snapshot container. Dropping it unmaps the file.
pub struct Container {
    path: PathBuf,
    mmap: Mmap,
    chunks: Vec<ChunkRecord>,
    vectors: VectorStorage,
    index_range: (usize, usize),
    metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    chunk_dir: (usize, usize),
    vector: (usize, usize),
    index: (usize, usize),
    meta: (usize, usize),
}

impl Container {
    /// Memory-map and validate a container file.
    ///
    /// `expected_dimension` is the dimension the engine will embed queries
    /// with; a disagreeing container is refused with
    /// [`StoreError::DimensionMismatch`] rather than producing garbage
    /// similarities later.
    pub fn open(path: impl AsRef<Path>, expected_dimension: usize) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // Safety: the container is replaced only by atomic rename; the mapped
        // file is never mutated in place.
        let mmap = unsafe { Mmap::map(&file)? };

        let header = parse_header(&mmap)?;

        let metadata: SnapshotMetadata =
            serde_json::from_slice(region(&mmap, header.meta, "metadata")?)?;

        if metadata.dimension != expected_dimension {
            return Err(StoreError::DimensionMismatch {
                expected: expected_dimension,
                found: metadata.dimension,
            });
        }

        let chunk_bytes = region(&mmap, header.chunk_dir, "chunk directory")?;
        let (chunks, _): (Vec<ChunkRecord>, usize) = decode_from_slice(chunk_bytes, standard())?;

        if chunks.len() != metadata.chunk_count {
            return Err(StoreError::CorruptContainer(format!(
                "chunk directory holds {} records, metadata declares {}",
                chunks.len(),
                metadata.chunk_count
            )));
        }

        verify_hash(&mmap, &header, &metadata)?;

        let vector_bytes = region(&mmap, header.vector, "vector blob")?;
        let expected_floats = metadata.chunk_count * metadata.dimension;
        let vectors = match metadata.compression {
            Some(desc) if !desc.is_raw() => VectorStorage::Owned(compression::decompress(
                vector_bytes,
                &desc,
                metadata.chunk_count,
                metadata.dimension,
            )?),
            _ => {
                if vector_bytes.len() != expected_floats * 4 {
                    return Err(StoreError::CorruptContainer(format!(
                        "vector region holds {} bytes, expected {}",
                        vector_bytes.len(),
                        expected_floats * 4
                    )));
                }
                // The write side aligns the region, so the cast normally
                // succeeds; an unaligned map degrades to an owned copy.
                match bytemuck::try_cast_slice::<u8, f32>(vector_bytes) {
                    Ok(_) => VectorStorage::Mapped {
                        offset: header.vector.0,
                        len: header.vector.1,
                    },
                    Err(_) => {
                        tracing::warn!(path = %path.display(), "unaligned vector region, copying");
                        VectorStorage::Owned(
                            vector_bytes
                                .chunks_exact(4)
                                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                                .collect(),
                        )
                    }
                }
            }
        };

        if let VectorStorage::Owned(ref v) = vectors {
            if v.len() != expected_floats {
                return Err(StoreError::CorruptContainer(format!(
                    "decompressed vector blob holds {} floats, expected {expected_floats}",
                    v.len()
                )));
            }
        }

        tracing::info!(
            path = %path.display(),
            chunks = metadata.chunk_count,
            dimension = metadata.dimension,
            model = %metadata.embedding_model,
            "opened snapshot container"
        );

        Ok(Self {
            path,
            mmap,
            chunks,
            vectors,
            index_range: header.index,
            metadata,
        })
    }

    /// Zero-copy view into the loaded snapshot.
    pub fn snapshot(&self) -> SnapshotView<'_> {
        let vectors = match &self.vectors {
            VectorStorage::Mapped { offset, len } => {
                // Validated at open time.
                VectorMatrix::Mapped(bytemuck::cast_slice(&self.mmap[*offset..*offset + *len]))
            }
            VectorStorage::Owned(v) => VectorMatrix::Owned(v.as_slice()),
        };
        SnapshotView {
            chunks: &self.chunks,
            vectors,
            index_bytes: &self.mmap[self.index_range.0..self.index_range.0 + self.index_range.1],
            metadata: &self.metadata,
        }
    }

    pub fn metadata(&self) -> &SnapshotMetadata {
        &self.metadata
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialise a snapshot bundle atomically: write to a temporary file in
    /// the target directory, fsync, then rename over `path`. On any failure
    /// the existing container is untouched.
    ///
    /// `vectors` is the row-major `n × dimension` matrix; every row must be
    /// unit-norm. Returns the hex snapshot hash.
    pub fn write_snapshot(
        path: impl AsRef<Path>,
        chunks: &[ChunkRecord],
        vectors: &[f32],
        dimension: usize,
        index_bytes: &[u8],
        embedding_model: &str,
        compression: CompressionSpec,
    ) -> StoreResult<String> {
        let path = path.as_ref();
        let n = chunks.len();

        if vectors.len() != n * dimension {
            return Err(StoreError::ShapeMismatch(format!(
                "{} floats for {n} chunks of dimension {dimension}",
                vectors.len()
            )));
        }
        for (row, chunk) in vectors.chunks_exact(dimension.max(1)).zip(chunks) {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if (norm - 1.0).abs() > NORM_TOLERANCE {
                return Err(StoreError::NotNormalized {
                    row: chunk.chunk_id as usize,
                    norm,
                });
            }
        }

        let chunk_bytes = encode_to_vec(chunks, standard())?;
        let (vector_bytes, descriptor) = compression::compress(vectors, compression)?;

        let chunk_dir_offset = HEADER_LEN;
        let vector_offset = align_up(chunk_dir_offset + chunk_bytes.len(), VECTOR_ALIGN);
        let index_offset = vector_offset + vector_bytes.len();
        let meta_offset = index_offset + index_bytes.len();

        let snapshot_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&chunk_bytes);
            hasher.update(&vector_bytes);
            hasher.update(index_bytes);
            hex(hasher.finalize().as_slice())
        };

        let metadata = SnapshotMetadata {
            snapshot_hash: snapshot_hash.clone(),
            chunk_count: n,
            dimension,
            embedding_model: embedding_model.to_string(),
            compression: Some(descriptor),
        };
        let meta_bytes = serde_json::to_vec(&metadata)?;

        let mut header = vec![0u8; HEADER_LEN];
        header[0..4].copy_from_slice(MAGIC);
        header[4..8].copy_from_slice(&CONTAINER_FORMAT_VERSION.to_le_bytes());
        let mut cursor = 8;
        for (offset, len) in [
            (chunk_dir_offset, chunk_bytes.len()),
            (vector_offset, vector_bytes.len()),
            (index_offset, index_bytes.len()),
            (meta_offset, meta_bytes.len()),
        ] {
            header[cursor..cursor + 8].copy_from_slice(&(offset as u64).to_le_bytes());
            header[cursor + 8..cursor + 16].copy_from_slice(&(len as u64).to_le_bytes());
            cursor += 16;
        }

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&header)?;
        tmp.write_all(&chunk_bytes)?;
        tmp.write_all(&vec![0u8; vector_offset - (chunk_dir_offset + chunk_bytes.len())])?;
        tmp.write_all(&vector_bytes)?;
        tmp.write_all(index_bytes)?;
        tmp.write_all(&meta_bytes)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;

        tracing::info!(
            path = %path.display(),
            chunks = n,
            dimension,
            hash = %snapshot_hash,
            "wrote snapshot container"
        );

        Ok(snapshot_hash)
    }
}

fn parse_header(mmap: &[u8]) -> StoreResult<Header> {
    if mmap.len() < HEADER_LEN {
        return Err(StoreError::CorruptContainer(format!(
            "file is {} bytes, smaller than the {HEADER_LEN}-byte header",
            mmap.len()
        )));
    }
    if &mmap[0..4] != MAGIC {
        return Err(StoreError::CorruptContainer("bad magic".to_string()));
    }
    let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
    if version != CONTAINER_FORMAT_VERSION {
        return Err(StoreError::CorruptContainer(format!(
            "unsupported format version {version}"
        )));
    }

    let mut pairs = [(0usize, 0usize); 4];
    let mut cursor = 8;
    for pair in &mut pairs {
        let offset = u64::from_le_bytes(mmap[cursor..cursor + 8].try_into().unwrap_or_default());
        let len = u64::from_le_bytes(mmap[cursor + 8..cursor + 16].try_into().unwrap_or_default());
        *pair = (offset as usize, len as usize);
        cursor += 16;
    }

    for (name, (offset, len)) in ["chunk directory", "vector blob", "index blob", "metadata"]
        .iter()
        .zip(pairs)
    {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| StoreError::CorruptContainer(format!("{name} region overflows")))?;
        if end > mmap.len() {
            return Err(StoreError::CorruptContainer(format!(
                "{name} region [{offset}, {end}) exceeds file length {}",
                mmap.len()
            )));
        }
    }

    Ok(Header {
        chunk_dir: pairs[0],
        vector: pairs[1],
        index: pairs[2],
        meta: pairs[3],
    })
}

fn verify_hash(mmap: &[u8], header: &Header, metadata: &SnapshotMetadata) -> StoreResult<()> {
    let mut hasher = Sha256::new();
    hasher.update(region(mmap, header.chunk_dir, "chunk directory")?);
    hasher.update(region(mmap, header.vector, "vector blob")?);
    hasher.update(region(mmap, header.index, "index blob")?);
    let computed = hex(hasher.finalize().as_slice());
    if computed != metadata.snapshot_hash {
        return Err(StoreError::CorruptContainer(format!(
            "snapshot hash mismatch: stored {}, computed {computed}",
            metadata.snapshot_hash
        )));
    }
    Ok(())
}

fn region<'a>(mmap: &'a [u8], (offset, len): (usize, usize), name: &str) -> StoreResult<&'a [u8]> {
    mmap.get(offset..offset + len)
        .ok_or_else(|| StoreError::CorruptContainer(format!("{name} region out of bounds")))
}

fn align_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::PrecisionSpec;

    fn unit_rows(n: usize, d: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(n * d);
        for i in 0..n {
            let mut row: Vec<f32> = (0..d).map(|j| ((i * d + j) as f32 * 0.37).sin()).collect();
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            for x in &mut row {
                *x /= norm;
            }
            out.extend(row);
        }
        out
    }

    fn sample_chunks(n: usize) -> Vec<ChunkRecord> {
        (0..n)
            .map(|i| {
                ChunkRecord::new(
                    i as u32,
                    format!("src/module_{i}.rs"),
                    1,
                    10,
                    None,
                    format!("fn handler_{i}() {{}}"),
                )
            })
            .collect()
    }

    #[test]
    fn write_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        let chunks = sample_chunks(4);
        let vectors = unit_rows(4, 8);

        let hash = Container::write_snapshot(
            &path,
            &chunks,
            &vectors,
            8,
            b"ann-blob",
            "hash-sin-8",
            CompressionSpec::default(),
        )
        .unwrap();

        let container = Container::open(&path, 8).unwrap();
        let view = container.snapshot();
        assert_eq!(view.metadata.snapshot_hash, hash);
        assert_eq!(view.chunks, chunks.as_slice());
        assert_eq!(view.index_bytes, b"ann-blob");
        assert_eq!(view.vectors.as_slice(), vectors.as_slice());
        assert_eq!(view.row(2).unwrap(), &vectors[16..24]);
    }

    #[test]
    fn compressed_round_trip_preserves_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        let chunks = sample_chunks(3);
        let vectors = unit_rows(3, 16);

        Container::write_snapshot(
            &path,
            &chunks,
            &vectors,
            16,
            b"idx",
            "hash-sin-16",
            CompressionSpec::i8_zstd(),
        )
        .unwrap();

        let container = Container::open(&path, 16).unwrap();
        let view = container.snapshot();
        for (a, b) in vectors.iter().zip(view.vectors.as_slice()) {
            assert!((a - b).abs() < 0.02, "{a} vs {b}");
        }
    }

    #[test]
    fn dimension_mismatch_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        Container::write_snapshot(
            &path,
            &sample_chunks(2),
            &unit_rows(2, 8),
            8,
            b"",
            "hash-sin-8",
            CompressionSpec::default(),
        )
        .unwrap();

        let err = Container::open(&path, 384).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 384,
                found: 8
            }
        ));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        Container::write_snapshot(
            &path,
            &sample_chunks(2),
            &unit_rows(2, 8),
            8,
            b"idx",
            "hash-sin-8",
            CompressionSpec::default(),
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        let err = Container::open(&path, 8).unwrap_err();
        assert!(matches!(err, StoreError::CorruptContainer(_)));
    }

    #[test]
    fn tampered_region_fails_hash_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        Container::write_snapshot(
            &path,
            &sample_chunks(2),
            &unit_rows(2, 8),
            8,
            b"index-bytes",
            "hash-sin-8",
            CompressionSpec::default(),
        )
        .unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        // Flip a byte in the middle of the vector region.
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let err = Container::open(&path, 8).unwrap_err();
        assert!(matches!(err, StoreError::CorruptContainer(_)));
    }

    #[test]
    fn non_unit_rows_are_rejected_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        let vectors = vec![3.0f32, 4.0, 0.0, 0.0];
        let err = Container::write_snapshot(
            &path,
            &sample_chunks(1),
            &vectors,
            4,
            b"",
            "hash-sin-4",
            CompressionSpec::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::NotNormalized { row: 0, .. }));
        assert!(!path.exists());
    }

    #[test]
    fn failed_write_leaves_existing_container_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        let chunks = sample_chunks(2);
        let vectors = unit_rows(2, 8);
        let hash = Container::write_snapshot(
            &path,
            &chunks,
            &vectors,
            8,
            b"v1",
            "hash-sin-8",
            CompressionSpec::default(),
        )
        .unwrap();

        // Shape mismatch fails before any file is touched.
        let err =
            Container::write_snapshot(&path, &chunks, &vectors[..8], 8, b"v2", "hash-sin-8", CompressionSpec::default())
                .unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch(_)));

        let container = Container::open(&path, 8).unwrap();
        assert_eq!(container.metadata().snapshot_hash, hash);
        assert_eq!(container.snapshot().index_bytes, b"v1");
    }

    #[test]
    fn f16_compression_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.acx");
        let vectors = unit_rows(5, 32);
        Container::write_snapshot(
            &path,
            &sample_chunks(5),
            &vectors,
            32,
            b"idx",
            "hash-sin-32",
            CompressionSpec {
                precision: PrecisionSpec::F16,
                zstd: true,
                zstd_level: 3,
            },
        )
        .unwrap();

        let container = Container::open(&path, 32).unwrap();
        let view = container.snapshot();
        assert_eq!(view.vectors.as_slice().len(), 5 * 32);
        for (a, b) in vectors.iter().zip(view.vectors.as_slice()) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
