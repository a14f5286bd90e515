//! Vector-blob compression: precision reduction (`f16`, `i8` with per-blob
//! scale bounds), optionally followed by zstd. The descriptor written into
//! snapshot metadata records every transformation, so the read side can
//! reverse the pipeline without out-of-band knowledge.

use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Requested compression, before blob-dependent parameters are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionSpec {
    /// Raw little-endian `f32` rows; readable straight from the map.
    F32,
    /// Half-precision rows. Halves the blob at ~1e-3 cosine error.
    F16,
    /// Scalar-quantised bytes with per-blob `(min, max)` bounds.
    I8,
}

/// Requested compression pipeline for `write_snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionSpec {
    pub precision: PrecisionSpec,
    /// Apply zstd after precision reduction.
    pub zstd: bool,
    pub zstd_level: i32,
}

impl Default for CompressionSpec {
    fn default() -> Self {
        Self {
            precision: PrecisionSpec::F32,
            zstd: false,
            zstd_level: 3,
        }
    }
}

impl CompressionSpec {
    pub fn f16() -> Self {
        Self {
            precision: PrecisionSpec::F16,
            ..Self::default()
        }
    }

    pub fn i8_zstd() -> Self {
        Self {
            precision: PrecisionSpec::I8,
            zstd: true,
            zstd_level: 3,
        }
    }
}

/// Recorded precision, including the parameters needed to invert it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Precision {
    F32,
    F16,
    /// `scale = (max - min) / 255`; a stored byte `q` decodes to
    /// `(q as i32 + 128) as f32 * scale + min`.
    I8 { min: f32, max: f32 },
}

/// Full record of the applied pipeline, stored in snapshot metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionDescriptor {
    pub precision: Precision,
    pub zstd: bool,
}

impl CompressionDescriptor {
    /// True when the stored bytes are raw `f32` rows and can be viewed
    /// zero-copy from the mapped region.
    pub fn is_raw(&self) -> bool {
        matches!(self.precision, Precision::F32) && !self.zstd
    }
}

/// Compress a row-major `f32` matrix according to `spec`.
pub fn compress(vectors: &[f32], spec: CompressionSpec) -> StoreResult<(Vec<u8>, CompressionDescriptor)> {
    let (bytes, precision) = match spec.precision {
        PrecisionSpec::F32 => {
            let mut out = Vec::with_capacity(vectors.len() * 4);
            for v in vectors {
                out.extend_from_slice(&v.to_le_bytes());
            }
            (out, Precision::F32)
        }
        PrecisionSpec::F16 => {
            let mut out = Vec::with_capacity(vectors.len() * 2);
            for v in vectors {
                out.extend_from_slice(&f16::from_f32(*v).to_le_bytes());
            }
            (out, Precision::F16)
        }
        PrecisionSpec::I8 => {
            let (min, max) = bounds(vectors);
            let scale = if max > min { (max - min) / 255.0 } else { 0.0 };
            let mut out = Vec::with_capacity(vectors.len());
            for v in vectors {
                let q = if scale > 0.0 {
                    (((v - min) / scale).round() as i32 - 128).clamp(-128, 127)
                } else {
                    0
                };
                out.push(q as i8 as u8);
            }
            (out, Precision::I8 { min, max })
        }
    };

    let bytes = if spec.zstd {
        zstd::encode_all(bytes.as_slice(), spec.zstd_level)?
    } else {
        bytes
    };

    let descriptor = CompressionDescriptor {
        precision,
        zstd: spec.zstd,
    };

    tracing::debug!(
        original_bytes = vectors.len() * 4,
        stored_bytes = bytes.len(),
        ?descriptor,
        "compressed vector blob"
    );

    Ok((bytes, descriptor))
}

/// Reverse the pipeline recorded in `descriptor`, producing exactly
/// `n * dimension` floats.
pub fn decompress(
    bytes: &[u8],
    descriptor: &CompressionDescriptor,
    n: usize,
    dimension: usize,
) -> StoreResult<Vec<f32>> {
    let raw;
    let bytes = if descriptor.zstd {
        raw = zstd::decode_all(bytes)?;
        raw.as_slice()
    } else {
        bytes
    };

    let expected = n * dimension;
    let vectors = match descriptor.precision {
        Precision::F32 => {
            check_len(bytes.len(), expected * 4)?;
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        }
        Precision::F16 => {
            check_len(bytes.len(), expected * 2)?;
            bytes
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect()
        }
        Precision::I8 { min, max } => {
            check_len(bytes.len(), expected)?;
            let scale = if max > min { (max - min) / 255.0 } else { 0.0 };
            bytes
                .iter()
                .map(|&b| (b as i8 as i32 + 128) as f32 * scale + min)
                .collect()
        }
    };

    Ok(vectors)
}

fn bounds(values: &[f32]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if values.is_empty() {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

fn check_len(got: usize, expected: usize) -> StoreResult<()> {
    if got != expected {
        return Err(StoreError::ShapeMismatch(format!(
            "vector blob holds {got} bytes, expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<f32> {
        vec![0.1, -0.4, 0.9, 0.0, 0.33, -0.75, 0.5, 0.25]
    }

    #[test]
    fn f32_round_trip_is_exact() {
        let vectors = sample();
        let (bytes, desc) = compress(&vectors, CompressionSpec::default()).unwrap();
        assert!(desc.is_raw());
        let back = decompress(&bytes, &desc, 2, 4).unwrap();
        assert_eq!(back, vectors);
    }

    #[test]
    fn f16_round_trip_within_tolerance() {
        let vectors = sample();
        let (bytes, desc) = compress(&vectors, CompressionSpec::f16()).unwrap();
        assert_eq!(bytes.len(), vectors.len() * 2);
        let back = decompress(&bytes, &desc, 2, 4).unwrap();
        for (a, b) in vectors.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn i8_round_trip_within_scale_step() {
        let vectors = sample();
        let (bytes, desc) = compress(
            &vectors,
            CompressionSpec {
                precision: PrecisionSpec::I8,
                zstd: false,
                zstd_level: 3,
            },
        )
        .unwrap();
        let Precision::I8 { min, max } = desc.precision else {
            panic!("unexpected precision {:?}", desc.precision);
        };
        let scale = (max - min) / 255.0;
        let back = decompress(&bytes, &desc, 2, 4).unwrap();
        for (a, b) in vectors.iter().zip(back.iter()) {
            assert!((a - b).abs() <= scale, "{a} vs {b}, scale {scale}");
        }
    }

    #[test]
    fn i8_constant_blob_decodes_to_constant() {
        let vectors = vec![0.5f32; 6];
        let (bytes, desc) = compress(
            &vectors,
            CompressionSpec {
                precision: PrecisionSpec::I8,
                zstd: false,
                zstd_level: 3,
            },
        )
        .unwrap();
        let back = decompress(&bytes, &desc, 2, 3).unwrap();
        for v in back {
            assert!((v - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn zstd_stage_round_trips() {
        let vectors: Vec<f32> = (0..512).map(|i| (i as f32 * 0.01).sin()).collect();
        let (bytes, desc) = compress(&vectors, CompressionSpec::i8_zstd()).unwrap();
        assert!(desc.zstd);
        let back = decompress(&bytes, &desc, 4, 128).unwrap();
        assert_eq!(back.len(), vectors.len());
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let vectors = sample();
        let (bytes, desc) = compress(&vectors, CompressionSpec::default()).unwrap();
        let err = decompress(&bytes, &desc, 3, 4).unwrap_err();
        assert!(matches!(err, StoreError::ShapeMismatch(_)));
    }
}
