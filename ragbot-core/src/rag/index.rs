//! Exact nearest-neighbour index over chunk embeddings.
//!
//! Search is a linear scan: every entry is scored against the query and the
//! best `k` are returned, highest similarity first. The sort is stable, so
//! entries with equal scores keep insertion order.
//!
//! # Persisted layout
//!
//! ```text
//! magic      4 bytes   "RBIX"
//! version    u16 LE
//! metric     u8        0 = cosine, 1 = dot
//! reserved   u8        always 0
//! dimension  u32 LE
//! count      u64 LE
//! checksum   32 bytes  SHA-256 of the fields above, then the payload
//! length     u64 LE    payload length
//! payload    gzip( count * dimension f32 LE | JSON array of chunks )
//! ```
//!
//! Vectors are stored as raw floats so a reload scores bit-for-bit the same.

use super::types::{Chunk, IndexEntry, RetrievalResult, ScoredChunk};
use super::{RagError, Result};
use crate::config::Metric;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAGIC: &[u8; 4] = b"RBIX";
const FORMAT_VERSION: u16 = 1;
/// Magic through count: the header bytes covered by the checksum.
const FIELDS_LEN: usize = 4 + 2 + 1 + 1 + 4 + 8;
const HEADER_LEN: usize = FIELDS_LEN + 32 + 8;

/// An immutable, searchable collection of [`IndexEntry`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    metric: Metric,
    dimension: usize,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
}

impl VectorIndex {
    /// Builds a fresh index.
    ///
    /// Fails with [`RagError::EmptyInput`] when `entries` is empty and with
    /// [`RagError::InvalidArgument`] when vectors disagree on dimensionality
    /// or contain non-finite values.
    pub fn build(entries: Vec<IndexEntry>, metric: Metric) -> Result<Self> {
        let dimension = entries.first().ok_or(RagError::EmptyInput)?.vector.len();
        if dimension == 0 {
            return Err(RagError::InvalidArgument("embedding vectors are empty".into()));
        }

        for (i, entry) in entries.iter().enumerate() {
            if entry.vector.len() != dimension {
                return Err(RagError::InvalidArgument(format!(
                    "entry {i} has dimension {}, expected {dimension}",
                    entry.vector.len()
                )));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(RagError::InvalidArgument(format!("entry {i} has a non-finite component")));
            }
        }

        let norms = entries.iter().map(|e| norm(&e.vector)).collect();
        debug!(entries = entries.len(), dimension, "Built vector index");

        Ok(Self {
            metric,
            dimension,
            entries,
            norms,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Returns up to `k` entries ranked by similarity to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be positive".into()));
        }
        if query.len() != self.dimension {
            return Err(RagError::InvalidArgument(format!(
                "query has dimension {}, index has {}",
                query.len(),
                self.dimension
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::InvalidArgument("query has a non-finite component".into()));
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (entry, &entry_norm))| (i, self.score(query, query_norm, &entry.vector, entry_norm)))
            .collect();

        // stable: equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    fn score(&self, query: &[f32], query_norm: f32, vector: &[f32], vector_norm: f32) -> f32 {
        let dot = dot(query, vector);
        match self.metric {
            Metric::Dot => dot,
            Metric::Cosine => {
                if query_norm == 0.0 || vector_norm == 0.0 {
                    0.0
                } else {
                    dot / (query_norm * vector_norm)
                }
            }
        }
    }

    /// Writes the index to `path`.
    ///
    /// The bytes go to a sibling temp file which is then renamed over
    /// `path`, so a concurrent reader sees either the old file or the new
    /// one, never a partial write.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let write_err = |source| RagError::IndexWrite {
            path: path.to_path_buf(),
            source,
        };

        let bytes = self.to_bytes().map_err(write_err)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = temp_path(path);
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(source));
        }

        info!(path = %path.display(), entries = self.len(), bytes = bytes.len(), "Persisted vector index");
        Ok(())
    }

    /// Reads an index written by [`persist`](Self::persist).
    ///
    /// A missing, truncated or tampered file fails with [`RagError::IndexLoad`].
    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |reason: String| RagError::IndexLoad {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = fs::read(path).map_err(|e| load_err(e.to_string()))?;
        let index = Self::from_bytes(&bytes).map_err(load_err)?;
        info!(path = %path.display(), entries = index.len(), "Loaded vector index");
        Ok(index)
    }

    fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(self.entries.len() * self.dimension * 4);
        for entry in &self.entries {
            for x in &entry.vector {
                raw.extend_from_slice(&x.to_le_bytes());
            }
        }
        let chunks: Vec<&Chunk> = self.entries.iter().map(|e| &e.chunk).collect();
        serde_json::to_writer(&mut raw, &chunks)?;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let payload = encoder.finish()?;

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.push(metric_code(self.metric));
        out.push(0);
        out.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
        let digest = checksum(&out, &payload);
        out.extend_from_slice(&digest);
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_LEN {
            return Err(format!("file is {} bytes, shorter than the header", bytes.len()));
        }
        let mut header = Header(bytes);
        if header.take(4) != MAGIC {
            return Err("not an index file (bad magic)".into());
        }
        let version = u16::from_le_bytes(header.array());
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let metric = metric_from_code(header.take(1)[0])?;
        let reserved = header.take(1)[0];
        if reserved != 0 {
            return Err(format!("reserved header byte is {reserved}, expected 0"));
        }
        let dimension = u32::from_le_bytes(header.array()) as usize;
        let count = u64::from_le_bytes(header.array()) as usize;
        let stored_checksum = header.take(32).to_vec();
        let length = u64::from_le_bytes(header.array()) as usize;
        let payload = header.0;

        if payload.len() != length {
            return Err(format!("payload is {} bytes, header says {length}", payload.len()));
        }
        if checksum(&bytes[..FIELDS_LEN], payload).as_slice() != stored_checksum.as_slice() {
            return Err("checksum mismatch".into());
        }

        let mut raw = Vec::new();
        GzDecoder::new(payload)
            .read_to_end(&mut raw)
            .map_err(|e| format!("payload does not decompress: {e}"))?;

        let vector_bytes = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .filter(|&n| n <= raw.len())
            .ok_or("payload too short for the declared vectors")?;
        let (vector_block, chunk_block) = raw.split_at(vector_bytes);
        let chunks: Vec<Chunk> =
            serde_json::from_slice(chunk_block).map_err(|e| format!("chunk records are invalid: {e}"))?;
        if chunks.len() != count {
            return Err(format!("{} chunk records, header says {count}", chunks.len()));
        }

        let entries = chunks
            .into_iter()
            .zip(vector_block.chunks_exact(dimension.max(1) * 4))
            .map(|(chunk, bytes)| {
                let vector = bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                IndexEntry::new(vector, chunk)
            })
            .collect();

        Self::build(entries, metric).map_err(|e| e.to_string())
    }
}

/// Cursor over the fixed-size header fields.
struct Header<'a>(&'a [u8]);

impl<'a> Header<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let (head, rest) = self.0.split_at(n);
        self.0 = rest;
        head
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N));
        out
    }
}

fn checksum(fields: &[u8], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(fields);
    hasher.update(payload);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

fn metric_code(metric: Metric) -> u8 {
    match metric {
        Metric::Cosine => 0,
        Metric::Dot => 1,
    }
}

fn metric_from_code(code: u8) -> std::result::Result<Metric, String> {
    match code {
        0 => Ok(Metric::Cosine),
        1 => Ok(Metric::Dot),
        other => Err(format!("unknown metric code {other}")),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
