use serde::{Deserialize, Serialize};

/// The atomic retrieval unit: a span of text with its provenance.
///
/// Within a snapshot, `chunk_id` values form a dense permutation of
/// `[0, N)` and row `chunk_id` of the vector blob is the embedding of this
/// record's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Stable identifier, dense in `[0, N)` within a snapshot.
    pub chunk_id: u32,
    /// Origin path, informational only.
    pub file_path: String,
    /// First line of the span in the origin file (1-based).
    pub start_line: u32,
    /// Last line of the span in the origin file (inclusive).
    pub end_line: u32,
    /// Optional grouping label (a heading, a module, a class).
    pub section: Option<String>,
    text: String,
}

impl ChunkRecord {
    pub fn new(
        chunk_id: u32,
        file_path: impl Into<String>,
        start_line: u32,
        end_line: u32,
        section: Option<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id,
            file_path: file_path.into(),
            start_line,
            end_line,
            section,
            text: text.into(),
        }
    }

    /// The chunk's text content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `"start-end"` formatting used in provenance payloads.
    pub fn line_range(&self) -> String {
        format!("{}-{}", self.start_line, self.end_line)
    }
}
