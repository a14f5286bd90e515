//! The in-memory world model: heading-delimited sections of the truth
//! corpus, each embedded once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::Regex;
use vector::Embedder;
use walkdir::WalkDir;

use crate::error::{GroundError, GroundResult};

/// Only this much of a section is embedded; sections can be long and the
/// head carries the thesis.
const EMBED_PREFIX_CHARS: usize = 1000;

/// One world-model anchor: a section of a truth document plus its embedding.
#[derive(Debug, Clone)]
pub struct TruthFact {
    /// File name the section came from.
    pub source: String,
    /// Full section text, heading line included.
    pub content: String,
    pub vector: Vec<f32>,
}

/// The embedded truth corpus. Build once, read from many threads, rebuild by
/// constructing a fresh model and swapping it in.
pub struct WorldModel {
    corpus_dir: PathBuf,
    facts: Vec<TruthFact>,
}

impl WorldModel {
    /// Scan `corpus_dir` for `.md`/`.txt` files, split each on markdown
    /// headings, and embed every non-empty section. A missing directory
    /// yields an empty model — grounding is optional until documents exist.
    ///
    /// `cancel` is checked between sections; a rebuild in a background task
    /// stops at the next boundary when it flips.
    pub fn build(
        corpus_dir: impl Into<PathBuf>,
        embedder: &Arc<dyn Embedder>,
        cancel: &AtomicBool,
    ) -> GroundResult<Self> {
        let corpus_dir = corpus_dir.into();
        let mut facts = Vec::new();

        if corpus_dir.is_dir() {
            let heading = Regex::new(r"(?m)^#+\s+").expect("static pattern");
            for entry in WalkDir::new(&corpus_dir).into_iter().flatten() {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let matches_ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == "md" || e == "txt");
                if !matches_ext {
                    continue;
                }
                let source = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let content = match std::fs::read_to_string(path) {
                    Ok(c) => c,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), %err, "skipping unreadable truth file");
                        continue;
                    }
                };

                for section in heading.split(&content) {
                    if cancel.load(Ordering::Relaxed) {
                        return Err(GroundError::Cancelled);
                    }
                    let section = section.trim();
                    if section.is_empty() {
                        continue;
                    }
                    let prefix: String = section.chars().take(EMBED_PREFIX_CHARS).collect();
                    facts.push(TruthFact {
                        source: source.clone(),
                        content: section.to_string(),
                        vector: embedder.embed(&prefix),
                    });
                }
            }
        }

        tracing::info!(
            corpus = %corpus_dir.display(),
            facts = facts.len(),
            "built world model"
        );
        Ok(Self { corpus_dir, facts })
    }

    /// An empty model for engines configured without a truth corpus.
    pub fn empty(corpus_dir: impl Into<PathBuf>) -> Self {
        Self::from_facts(corpus_dir, Vec::new())
    }

    /// A model over pre-embedded facts, bypassing the corpus scan.
    pub fn from_facts(corpus_dir: impl Into<PathBuf>, facts: Vec<TruthFact>) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            facts,
        }
    }

    pub fn corpus_dir(&self) -> &Path {
        &self.corpus_dir
    }

    pub fn facts(&self) -> &[TruthFact] {
        &self.facts
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }
}
