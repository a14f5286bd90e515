//! On-disk session persistence: one `<id>.log` of JSON-per-line turns plus a
//! `<id>.meta.json` sidecar per session.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use tempfile::NamedTempFile;

use crate::error::{SessionError, SessionResult};
use crate::types::{MemoryPolicy, SessionKind, SessionMetadata, TurnRecord};

/// Append-only per-session turn log with sidecar metadata.
///
/// A single process owns the store; the caller serialises appends per
/// session (the manager holds a per-session lock). Turn appends are a single
/// `write` of one line; metadata rewrites go through a temp file and rename.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> SessionResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.log"))
    }

    fn meta_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.meta.json"))
    }

    /// Session ids become file names; anything path-shaped is refused.
    pub fn validate_id(session_id: &str) -> SessionResult<()> {
        let ok = !session_id.is_empty()
            && session_id.len() <= 128
            && !session_id.starts_with('.')
            && session_id
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.');
        if ok {
            Ok(())
        } else {
            Err(SessionError::InvalidId(session_id.to_string()))
        }
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.meta_path(session_id).exists() || self.log_path(session_id).exists()
    }

    /// Append one turn and bump the sidecar's `last_updated`/`turn_count`.
    pub fn append(&self, session_id: &str, turn: &TurnRecord) -> SessionResult<()> {
        Self::validate_id(session_id)?;
        let mut line = serde_json::to_string(turn)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(session_id))?;
        file.write_all(line.as_bytes())?;

        let now = Utc::now();
        let metadata = match self.load_metadata(session_id)? {
            Some(mut meta) => {
                meta.last_updated = now;
                meta.turn_count += 1;
                meta
            }
            None => SessionMetadata {
                session_id: session_id.to_string(),
                session_type: SessionKind::General,
                policy: MemoryPolicy::Sliding,
                created_at: now,
                last_updated: now,
                turn_count: 1,
            },
        };
        self.save_metadata(&metadata)?;

        tracing::debug!(session_id, turn_id = turn.turn_id, "appended turn");
        Ok(())
    }

    /// Read the full log in order. A partial trailing line (a crash mid-
    /// append) is treated as not-yet-committed and skipped; corruption
    /// anywhere earlier is an error.
    pub fn load(&self, session_id: &str) -> SessionResult<Vec<TurnRecord>> {
        Self::validate_id(session_id)?;
        let path = self.log_path(session_id);
        if !path.exists() {
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        let reader = BufReader::new(File::open(&path)?);
        let lines: Vec<String> = reader
            .lines()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|l| !l.trim().is_empty())
            .collect();

        let mut turns = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str::<TurnRecord>(line) {
                Ok(turn) => turns.push(turn),
                Err(cause) if i == lines.len() - 1 => {
                    tracing::warn!(session_id, "dropping partial trailing log line");
                    let _ = cause;
                }
                Err(cause) => {
                    return Err(SessionError::CorruptLog {
                        session_id: session_id.to_string(),
                        line: i + 1,
                        cause: cause.to_string(),
                    })
                }
            }
        }
        Ok(turns)
    }

    pub fn save_metadata(&self, metadata: &SessionMetadata) -> SessionResult<()> {
        Self::validate_id(&metadata.session_id)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(metadata)?)?;
        tmp.flush()?;
        tmp.persist(self.meta_path(&metadata.session_id))?;
        Ok(())
    }

    pub fn load_metadata(&self, session_id: &str) -> SessionResult<Option<SessionMetadata>> {
        Self::validate_id(session_id)?;
        let path = self.meta_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let metadata = serde_json::from_slice(&fs::read(path)?)?;
        Ok(Some(metadata))
    }

    /// All session ids, sorted.
    pub fn list(&self) -> SessionResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".log") {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove a session's log and metadata. Returns false when neither
    /// existed.
    pub fn delete(&self, session_id: &str) -> SessionResult<bool> {
        Self::validate_id(session_id)?;
        let mut deleted = false;
        for path in [self.log_path(session_id), self.meta_path(session_id)] {
            if path.exists() {
                fs::remove_file(path)?;
                deleted = true;
            }
        }
        if deleted {
            tracing::info!(session_id, "deleted session");
        }
        Ok(deleted)
    }

    /// Delete sessions whose `created_at` is older than `days`.
    /// `days == 0` disables the sweep.
    pub fn retention_sweep(&self, days: u32) -> SessionResult<usize> {
        if days == 0 {
            return Ok(0);
        }
        let cutoff = Utc::now() - Duration::days(days as i64);
        let mut removed = 0;
        for session_id in self.list()? {
            if let Some(meta) = self.load_metadata(&session_id)? {
                if meta.created_at < cutoff && self.delete(&session_id)? {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, days, "retention sweep removed sessions");
        }
        Ok(removed)
    }
}
