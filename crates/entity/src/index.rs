//! Name-addressable store of entity records extracted from source trees.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{EntityError, EntityResult};
use crate::scan::{JsScanner, PythonScanner, RustScanner, SourceScanner};
use crate::types::{EntityKind, EntityRecord};

const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    "target",
    "venv",
    ".venv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_entities: usize,
    pub functions: usize,
    pub classes: usize,
    pub endpoints: usize,
    pub files_indexed: usize,
}

/// The entity index. Rebuildable from source at any time; a rebuild
/// replaces the whole record set.
#[derive(Default)]
pub struct EntityIndex {
    records: Vec<EntityRecord>,
    files_indexed: usize,
    scanners: Vec<Box<dyn SourceScanner>>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    records: Vec<EntityRecord>,
    files_indexed: usize,
}

impl EntityIndex {
    /// An index with the built-in Python / Rust / JavaScript scanners.
    pub fn with_default_scanners() -> Self {
        Self {
            records: Vec::new(),
            files_indexed: 0,
            scanners: vec![
                Box::new(PythonScanner::default()),
                Box::new(RustScanner::default()),
                Box::new(JsScanner::default()),
            ],
        }
    }

    /// Add a scanner (framework-specific extraction plugs in here).
    pub fn register_scanner(&mut self, scanner: Box<dyn SourceScanner>) {
        self.scanners.push(scanner);
    }

    /// Scan `root` and replace the current record set. Returns the number of
    /// files that produced at least one record.
    pub fn index_directory(&mut self, root: impl AsRef<Path>, recursive: bool) -> EntityResult<usize> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(EntityError::MissingDirectory(root.display().to_string()));
        }

        let mut records = Vec::new();
        let mut seen: HashSet<(EntityKind, String, String)> = HashSet::new();
        let mut files_indexed = 0;

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !EXCLUDED_DIRS.contains(&name))
                    .unwrap_or(true)
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(%err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            let Some(scanner) = self
                .scanners
                .iter()
                .find(|s| s.extensions().contains(&extension))
            else {
                continue;
            };

            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable file");
                    continue;
                }
            };
            let module = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();

            let found = scanner.scan(&path.display().to_string(), &module, &source);
            if found.is_empty() {
                continue;
            }
            files_indexed += 1;
            for record in found {
                // (kind, module, name) is unique; first declaration wins.
                let key = (record.kind, record.module.clone(), record.name.clone());
                if seen.insert(key) {
                    records.push(record);
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            entities = records.len(),
            files_indexed,
            "indexed source tree"
        );
        self.records = records;
        self.files_indexed = files_indexed;
        Ok(files_indexed)
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive substring search over function names (endpoints
    /// included — callers searching "functions" usually mean callables).
    pub fn search_function(&self, name: &str) -> Vec<&EntityRecord> {
        self.search_kind(name, &[EntityKind::Function, EntityKind::Endpoint])
    }

    /// Case-insensitive substring search over class names.
    pub fn search_class(&self, name: &str) -> Vec<&EntityRecord> {
        self.search_kind(name, &[EntityKind::Class, EntityKind::Model])
    }

    pub fn search_any(&self, name: &str) -> Vec<&EntityRecord> {
        let needle = name.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&needle))
            .collect()
    }

    fn search_kind(&self, name: &str, kinds: &[EntityKind]) -> Vec<&EntityRecord> {
        let needle = name.to_lowercase();
        self.records
            .iter()
            .filter(|r| kinds.contains(&r.kind) && r.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Exact-name lookup, any kind.
    pub fn find(&self, name: &str) -> Option<&EntityRecord> {
        self.records
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// The kind of an exactly-named entity, if indexed.
    pub fn kind_of(&self, name: &str) -> Option<EntityKind> {
        self.find(name).map(|r| r.kind)
    }

    /// When exactly one entity of `kind` exists in the whole index, return
    /// it. The resolver's unambiguity rule.
    pub fn single_of_kind(&self, kind: EntityKind) -> Option<&EntityRecord> {
        let mut of_kind = self.records.iter().filter(|r| r.kind == kind);
        let first = of_kind.next()?;
        if of_kind.next().is_some() {
            None
        } else {
            Some(first)
        }
    }

    /// All entity names, for verbatim-mention matching.
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn stats(&self) -> IndexStats {
        let count = |kind: EntityKind| self.records.iter().filter(|r| r.kind == kind).count();
        IndexStats {
            total_entities: self.records.len(),
            functions: count(EntityKind::Function),
            classes: count(EntityKind::Class),
            endpoints: count(EntityKind::Endpoint),
            files_indexed: self.files_indexed,
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EntityResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedIndex {
            records: self.records.clone(),
            files_indexed: self.files_indexed,
        };
        std::fs::write(path, serde_json::to_vec_pretty(&persisted)?)?;
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> EntityResult<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(false);
        }
        let persisted: PersistedIndex = serde_json::from_slice(&std::fs::read(path)?)?;
        self.records = persisted.records;
        self.files_indexed = persisted.files_indexed;
        tracing::info!(entities = self.records.len(), "loaded entity index");
        Ok(true)
    }
}
