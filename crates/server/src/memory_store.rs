//! Scratch memory files for the `memory_tool`: small CRUD over a directory,
//! optionally scoped per session.

use std::path::{Path, PathBuf};

use crate::error::{ToolError, ToolResult};

/// Persistent scratch store under `<data>/memories`. File names are reduced
/// to their basename and traversal components are refused outright, so a
/// caller can never escape the store directory.
pub struct MemoryStore {
    dir: PathBuf,
    per_session: bool,
}

impl MemoryStore {
    pub fn new(dir: impl Into<PathBuf>, per_session: bool) -> Self {
        Self {
            dir: dir.into(),
            per_session,
        }
    }

    fn resolve(&self, file_path: &str, session_id: Option<&str>) -> Result<PathBuf, ToolError> {
        if file_path.contains("..") {
            return Err(ToolError::invalid(format!(
                "Path traversal rejected: {file_path}"
            )));
        }
        let name = Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty() && *n != "." && *n != "..")
            .ok_or_else(|| ToolError::invalid(format!("Invalid memory name: {file_path}")))?;

        let mut base = self.dir.clone();
        if self.per_session {
            if let Some(session_id) = session_id {
                session::SessionStore::validate_id(session_id)
                    .map_err(|_| ToolError::invalid(format!("Invalid session id '{session_id}'")))?;
                base = base.join(session_id);
            }
        }
        Ok(base.join(name))
    }

    pub fn create(
        &self,
        file_path: &str,
        content: &str,
        session_id: Option<&str>,
    ) -> ToolResult {
        let path = self.resolve(file_path, session_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolError::internal(format!("memory store: {e}")))?;
        }
        std::fs::write(&path, content)
            .map_err(|e| ToolError::internal(format!("memory store: {e}")))?;
        Ok(crate::error::ToolResponse::new(
            format!("Memory saved: {}", display_name(&path)),
            serde_json::json!({"saved": true}),
        ))
    }

    pub fn read(&self, file_path: &str, session_id: Option<&str>) -> ToolResult {
        let path = self.resolve(file_path, session_id)?;
        if !path.exists() {
            return Err(ToolError::not_found(format!(
                "Memory not found: {file_path}"
            )));
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ToolError::internal(format!("memory store: {e}")))?;
        Ok(crate::error::ToolResponse::new(
            content,
            serde_json::json!({"file": display_name(&path)}),
        ))
    }

    pub fn update(
        &self,
        file_path: &str,
        content: &str,
        session_id: Option<&str>,
    ) -> ToolResult {
        let path = self.resolve(file_path, session_id)?;
        if !path.exists() {
            return Err(ToolError::not_found(format!(
                "Cannot update missing memory: {file_path}"
            )));
        }
        std::fs::write(&path, content)
            .map_err(|e| ToolError::internal(format!("memory store: {e}")))?;
        Ok(crate::error::ToolResponse::new(
            format!("Memory updated: {}", display_name(&path)),
            serde_json::json!({"updated": true}),
        ))
    }

    pub fn delete(&self, file_path: &str, session_id: Option<&str>) -> ToolResult {
        let path = self.resolve(file_path, session_id)?;
        if !path.exists() {
            return Err(ToolError::not_found(format!(
                "Memory not found: {file_path}"
            )));
        }
        std::fs::remove_file(&path)
            .map_err(|e| ToolError::internal(format!("memory store: {e}")))?;
        Ok(crate::error::ToolResponse::new(
            format!("Memory deleted: {}", display_name(&path)),
            serde_json::json!({"deleted": true}),
        ))
    }

    pub fn list(&self, session_id: Option<&str>) -> ToolResult {
        let mut base = self.dir.clone();
        if self.per_session {
            if let Some(session_id) = session_id {
                base = base.join(session_id);
            }
        }
        let mut names = Vec::new();
        if base.is_dir() {
            for entry in std::fs::read_dir(&base)
                .map_err(|e| ToolError::internal(format!("memory store: {e}")))?
            {
                let entry = entry.map_err(|e| ToolError::internal(format!("memory store: {e}")))?;
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        let text = if names.is_empty() {
            "No memories stored.".to_string()
        } else {
            format!("Memories ({}):\n{}", names.len(), names.join("\n"))
        };
        Ok(crate::error::ToolResponse::new(
            text,
            serde_json::json!({"memories": names}),
        ))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorReason;

    fn store(per_session: bool) -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("memories"), per_session);
        (dir, store)
    }

    #[test]
    fn crud_cycle() {
        let (_guard, store) = store(false);
        store.create("notes.md", "remember this", None).unwrap();
        let read = store.read("notes.md", None).unwrap();
        assert_eq!(read.text, "remember this");

        store.update("notes.md", "updated", None).unwrap();
        assert_eq!(store.read("notes.md", None).unwrap().text, "updated");

        store.delete("notes.md", None).unwrap();
        let err = store.read("notes.md", None).unwrap_err();
        assert_eq!(err.reason, ErrorReason::NotFound);
    }

    #[test]
    fn update_missing_is_not_found() {
        let (_guard, store) = store(false);
        let err = store.update("ghost.md", "x", None).unwrap_err();
        assert_eq!(err.reason, ErrorReason::NotFound);
    }

    #[test]
    fn traversal_is_rejected() {
        let (_guard, store) = store(false);
        let err = store.create("../../etc/passwd", "x", None).unwrap_err();
        assert_eq!(err.reason, ErrorReason::InvalidRequest);
        let err = store.read("..", None).unwrap_err();
        assert_eq!(err.reason, ErrorReason::InvalidRequest);
    }

    #[test]
    fn nested_paths_collapse_to_basename() {
        let (guard, store) = store(false);
        store.create("deeply/nested/note.md", "x", None).unwrap();
        assert!(guard.path().join("memories/note.md").exists());
        assert!(!guard.path().join("memories/deeply").exists());
    }

    #[test]
    fn sessions_are_isolated() {
        let (_guard, store) = store(true);
        store.create("note.md", "for s1", Some("s1")).unwrap();
        store.create("note.md", "for s2", Some("s2")).unwrap();
        assert_eq!(store.read("note.md", Some("s1")).unwrap().text, "for s1");
        assert_eq!(store.read("note.md", Some("s2")).unwrap().text, "for s2");

        let listed = store.list(Some("s1")).unwrap();
        assert_eq!(listed.meta["memories"], serde_json::json!(["note.md"]));
    }

    #[test]
    fn list_empty_store() {
        let (_guard, store) = store(false);
        let listed = store.list(None).unwrap();
        assert_eq!(listed.text, "No memories stored.");
    }
}
