//! Optional knowledge packages: `skills/<skill_id>/SKILL.md` documents that
//! can be listed, ranked against a query, and created at runtime.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use vector::{cosine_similarity, Embedder};

use crate::error::{ToolError, ToolResponse, ToolResult};

/// Lines from the head of a SKILL.md used for relevance embedding.
const EMBED_HEAD_LINES: usize = 40;

#[derive(Debug, Clone, Serialize)]
pub struct SkillInfo {
    pub skill_id: String,
    pub description: String,
}

/// Skill packages on disk. Stateless between calls; the directory is small
/// and rescanning keeps runtime-created skills visible immediately.
pub struct SkillsStore {
    dir: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl SkillsStore {
    pub fn new(dir: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dir: dir.into(),
            embedder,
        }
    }

    fn scan(&self) -> Vec<(SkillInfo, String)> {
        let mut skills = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return skills;
        };
        for entry in entries.flatten() {
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let skill_id = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path().join("SKILL.md");
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let description = content
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty() && !l.starts_with('#'))
                .unwrap_or("")
                .to_string();
            skills.push((SkillInfo { skill_id, description }, content));
        }
        skills.sort_by(|a, b| a.0.skill_id.cmp(&b.0.skill_id));
        skills
    }

    pub fn list(&self) -> ToolResult {
        let skills: Vec<SkillInfo> = self.scan().into_iter().map(|(info, _)| info).collect();
        let text = if skills.is_empty() {
            "No skills installed.".to_string()
        } else {
            let lines: Vec<String> = skills
                .iter()
                .map(|s| format!("- {}: {}", s.skill_id, s.description))
                .collect();
            format!("Skills ({}):\n{}", skills.len(), lines.join("\n"))
        };
        Ok(ToolResponse::new(
            text,
            serde_json::json!({"skills": skills}),
        ))
    }

    /// Rank skills by cosine between the query and the head of each
    /// SKILL.md.
    pub fn relevant(&self, query: &str, top_k: usize) -> ToolResult {
        let query_vec = self.embedder.embed(query);
        let mut scored: Vec<(f32, SkillInfo, String)> = self
            .scan()
            .into_iter()
            .map(|(info, content)| {
                let head: String = content
                    .lines()
                    .take(EMBED_HEAD_LINES)
                    .collect::<Vec<_>>()
                    .join("\n");
                let score = cosine_similarity(&query_vec, &self.embedder.embed(&head));
                (score, info, content)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        if scored.is_empty() {
            return Ok(ToolResponse::new(
                "No skills installed.",
                serde_json::json!({"skills": []}),
            ));
        }

        let blocks: Vec<String> = scored
            .iter()
            .map(|(score, info, content)| {
                format!("--- Skill {} (score: {score:.2}) ---\n{content}", info.skill_id)
            })
            .collect();
        let meta: Vec<serde_json::Value> = scored
            .iter()
            .map(|(score, info, _)| {
                serde_json::json!({"skill_id": info.skill_id, "score": score})
            })
            .collect();
        Ok(ToolResponse::new(
            blocks.join("\n\n"),
            serde_json::json!({"skills": meta}),
        ))
    }

    pub fn create(&self, skill_id: &str, content: &str) -> ToolResult {
        let valid = !skill_id.is_empty()
            && !skill_id.starts_with('.')
            && skill_id
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ToolError::invalid(format!("Invalid skill id '{skill_id}'")));
        }
        let dir = self.dir.join(skill_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ToolError::internal(format!("skills store: {e}")))?;
        std::fs::write(dir.join("SKILL.md"), content)
            .map_err(|e| ToolError::internal(format!("skills store: {e}")))?;
        Ok(ToolResponse::new(
            format!("Skill created: {skill_id}"),
            serde_json::json!({"skill_id": skill_id, "created": true}),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector::HashEmbedder;

    fn store() -> (tempfile::TempDir, SkillsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SkillsStore::new(
            dir.path().join("skills"),
            Arc::new(HashEmbedder::new(32)) as Arc<dyn Embedder>,
        );
        (dir, store)
    }

    #[test]
    fn create_then_list() {
        let (_guard, store) = store();
        store
            .create("release-checklist", "# Release\nSteps before shipping.\n")
            .unwrap();
        let listed = store.list().unwrap();
        assert!(listed.text.contains("release-checklist"));
        assert!(listed.text.contains("Steps before shipping."));
    }

    #[test]
    fn invalid_skill_ids_are_rejected() {
        let (_guard, store) = store();
        for bad in ["", "..", "a/b", ".hidden"] {
            assert!(store.create(bad, "x").is_err());
        }
    }

    #[test]
    fn relevant_returns_at_most_top_k() {
        let (_guard, store) = store();
        for i in 0..4 {
            store
                .create(&format!("skill-{i}"), &format!("# S{i}\nbody {i}\n"))
                .unwrap();
        }
        let out = store.relevant("body", 2).unwrap();
        assert_eq!(out.meta["skills"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_guard, store) = store();
        assert_eq!(store.list().unwrap().text, "No skills installed.");
        assert_eq!(store.relevant("anything", 3).unwrap().text, "No skills installed.");
    }
}
