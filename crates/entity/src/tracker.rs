//! Cross-session mention tracking: which entities the conversation touched,
//! where, and alongside what.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::EntityResult;
use crate::index::EntityIndex;
use crate::types::EntityMention;

/// Characters of context kept on each side of a mention.
const SNIPPET_RADIUS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub entities_tracked: usize,
    pub total_mentions: usize,
    pub sessions: usize,
}

#[derive(Default, Serialize, Deserialize)]
struct TrackerState {
    /// entity name -> mentions, in record order.
    mentions: HashMap<String, Vec<EntityMention>>,
    /// session id -> entity names seen in it.
    session_entities: HashMap<String, BTreeSet<String>>,
}

/// Tracks entity mentions across sessions behind a single lock. Reads and
/// writes are both short; contention is not a concern at tool-call rates.
#[derive(Default)]
pub struct EntityTracker {
    state: Mutex<TrackerState>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a turn's query and response for verbatim occurrences of known
    /// entity names and record one mention per matched name. Returns the
    /// names found.
    pub fn record_turn(
        &self,
        index: &EntityIndex,
        session_id: &str,
        turn_id: u64,
        query: &str,
        response: &str,
    ) -> Vec<String> {
        let text = format!("{query} {response}");
        let lower = text.to_lowercase();

        let mut found = Vec::new();
        for name in index.names() {
            let needle = name.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            if let Some(at) = lower.find(&needle) {
                if !found.iter().any(|f: &String| f.eq_ignore_ascii_case(name)) {
                    found.push(name.to_string());
                    self.record_mention(name, session_id, turn_id, snippet(&text, &lower, at, needle.len()));
                }
            }
        }
        found
    }

    fn record_mention(&self, name: &str, session_id: &str, turn_id: u64, snippet: String) {
        let mention = EntityMention {
            entity_name: name.to_string(),
            session_id: session_id.to_string(),
            turn_id,
            snippet,
            timestamp: Utc::now(),
        };
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .mentions
            .entry(name.to_string())
            .or_default()
            .push(mention);
        state
            .session_entities
            .entry(session_id.to_string())
            .or_default()
            .insert(name.to_string());
        tracing::debug!(entity = name, session_id, turn_id, "recorded mention");
    }

    pub fn mentions(&self, name: &str) -> Vec<EntityMention> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.mentions.get(name).cloned().unwrap_or_default()
    }

    /// Most recent mention of an entity, by timestamp then turn id.
    pub fn last_mention(&self, name: &str) -> Option<EntityMention> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .mentions
            .get(name)?
            .iter()
            .max_by_key(|m| (m.timestamp, m.turn_id))
            .cloned()
    }

    /// Most recent mention across all entities whose name passes `filter`.
    pub fn last_mention_where<F>(&self, filter: F) -> Option<EntityMention>
    where
        F: Fn(&str) -> bool,
    {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .mentions
            .iter()
            .filter(|(name, _)| filter(name))
            .flat_map(|(_, mentions)| mentions.iter())
            .max_by_key(|m| (m.timestamp, m.turn_id))
            .cloned()
    }

    pub fn entities_for_session(&self, session_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .session_entities
            .get(session_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Entities most often co-mentioned in the same sessions as `name`,
    /// ranked by co-occurrence count (descending, then alphabetical).
    pub fn related(&self, name: &str, k: usize) -> Vec<(String, usize)> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let sessions: BTreeSet<&String> = state
            .mentions
            .get(name)
            .map(|mentions| mentions.iter().map(|m| &m.session_id).collect())
            .unwrap_or_default();

        let mut counts: HashMap<&String, usize> = HashMap::new();
        for session in sessions {
            if let Some(entities) = state.session_entities.get(session.as_str()) {
                for other in entities {
                    if other != name {
                        *counts.entry(other).or_default() += 1;
                    }
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(n, c)| (n.clone(), c))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }

    pub fn stats(&self) -> TrackerStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        TrackerStats {
            entities_tracked: state.mentions.len(),
            total_mentions: state.mentions.values().map(Vec::len).sum(),
            sessions: state.session_entities.len(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EntityResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::write(path, serde_json::to_vec_pretty(&*state)?)?;
        Ok(())
    }

    pub fn load(&self, path: impl AsRef<Path>) -> EntityResult<bool> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(false);
        }
        let loaded: TrackerState = serde_json::from_slice(&std::fs::read(path)?)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = loaded;
        tracing::info!(entities = state.mentions.len(), "loaded entity tracking");
        Ok(true)
    }
}

/// ±[`SNIPPET_RADIUS`] characters of context around a match. Works on the
/// lowercased text's byte offset, stepping to char boundaries so multibyte
/// input never splits.
fn snippet(text: &str, lower: &str, at: usize, match_len: usize) -> String {
    // Lowercasing can change byte lengths for some characters; when it does,
    // cut the snippet from the lowercased text rather than guessing offsets.
    let source = if text.len() == lower.len() { text } else { lower };
    let mut start = at.saturating_sub(SNIPPET_RADIUS);
    while start > 0 && !source.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (at + match_len + SNIPPET_RADIUS).min(source.len());
    while end < source.len() && !source.is_char_boundary(end) {
        end += 1;
    }
    source[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::PythonScanner;
    use crate::scan::SourceScanner;

    fn index_with(names_source: &str) -> EntityIndex {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.py"), names_source).unwrap();
        let mut index = EntityIndex::with_default_scanners();
        index.index_directory(dir.path(), false).unwrap();
        index
    }

    #[test]
    fn record_turn_matches_known_names_only() {
        let index = index_with("def login(u):\n    pass\n\ndef logout(u):\n    pass\n");
        let tracker = EntityTracker::new();
        let found = tracker.record_turn(&index, "s1", 1, "show me login", "login lives in auth.py");
        assert_eq!(found, vec!["login"]);
        assert_eq!(tracker.mentions("login").len(), 1);
        assert!(tracker.mentions("logout").is_empty());
    }

    #[test]
    fn snippets_carry_surrounding_context() {
        let index = index_with("def process_payment(x):\n    pass\n");
        let tracker = EntityTracker::new();
        let long_prefix = "x".repeat(120);
        tracker.record_turn(
            &index,
            "s1",
            1,
            &format!("{long_prefix} call process_payment here"),
            "",
        );
        let mention = tracker.last_mention("process_payment").unwrap();
        assert!(mention.snippet.contains("process_payment"));
        assert!(mention.snippet.len() <= "process_payment".len() + 2 * SNIPPET_RADIUS + 8);
    }

    #[test]
    fn snippet_survives_multibyte_text() {
        let index = index_with("def login(u):\n    pass\n");
        let tracker = EntityTracker::new();
        let found = tracker.record_turn(&index, "s1", 1, "revisá el código de login por favor 🌍", "");
        assert_eq!(found, vec!["login"]);
        assert!(tracker.last_mention("login").unwrap().snippet.contains("login"));
    }

    #[test]
    fn last_mention_prefers_latest() {
        let index = index_with("def login(u):\n    pass\n");
        let tracker = EntityTracker::new();
        tracker.record_turn(&index, "s1", 1, "login once", "");
        tracker.record_turn(&index, "s1", 2, "login twice", "");
        assert_eq!(tracker.last_mention("login").unwrap().turn_id, 2);
    }

    #[test]
    fn related_ranks_by_session_cooccurrence() {
        let index = index_with(
            "def login(u):\n    pass\n\ndef logout(u):\n    pass\n\ndef billing(u):\n    pass\n",
        );
        let tracker = EntityTracker::new();
        tracker.record_turn(&index, "s1", 1, "login and logout", "");
        tracker.record_turn(&index, "s2", 1, "login and logout again", "");
        tracker.record_turn(&index, "s3", 1, "login and billing", "");

        let related = tracker.related("login", 5);
        assert_eq!(related[0], ("logout".to_string(), 2));
        assert_eq!(related[1], ("billing".to_string(), 1));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let index = index_with("def login(u):\n    pass\n");
        let tracker = EntityTracker::new();
        tracker.record_turn(&index, "s1", 1, "about login", "");
        let path = dir.path().join("code_index/entity_tracking.json");
        tracker.save(&path).unwrap();

        let restored = EntityTracker::new();
        assert!(restored.load(&path).unwrap());
        assert_eq!(restored.mentions("login").len(), 1);
        assert_eq!(restored.entities_for_session("s1"), vec!["login"]);
    }

    #[test]
    fn stats_count_everything() {
        let index = index_with("def login(u):\n    pass\n\ndef logout(u):\n    pass\n");
        let tracker = EntityTracker::new();
        tracker.record_turn(&index, "s1", 1, "login and logout", "");
        tracker.record_turn(&index, "s2", 1, "just login", "");
        let stats = tracker.stats();
        assert_eq!(stats.entities_tracked, 2);
        assert_eq!(stats.total_mentions, 3);
        assert_eq!(stats.sessions, 2);
    }
}
