//! Session lifecycle: creation, cached live instances, crash recovery,
//! cross-session search.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};
use crate::memory::{HistorySearch, SessionMemory, SlidingMemory, SummarisingMemory};
use crate::store::SessionStore;
use crate::types::{MemoryPolicy, SessionKind, SessionMetadata, TurnMetadata, TurnRecord};

/// Policy parameters applied to newly created sessions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionDefaults {
    pub policy: MemoryPolicy,
    /// Sliding: verbatim turns kept.
    pub max_turns: usize,
    /// Summarising: verbatim turns kept after a fold.
    pub keep_last: usize,
    /// Summarising: in-memory turns that trigger a fold.
    pub context_limit: usize,
    /// Live policy instances kept in memory before eviction.
    pub cache_cap: usize,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            policy: MemoryPolicy::Sliding,
            max_turns: 8,
            keep_last: 3,
            context_limit: 10,
            cache_cap: 64,
        }
    }
}

/// Summary payload for the `get_session_summary` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_type: SessionKind,
    pub policy: MemoryPolicy,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
    pub turn_count: u64,
    pub recent_turns: usize,
    pub summarised_turns: u64,
    pub entities: Vec<String>,
}

/// Owns the session store and the cache of live policy instances.
///
/// Each session's memory sits behind its own mutex; appending a turn holds
/// that lock across both the in-memory update and the log append, so turns
/// within a session are observed in append order. Different sessions are
/// fully independent.
pub struct SessionManager {
    store: SessionStore,
    live: DashMap<String, Arc<Mutex<SessionMemory>>>,
    defaults: SessionDefaults,
}

impl SessionManager {
    pub fn new(store: SessionStore, defaults: SessionDefaults) -> Self {
        Self {
            store,
            live: DashMap::new(),
            defaults,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn fresh_memory(&self, session_id: &str, kind: SessionKind, policy: MemoryPolicy) -> SessionMemory {
        match policy {
            MemoryPolicy::Sliding => {
                SessionMemory::Sliding(SlidingMemory::new(session_id, kind, self.defaults.max_turns))
            }
            MemoryPolicy::Summarising => SessionMemory::Summarising(SummarisingMemory::new(
                session_id,
                kind,
                self.defaults.keep_last,
                self.defaults.context_limit,
            )),
        }
    }

    /// Create a new session; refuses to shadow an existing one.
    pub fn create(
        &self,
        session_id: &str,
        kind: SessionKind,
        policy: Option<MemoryPolicy>,
    ) -> SessionResult<SessionMetadata> {
        SessionStore::validate_id(session_id)?;
        if self.store.exists(session_id) {
            return Err(SessionError::AlreadyExists(session_id.to_string()));
        }
        let policy = policy.unwrap_or(self.defaults.policy);
        let memory = self.fresh_memory(session_id, kind, policy);

        let now = chrono::Utc::now();
        let metadata = SessionMetadata {
            session_id: session_id.to_string(),
            session_type: kind,
            policy,
            created_at: now,
            last_updated: now,
            turn_count: 0,
        };
        self.store.save_metadata(&metadata)?;
        self.insert_live(session_id, memory);

        tracing::info!(session_id, kind = kind.as_str(), policy = policy.as_str(), "created session");
        Ok(metadata)
    }

    fn insert_live(&self, session_id: &str, memory: SessionMemory) -> Arc<Mutex<SessionMemory>> {
        let entry = Arc::new(Mutex::new(memory));
        self.live.insert(session_id.to_string(), entry.clone());
        self.evict_over_cap(session_id);
        entry
    }

    /// Everything is on disk, so eviction is only about memory pressure:
    /// drop arbitrary other entries until the cap holds.
    fn evict_over_cap(&self, keep: &str) {
        while self.live.len() > self.defaults.cache_cap.max(1) {
            let victim = self
                .live
                .iter()
                .map(|e| e.key().clone())
                .find(|k| k != keep);
            match victim {
                Some(key) => {
                    self.live.remove(&key);
                    tracing::debug!(session_id = %key, "evicted live session");
                }
                None => break,
            }
        }
    }

    /// Fetch the live instance, replaying the on-disk log if the session is
    /// not cached. Errors with [`SessionError::NotFound`] for unknown ids.
    pub fn load(&self, session_id: &str) -> SessionResult<Arc<Mutex<SessionMemory>>> {
        if let Some(entry) = self.live.get(session_id) {
            return Ok(entry.clone());
        }

        let metadata = self
            .store
            .load_metadata(session_id)?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let mut memory = self.fresh_memory(session_id, metadata.session_type, metadata.policy);
        match self.store.load(session_id) {
            Ok(turns) => {
                for turn in turns {
                    memory.replay(turn);
                }
            }
            Err(SessionError::NotFound(_)) => {} // metadata exists, no turns yet
            Err(e) => return Err(e),
        }

        tracing::debug!(session_id, "recovered session from log");
        Ok(self.insert_live(session_id, memory))
    }

    /// Append a turn: updates the policy state and the on-disk log under the
    /// session's lock.
    pub fn add_turn(
        &self,
        session_id: &str,
        query: &str,
        response: &str,
        metadata: TurnMetadata,
    ) -> SessionResult<TurnRecord> {
        let entry = self.load(session_id)?;
        let mut memory = entry.lock().unwrap_or_else(|e| e.into_inner());
        let turn = memory.add_turn(query, response, metadata);
        self.store.append(session_id, &turn)?;
        Ok(turn)
    }

    pub fn delete(&self, session_id: &str) -> SessionResult<bool> {
        self.live.remove(session_id);
        self.store.delete(session_id)
    }

    pub fn list(&self) -> SessionResult<Vec<SessionMetadata>> {
        let mut out = Vec::new();
        for session_id in self.store.list()? {
            if let Some(meta) = self.store.load_metadata(&session_id)? {
                out.push(meta);
            }
        }
        Ok(out)
    }

    pub fn summary(&self, session_id: &str) -> SessionResult<SessionSummary> {
        let metadata = self
            .store
            .load_metadata(session_id)?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let entry = self.load(session_id)?;
        let memory = entry.lock().unwrap_or_else(|e| e.into_inner());
        Ok(SessionSummary {
            session_id: metadata.session_id,
            session_type: metadata.session_type,
            policy: metadata.policy,
            created_at: metadata.created_at,
            last_updated: metadata.last_updated,
            turn_count: metadata.turn_count,
            recent_turns: memory.in_memory_len(),
            summarised_turns: memory.summarised_turns(),
            entities: memory.entities_mentioned().to_vec(),
        })
    }

    /// Keyword search over every known session.
    pub fn search_across(&self, keyword: &str) -> SessionResult<Vec<(String, HistorySearch)>> {
        let mut out = Vec::new();
        for session_id in self.store.list()? {
            let entry = self.load(&session_id)?;
            let memory = entry.lock().unwrap_or_else(|e| e.into_inner());
            let hit = memory.search(keyword);
            if hit.in_summary || !hit.turns.is_empty() {
                out.push((session_id, hit));
            }
        }
        Ok(out)
    }

    pub fn retention_sweep(&self, days: u32) -> SessionResult<usize> {
        let removed = self.store.retention_sweep(days)?;
        if removed > 0 {
            // Drop any live instances whose files were swept.
            self.live.retain(|id, _| self.store.exists(id));
        }
        Ok(removed)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
