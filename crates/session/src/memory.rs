//! In-memory session policies: sliding window and summarising.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{SessionKind, TurnMetadata, TurnRecord};

/// Pluggable summariser for [`SummarisingMemory`].
pub type Summarizer = fn(&[TurnRecord], SessionKind) -> String;

/// Result of a keyword search over a session's history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySearch {
    /// Whether the keyword appears in the compressed summary (always false
    /// for the sliding policy, which keeps no summary).
    pub in_summary: bool,
    pub turns: Vec<TurnRecord>,
}

/// Rule-based digest: turn range, session type, time range, entities, files,
/// and the first few queries. Good enough to re-anchor an agent without an
/// LLM in the loop; swap in something smarter via [`Summarizer`] if needed.
pub fn default_summarizer(turns: &[TurnRecord], kind: SessionKind) -> String {
    if turns.is_empty() {
        return String::new();
    }

    let mut entities: Vec<String> = Vec::new();
    let mut files: Vec<String> = Vec::new();
    for turn in turns {
        for e in &turn.metadata.entities {
            if !entities.contains(e) {
                entities.push(e.clone());
            }
        }
        for f in &turn.metadata.files {
            if !files.contains(f) {
                files.push(f.clone());
            }
        }
    }
    entities.sort();
    files.sort();

    let mut parts = vec![
        format!(
            "Summary of {} turns (Turn {} to {}):",
            turns.len(),
            turns[0].turn_id,
            turns[turns.len() - 1].turn_id
        ),
        format!("Session Type: {}", kind.as_str()),
        format!(
            "Time Range: {} to {}",
            turns[0].timestamp.to_rfc3339(),
            turns[turns.len() - 1].timestamp.to_rfc3339()
        ),
    ];

    if !entities.is_empty() {
        let shown: Vec<&str> = entities.iter().take(10).map(String::as_str).collect();
        parts.push(format!("Entities Discussed: {}", shown.join(", ")));
    }
    if !files.is_empty() {
        let shown: Vec<&str> = files.iter().take(5).map(String::as_str).collect();
        parts.push(format!("Files Touched: {}", shown.join(", ")));
    }

    parts.push("\nKey Activities:".to_string());
    for (i, turn) in turns.iter().take(5).enumerate() {
        let query: String = turn.query.chars().take(100).collect();
        parts.push(format!("  {}. {query}...", i + 1));
    }

    parts.join("\n")
}

fn summarizer_default() -> Summarizer {
    default_summarizer
}

/// Keeps the last `max_turns` turns verbatim; older turns are simply gone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingMemory {
    pub session_id: String,
    pub kind: SessionKind,
    pub max_turns: usize,
    pub created_at: DateTime<Utc>,
    turns: Vec<TurnRecord>,
    next_turn_id: u64,
    entities_mentioned: Vec<String>,
}

impl SlidingMemory {
    pub fn new(session_id: impl Into<String>, kind: SessionKind, max_turns: usize) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            max_turns: max_turns.max(1),
            created_at: Utc::now(),
            turns: Vec::new(),
            next_turn_id: 1,
            entities_mentioned: Vec::new(),
        }
    }

    fn add(&mut self, query: String, response: String, metadata: TurnMetadata) -> TurnRecord {
        let turn = TurnRecord::new(self.next_turn_id, query, response, metadata);
        self.replay(turn.clone());
        turn
    }

    /// Insert a pre-built turn, preserving its id and timestamp. Used for
    /// crash recovery from the log.
    fn replay(&mut self, turn: TurnRecord) {
        self.next_turn_id = self.next_turn_id.max(turn.turn_id + 1);
        for entity in &turn.metadata.entities {
            if !self.entities_mentioned.contains(entity) {
                self.entities_mentioned.push(entity.clone());
            }
        }
        self.turns.push(turn);
        if self.turns.len() > self.max_turns {
            let dropped = self.turns.remove(0);
            tracing::debug!(
                session_id = %self.session_id,
                turn_id = dropped.turn_id,
                "sliding window dropped oldest turn"
            );
        }
    }

    fn context_window(&self) -> String {
        if self.turns.is_empty() {
            return String::new();
        }
        let mut parts = vec![
            format!("Session: {} (Type: {})", self.session_id, self.kind.as_str()),
            format!("Recent conversation ({} turns):\n", self.turns.len()),
        ];
        for turn in &self.turns {
            parts.push(format!("Turn {}:", turn.turn_id));
            parts.push(format!("User: {}", turn.query));
            let response: String = turn.response.chars().take(200).collect();
            parts.push(format!("Assistant: {response}..."));
            parts.push(String::new());
        }
        parts.join("\n")
    }
}

/// Keeps the last `keep_last` turns verbatim; when the in-memory turn count
/// exceeds `context_limit`, older turns are compressed into an append-only
/// summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarisingMemory {
    pub session_id: String,
    pub kind: SessionKind,
    pub keep_last: usize,
    pub context_limit: usize,
    pub created_at: DateTime<Utc>,
    summary: String,
    summarised_turns: u64,
    last_summarised_at: Option<DateTime<Utc>>,
    recent: Vec<TurnRecord>,
    next_turn_id: u64,
    entities_mentioned: Vec<String>,
    #[serde(skip, default = "summarizer_default")]
    summarizer: Summarizer,
}

impl SummarisingMemory {
    pub fn new(
        session_id: impl Into<String>,
        kind: SessionKind,
        keep_last: usize,
        context_limit: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            kind,
            keep_last: keep_last.max(1),
            context_limit: context_limit.max(1),
            created_at: Utc::now(),
            summary: String::new(),
            summarised_turns: 0,
            last_summarised_at: None,
            recent: Vec::new(),
            next_turn_id: 1,
            entities_mentioned: Vec::new(),
            summarizer: default_summarizer,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn summarised_turns(&self) -> u64 {
        self.summarised_turns
    }

    pub fn last_summarised_at(&self) -> Option<DateTime<Utc>> {
        self.last_summarised_at
    }

    fn add(&mut self, query: String, response: String, metadata: TurnMetadata) -> TurnRecord {
        let turn = TurnRecord::new(self.next_turn_id, query, response, metadata);
        self.replay(turn.clone());
        turn
    }

    fn replay(&mut self, turn: TurnRecord) {
        self.next_turn_id = self.next_turn_id.max(turn.turn_id + 1);
        for entity in &turn.metadata.entities {
            if !self.entities_mentioned.contains(entity) {
                self.entities_mentioned.push(entity.clone());
            }
        }
        self.recent.push(turn);
        if self.recent.len() > self.context_limit {
            self.fold();
        }
    }

    /// Compress everything but the `keep_last` most recent turns into the
    /// running summary.
    fn fold(&mut self) {
        if self.recent.len() <= self.keep_last {
            return;
        }
        let split = self.recent.len() - self.keep_last;
        let folded: Vec<TurnRecord> = self.recent.drain(..split).collect();
        let digest = (self.summarizer)(&folded, self.kind);

        if self.summary.is_empty() {
            self.summary = digest;
        } else {
            self.summary.push_str("\n\n--- Additional Context ---\n");
            self.summary.push_str(&digest);
        }
        self.summarised_turns += folded.len() as u64;
        self.last_summarised_at = Some(Utc::now());

        tracing::info!(
            session_id = %self.session_id,
            folded = folded.len(),
            kept = self.recent.len(),
            "summarised older turns"
        );
    }

    fn context_window(&self) -> String {
        let mut parts = vec![format!(
            "Session: {} (Type: {})",
            self.session_id,
            self.kind.as_str()
        )];
        if !self.summary.is_empty() {
            parts.push("\n=== Previous Context (Summarised) ===".to_string());
            parts.push(self.summary.clone());
            parts.push(format!("({} turns summarised)", self.summarised_turns));
        }
        if !self.recent.is_empty() {
            parts.push("\n=== Recent Conversation ===".to_string());
            for turn in &self.recent {
                parts.push(format!("\nTurn {}:", turn.turn_id));
                parts.push(format!("User: {}", turn.query));
                let response: String = turn.response.chars().take(300).collect();
                parts.push(format!("Assistant: {response}..."));
            }
        }
        parts.join("\n")
    }
}

/// A session under either policy. The variants share every operation the
/// engine needs, so callers never branch on the policy themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum SessionMemory {
    Sliding(SlidingMemory),
    Summarising(SummarisingMemory),
}

impl SessionMemory {
    pub fn session_id(&self) -> &str {
        match self {
            SessionMemory::Sliding(m) => &m.session_id,
            SessionMemory::Summarising(m) => &m.session_id,
        }
    }

    pub fn kind(&self) -> SessionKind {
        match self {
            SessionMemory::Sliding(m) => m.kind,
            SessionMemory::Summarising(m) => m.kind,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            SessionMemory::Sliding(m) => m.created_at,
            SessionMemory::Summarising(m) => m.created_at,
        }
    }

    /// Append a turn, assigning the next monotonic id, and return the
    /// appended record.
    pub fn add_turn(
        &mut self,
        query: impl Into<String>,
        response: impl Into<String>,
        metadata: TurnMetadata,
    ) -> TurnRecord {
        match self {
            SessionMemory::Sliding(m) => m.add(query.into(), response.into(), metadata),
            SessionMemory::Summarising(m) => m.add(query.into(), response.into(), metadata),
        }
    }

    /// Re-insert a logged turn during crash recovery, preserving id and
    /// timestamp.
    pub fn replay(&mut self, turn: TurnRecord) {
        match self {
            SessionMemory::Sliding(m) => m.replay(turn),
            SessionMemory::Summarising(m) => m.replay(turn),
        }
    }

    /// The id the next appended turn will receive.
    pub fn next_turn_id(&self) -> u64 {
        match self {
            SessionMemory::Sliding(m) => m.next_turn_id,
            SessionMemory::Summarising(m) => m.next_turn_id,
        }
    }

    /// The `n` most recent verbatim turns (oldest first).
    pub fn recent(&self, n: usize) -> Vec<TurnRecord> {
        let turns = match self {
            SessionMemory::Sliding(m) => &m.turns,
            SessionMemory::Summarising(m) => &m.recent,
        };
        let start = turns.len().saturating_sub(n);
        turns[start..].to_vec()
    }

    /// Verbatim turns currently held in memory.
    pub fn in_memory_len(&self) -> usize {
        match self {
            SessionMemory::Sliding(m) => m.turns.len(),
            SessionMemory::Summarising(m) => m.recent.len(),
        }
    }

    /// The material a retrieval call should see for this session.
    pub fn context_window(&self) -> String {
        match self {
            SessionMemory::Sliding(m) => m.context_window(),
            SessionMemory::Summarising(m) => m.context_window(),
        }
    }

    pub fn search(&self, keyword: &str) -> HistorySearch {
        let keyword = keyword.to_lowercase();
        let (in_summary, turns) = match self {
            SessionMemory::Sliding(m) => (false, &m.turns),
            SessionMemory::Summarising(m) => {
                (m.summary.to_lowercase().contains(&keyword), &m.recent)
            }
        };
        let matching = turns
            .iter()
            .filter(|t| {
                t.query.to_lowercase().contains(&keyword)
                    || t.response.to_lowercase().contains(&keyword)
            })
            .cloned()
            .collect();
        HistorySearch {
            in_summary,
            turns: matching,
        }
    }

    /// Insertion-ordered set of entity names seen across all turns.
    pub fn entities_mentioned(&self) -> &[String] {
        match self {
            SessionMemory::Sliding(m) => &m.entities_mentioned,
            SessionMemory::Summarising(m) => &m.entities_mentioned,
        }
    }

    pub fn summarised_turns(&self) -> u64 {
        match self {
            SessionMemory::Sliding(_) => 0,
            SessionMemory::Summarising(m) => m.summarised_turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entities: &[&str]) -> TurnMetadata {
        TurnMetadata {
            entities: entities.iter().map(|s| s.to_string()).collect(),
            files: vec![],
        }
    }

    #[test]
    fn sliding_drops_exactly_the_oldest() {
        let mut memory = SessionMemory::Sliding(SlidingMemory::new("s1", SessionKind::Bugfix, 3));
        for i in 1..=4 {
            memory.add_turn(format!("q{i}"), format!("r{i}"), TurnMetadata::default());
        }
        let recent = memory.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].turn_id, 2);
        assert_eq!(recent[2].turn_id, 4);
    }

    #[test]
    fn turn_ids_stay_monotonic_after_drops() {
        let mut memory = SessionMemory::Sliding(SlidingMemory::new("s1", SessionKind::General, 2));
        for i in 1..=5 {
            let turn = memory.add_turn(format!("q{i}"), "r", TurnMetadata::default());
            assert_eq!(turn.turn_id, i);
        }
    }

    #[test]
    fn summarising_folds_old_turns() {
        let mut memory =
            SessionMemory::Summarising(SummarisingMemory::new("s1", SessionKind::Feature, 2, 4));
        for i in 1..=5 {
            memory.add_turn(format!("q{i}"), format!("r{i}"), meta(&["login"]));
        }
        // Limit 4 exceeded at turn 5: turns 1..=3 folded, 4 and 5 kept.
        assert_eq!(memory.summarised_turns(), 3);
        assert_eq!(memory.in_memory_len(), 2);
        let SessionMemory::Summarising(m) = &memory else {
            unreachable!()
        };
        assert!(m.summary().contains("Summary of 3 turns"));
        assert!(m.summary().contains("login"));
        assert!(m.last_summarised_at().is_some());
    }

    #[test]
    fn summary_and_recent_cover_the_full_prefix() {
        let mut memory =
            SessionMemory::Summarising(SummarisingMemory::new("s1", SessionKind::General, 2, 3));
        for i in 1..=9 {
            memory.add_turn(format!("q{i}"), "r", TurnMetadata::default());
        }
        assert_eq!(
            memory.summarised_turns() + memory.in_memory_len() as u64,
            9
        );
    }

    #[test]
    fn custom_summarizer_is_used() {
        fn stub(turns: &[TurnRecord], _: SessionKind) -> String {
            format!("folded {} turns", turns.len())
        }
        let mut memory = SessionMemory::Summarising(
            SummarisingMemory::new("s1", SessionKind::General, 1, 2).with_summarizer(stub),
        );
        for i in 1..=3 {
            memory.add_turn(format!("q{i}"), "r", TurnMetadata::default());
        }
        let SessionMemory::Summarising(m) = &memory else {
            unreachable!()
        };
        assert_eq!(m.summary(), "folded 2 turns");
    }

    #[test]
    fn context_window_includes_summary_and_recent() {
        let mut memory =
            SessionMemory::Summarising(SummarisingMemory::new("s1", SessionKind::Review, 1, 2));
        for i in 1..=3 {
            memory.add_turn(format!("q{i}"), format!("r{i}"), TurnMetadata::default());
        }
        let window = memory.context_window();
        assert!(window.contains("Previous Context (Summarised)"));
        assert!(window.contains("Recent Conversation"));
        assert!(window.contains("q3"));
    }

    #[test]
    fn search_looks_in_summary_and_turns() {
        let mut memory =
            SessionMemory::Summarising(SummarisingMemory::new("s1", SessionKind::General, 1, 2));
        memory.add_turn("fix the login bug", "done", meta(&["login"]));
        memory.add_turn("now logout", "ok", TurnMetadata::default());
        memory.add_turn("and billing", "ok", TurnMetadata::default());

        let hit = memory.search("login");
        assert!(hit.in_summary);
        assert!(hit.turns.is_empty());

        let hit = memory.search("billing");
        assert_eq!(hit.turns.len(), 1);
    }

    #[test]
    fn entities_are_insertion_ordered_and_deduped() {
        let mut memory = SessionMemory::Sliding(SlidingMemory::new("s1", SessionKind::General, 8));
        memory.add_turn("q", "r", meta(&["login", "logout"]));
        memory.add_turn("q", "r", meta(&["login", "billing"]));
        assert_eq!(memory.entities_mentioned(), &["login", "logout", "billing"]);
    }

    #[test]
    fn serde_round_trip_preserves_turns_and_summary_state() {
        let mut memory =
            SessionMemory::Summarising(SummarisingMemory::new("s1", SessionKind::Feature, 2, 3));
        for i in 1..=5 {
            memory.add_turn(format!("q{i}"), format!("r{i}"), meta(&["login"]));
        }
        let json = serde_json::to_string(&memory).unwrap();
        let back: SessionMemory = serde_json::from_str(&json).unwrap();

        assert_eq!(back.recent(10), memory.recent(10));
        assert_eq!(back.summarised_turns(), memory.summarised_turns());
        assert_eq!(back.entities_mentioned(), memory.entities_mentioned());
        let (SessionMemory::Summarising(a), SessionMemory::Summarising(b)) = (&memory, &back)
        else {
            unreachable!()
        };
        assert_eq!(a.summary(), b.summary());
    }

    #[test]
    fn sliding_serde_round_trip() {
        let mut memory = SessionMemory::Sliding(SlidingMemory::new("s1", SessionKind::Bugfix, 4));
        memory.add_turn("q1", "r1", TurnMetadata::default());
        let json = serde_json::to_string(&memory).unwrap();
        let back: SessionMemory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.recent(10), memory.recent(10));
        assert_eq!(back.kind(), SessionKind::Bugfix);
    }
}
