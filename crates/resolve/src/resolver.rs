//! Resolving detected references to concrete entity names.

use entity::{EntityIndex, EntityKind, EntityTracker};
use serde::{Deserialize, Serialize};
use session::TurnRecord;

use crate::detector::{Reference, ReferenceDetector, ReferenceType};

/// A reference rewritten to a concrete entity, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub original_text: String,
    pub resolved_entity: String,
    pub confidence: f32,
    /// Evidence source: `session_history`, `entity_tracker`, or `code_index`.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// An entity name observed in session history, with where and amid what.
struct HistoryEntity {
    name: String,
    turn_id: u64,
    context: String,
}

/// Combines the detector with session history, the mention tracker, and the
/// entity index to rewrite referential queries.
#[derive(Default)]
pub struct ContextualResolver {
    detector: ReferenceDetector,
}

impl ContextualResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detector(&self) -> &ReferenceDetector {
        &self.detector
    }

    /// Detect references in `query` and resolve each against, in priority
    /// order: the session history, the tracker, and an unambiguous entity
    /// index. Returns the rewritten query (each resolved span replaced
    /// exactly once, left to right; unresolved spans untouched) and the
    /// resolution records.
    pub fn resolve(
        &self,
        query: &str,
        history: &[TurnRecord],
        tracker: Option<&EntityTracker>,
        index: Option<&EntityIndex>,
    ) -> (String, Vec<ResolvedReference>) {
        let references = self.detector.detect(query);
        if references.is_empty() {
            return (query.to_string(), Vec::new());
        }

        let accepted = non_overlapping(references);
        let history_entities = extract_history_entities(history);

        let mut spans: Vec<(usize, usize, String)> = Vec::new();
        let mut resolved = Vec::new();
        for reference in &accepted {
            if let Some(resolution) =
                self.resolve_one(reference, &history_entities, tracker, index)
            {
                spans.push((
                    reference.position,
                    reference.position + reference.text.len(),
                    resolution.resolved_entity.clone(),
                ));
                resolved.push(resolution);
            }
        }

        let rewritten = splice(query, &spans);
        tracing::info!(
            detected = accepted.len(),
            resolved = resolved.len(),
            "resolved query references"
        );
        (rewritten, resolved)
    }

    fn resolve_one(
        &self,
        reference: &Reference,
        history_entities: &[HistoryEntity],
        tracker: Option<&EntityTracker>,
        index: Option<&EntityIndex>,
    ) -> Option<ResolvedReference> {
        let entity_type = self.detector.extract_entity_type(&reference.text)?;
        let entity_type = canonical_type(entity_type);

        // Session history first, for the reference kinds that point backwards.
        if matches!(
            reference.ref_type,
            ReferenceType::Demonstrative | ReferenceType::Previous
        ) {
            if let Some(resolution) = resolve_from_history(reference, entity_type, history_entities)
            {
                return Some(resolution);
            }
        }

        // Tracker: the most recent mention of an entity of the right kind.
        // Typing a mention needs the index, so both must be present.
        if let (Some(tracker), Some(index)) = (tracker, index) {
            if let Some(kind) = kind_for(entity_type) {
                if let Some(mention) =
                    tracker.last_mention_where(|name| index.kind_of(name) == Some(kind))
                {
                    return Some(ResolvedReference {
                        original_text: reference.text.clone(),
                        resolved_entity: mention.entity_name,
                        confidence: reference.confidence * 0.8,
                        source: "entity_tracker".to_string(),
                        context: Some(mention.snippet),
                    });
                }
            }
        }

        // Code index, but only when the whole codebase has exactly one
        // entity of the requested kind.
        if let Some(index) = index {
            if let Some(kind) = kind_for(entity_type) {
                if let Some(record) = index.single_of_kind(kind) {
                    return Some(ResolvedReference {
                        original_text: reference.text.clone(),
                        resolved_entity: record.name.clone(),
                        confidence: reference.confidence * 0.5,
                        source: "code_index".to_string(),
                        context: Some(format!(
                            "only {} of its kind in the codebase",
                            record.name
                        )),
                    });
                }
            }
        }

        tracing::debug!(reference = %reference.text, "reference left unresolved");
        None
    }
}

/// Keep the highest-confidence reference for any overlapping spans, in
/// left-to-right order.
fn non_overlapping(mut references: Vec<Reference>) -> Vec<Reference> {
    references.sort_by(|a, b| {
        a.position.cmp(&b.position).then(
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    let mut accepted: Vec<Reference> = Vec::new();
    for reference in references {
        let end = reference.position + reference.text.len();
        let overlaps = accepted.iter().any(|a| {
            let a_end = a.position + a.text.len();
            reference.position < a_end && a.position < end
        });
        if !overlaps {
            accepted.push(reference);
        }
    }
    accepted
}

/// Replace each span with its resolved entity, exactly once, left to right.
/// Spans are byte ranges into the original query and never overlap.
fn splice(query: &str, spans: &[(usize, usize, String)]) -> String {
    let mut spans = spans.to_vec();
    spans.sort_by_key(|s| s.0);
    let mut out = String::with_capacity(query.len());
    let mut cursor = 0;
    for (start, end, replacement) in spans {
        out.push_str(&query[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&query[cursor..]);
    out
}

/// Entity names mentioned in history: structured metadata first, plus
/// identifier-shaped tokens with a few words of surrounding context.
fn extract_history_entities(history: &[TurnRecord]) -> Vec<HistoryEntity> {
    let mut entities = Vec::new();
    for turn in history {
        let context = format!("{} {}", turn.query, turn.response);
        for name in &turn.metadata.entities {
            entities.push(HistoryEntity {
                name: name.clone(),
                turn_id: turn.turn_id,
                context: context.clone(),
            });
        }

        let words: Vec<&str> = context.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            let token = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_');
            if token.contains('_') && token.chars().all(|c| c.is_alphanumeric() || c == '_') {
                let lo = i.saturating_sub(5);
                let hi = (i + 6).min(words.len());
                entities.push(HistoryEntity {
                    name: token.to_string(),
                    turn_id: turn.turn_id,
                    context: words[lo..hi].join(" "),
                });
            }
        }
    }
    entities
}

fn resolve_from_history(
    reference: &Reference,
    entity_type: &str,
    entities: &[HistoryEntity],
) -> Option<ResolvedReference> {
    let keywords: &[&str] = match entity_type {
        "function" | "method" => &["function", "método", "metodo", "def", "fn", "()"],
        "class" => &["class", "clase", "struct"],
        "bug" | "error" | "issue" => &["bug", "error", "issue", "fail", "problema"],
        "file" => &["file", "archivo", ".py", ".rs", ".js", ".ts"],
        _ => &[],
    };

    let relevant: Vec<&HistoryEntity> = entities
        .iter()
        .filter(|e| {
            let context = e.context.to_lowercase();
            keywords.iter().any(|kw| context.contains(kw))
        })
        .collect();
    // No typed match in context: fall back to every mentioned entity.
    let pool: Vec<&HistoryEntity> = if relevant.is_empty() {
        entities.iter().collect()
    } else {
        relevant
    };

    let best = pool.into_iter().max_by_key(|e| e.turn_id)?;
    Some(ResolvedReference {
        original_text: reference.text.clone(),
        resolved_entity: best.name.clone(),
        confidence: reference.confidence * 0.9,
        source: "session_history".to_string(),
        context: Some(best.context.chars().take(100).collect()),
    })
}

/// Spanish head nouns normalise to their English counterparts.
fn canonical_type(entity_type: &str) -> &str {
    match entity_type {
        "función" | "funcion" => "function",
        "método" | "metodo" => "method",
        "clase" => "class",
        "módulo" | "modulo" => "module",
        "archivo" => "file",
        "problema" => "bug",
        "prueba" => "test",
        "código" | "codigo" => "code",
        other => other,
    }
}

fn kind_for(entity_type: &str) -> Option<EntityKind> {
    match entity_type {
        "function" | "method" => Some(EntityKind::Function),
        "class" => Some(EntityKind::Class),
        "endpoint" => Some(EntityKind::Endpoint),
        "variable" => Some(EntityKind::Constant),
        _ => None,
    }
}
