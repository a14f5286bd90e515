//! Rule-based detection of referential phrases.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Head nouns that make a phrase a code reference, English and Spanish.
const ENTITY_KEYWORDS: &[&str] = &[
    "function", "method", "class", "module", "variable", "bug", "error", "issue", "feature",
    "file", "endpoint", "test",
    // Spanish
    "función", "funcion", "método", "metodo", "clase", "módulo", "modulo", "archivo", "código",
    "codigo", "problema", "prueba",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    /// "that function", "esta clase"
    Demonstrative,
    /// "it", "them", "lo", "la"
    Pronoun,
    /// "the previous bug", "el anterior error"
    Previous,
    /// "the function" — only a reference when context narrows it
    Implicit,
}

impl ReferenceType {
    fn confidence(&self) -> f32 {
        match self {
            ReferenceType::Demonstrative => 0.9,
            ReferenceType::Previous => 0.85,
            ReferenceType::Pronoun => 0.7,
            ReferenceType::Implicit => 0.6,
        }
    }
}

/// A detected referential phrase in a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// The matched span, verbatim.
    pub text: String,
    #[serde(rename = "type")]
    pub ref_type: ReferenceType,
    /// Byte offset of the span in the query.
    pub position: usize,
    pub confidence: f32,
}

/// Detects demonstrative, pronoun, previous, and implicit references.
pub struct ReferenceDetector {
    demonstrative: Vec<Regex>,
    pronoun: Vec<Regex>,
    previous: Vec<Regex>,
    implicit: Vec<Regex>,
}

impl Default for ReferenceDetector {
    fn default() -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){p}")).expect("static pattern"))
                .collect()
        };
        Self {
            demonstrative: compile(&[
                r"\b(that|this|these|those)\s+(\w+)",
                r"\b(esa|ese|esta|este|esas|esos|estas|estos)\s+(\w+)",
            ]),
            pronoun: compile(&[r"\b(it|its|them|their)\b", r"\b(lo|la|los|las|le|les)\b"]),
            previous: compile(&[
                r"\b(?:the\s+)?(previous|last|earlier|prior)\s+(\w+)",
                r"\b(?:el|la|los|las)\s+(anterior|previo|último|última|ultimo|ultima)\s+(\w+)",
            ]),
            implicit: compile(&[r"\bthe\s+(\w+)\b", r"\b(?:el|la)\s+(\w+)\b"]),
        }
    }
}

impl ReferenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// All references in the query, in pattern-class order (demonstrative,
    /// pronoun, previous, implicit).
    pub fn detect(&self, query: &str) -> Vec<Reference> {
        let mut references = Vec::new();

        for re in &self.demonstrative {
            for caps in re.captures_iter(query) {
                let noun = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                if is_entity_keyword(noun) {
                    references.push(make_ref(&caps, ReferenceType::Demonstrative));
                }
            }
        }
        for re in &self.pronoun {
            for caps in re.captures_iter(query) {
                references.push(make_ref(&caps, ReferenceType::Pronoun));
            }
        }
        for re in &self.previous {
            for caps in re.captures_iter(query) {
                let noun = caps
                    .iter()
                    .flatten()
                    .last()
                    .map(|m| m.as_str())
                    .unwrap_or("");
                if is_entity_keyword(noun) {
                    references.push(make_ref(&caps, ReferenceType::Previous));
                }
            }
        }
        for re in &self.implicit {
            for caps in re.captures_iter(query) {
                let noun = caps
                    .iter()
                    .flatten()
                    .last()
                    .map(|m| m.as_str())
                    .unwrap_or("");
                if is_entity_keyword(noun) {
                    references.push(make_ref(&caps, ReferenceType::Implicit));
                }
            }
        }

        tracing::debug!(count = references.len(), "detected references");
        references
    }

    pub fn has_references(&self, query: &str) -> bool {
        !self.detect(query).is_empty()
    }

    /// Head noun of a reference span, normalised to the keyword it matched.
    pub fn extract_entity_type(&self, reference_text: &str) -> Option<&'static str> {
        let lower = reference_text.to_lowercase();
        ENTITY_KEYWORDS
            .iter()
            .find(|kw| lower.contains(*kw))
            .copied()
    }
}

fn is_entity_keyword(noun: &str) -> bool {
    let lower = noun.to_lowercase();
    ENTITY_KEYWORDS.contains(&lower.as_str())
}

fn make_ref(caps: &regex::Captures<'_>, ref_type: ReferenceType) -> Reference {
    let whole = caps.get(0).expect("capture 0 always present");
    Reference {
        text: whole.as_str().to_string(),
        ref_type,
        position: whole.start(),
        confidence: ref_type.confidence(),
    }
}
