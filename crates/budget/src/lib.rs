//! # anchora token budget
//!
//! Allocates a fixed token budget across ranked sections of context and
//! truncates overflowing content. Used in two places: trimming session
//! history before reference resolution, and trimming the outgoing response
//! text. Estimation is a cheap characters/4 heuristic — the budget is a
//! guard rail, not an exact tokenizer.

use serde::{Deserialize, Serialize};

/// A candidate piece of context competing for budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub content: String,
    /// Higher relevance is admitted first.
    pub relevance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub access_count: u32,
}

/// Fixed budget with a reserved floor for the engine's own framing text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_tokens: usize,
    pub reserved_tokens: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            reserved_tokens: 500,
        }
    }
}

impl TokenBudget {
    pub fn new(max_tokens: usize, reserved_tokens: usize) -> Self {
        Self {
            max_tokens,
            reserved_tokens,
        }
    }

    /// Tokens actually available for content.
    pub fn available(&self) -> usize {
        self.max_tokens.saturating_sub(self.reserved_tokens)
    }

    /// Heuristic token count: ⌈characters / 4⌉.
    pub fn estimate(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    /// Greedily admit whole sections in descending relevance until the next
    /// one would overflow, then truncate that section to fill the remainder.
    /// The returned sections never exceed [`TokenBudget::available`] in
    /// total estimated tokens.
    pub fn allocate(&self, sections: &[Section]) -> Vec<Section> {
        let available = self.available();
        if available == 0 {
            return Vec::new();
        }

        let mut ordered: Vec<&Section> = sections.iter().collect();
        ordered.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut admitted = Vec::new();
        let mut used = 0usize;
        for section in ordered {
            let cost = Self::estimate(&section.content);
            if used + cost <= available {
                admitted.push(section.clone());
                used += cost;
            } else {
                let remaining = available - used;
                // Anything under a handful of tokens is just an ellipsis;
                // skip rather than admit noise.
                if remaining > 2 {
                    let mut truncated = section.clone();
                    truncated.content = Self::truncate(&section.content, remaining);
                    admitted.push(truncated);
                }
                break;
            }
        }

        tracing::debug!(
            candidates = sections.len(),
            admitted = admitted.len(),
            used_tokens = used,
            available,
            "allocated token budget"
        );
        admitted
    }

    /// Shorten `text` to at most `max_tokens` estimated tokens, keeping an
    /// ellipsis suffix when anything was cut.
    pub fn truncate(text: &str, max_tokens: usize) -> String {
        if Self::estimate(text) <= max_tokens {
            return text.to_string();
        }
        let budget_chars = (max_tokens * 4).saturating_sub(3);
        let kept: String = text.chars().take(budget_chars).collect();
        format!("{kept}...")
    }
}
