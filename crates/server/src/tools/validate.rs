//! `validate_response`: cheap evidence check for a candidate answer.

use std::collections::HashSet;

use serde_json::{json, Value};

use crate::error::{ToolError, ToolResponse, ToolResult};
use crate::state::CoreContext;
use crate::tools::required_str;

/// Word-set Jaccard similarity between a candidate and each resolved
/// evidence chunk; passes iff at least one chunk resolved and the average
/// similarity clears 0.1.
pub fn validate_response(ctx: &CoreContext, args: &Value) -> ToolResult {
    let candidate = required_str(args, "candidate_text")?;
    let evidence_ids: Vec<u32> = args
        .get("evidence_ids")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::invalid("Missing required argument 'evidence_ids'"))?
        .iter()
        .filter_map(Value::as_u64)
        .map(|v| v as u32)
        .collect();

    let candidate_words = word_set(candidate);
    let mut found = 0usize;
    let mut total_similarity = 0f64;
    for id in &evidence_ids {
        let Some(chunk) = ctx.chunk(*id) else {
            continue;
        };
        found += 1;
        total_similarity += jaccard(&candidate_words, &word_set(chunk.text()));
    }

    let avg_similarity = if found > 0 {
        total_similarity / found as f64
    } else {
        0.0
    };
    let validation_passed = found > 0 && avg_similarity > 0.1;

    Ok(ToolResponse::new(
        format!(
            "Validation: {found}/{} evidence chunks found. Average similarity: {avg_similarity:.2}. Status: {}",
            evidence_ids.len(),
            if validation_passed { "PASSED" } else { "FAILED" },
        ),
        json!({
            "evidence_found": found,
            "total_evidence": evidence_ids.len(),
            "avg_similarity": avg_similarity,
            "validation_passed": validation_passed,
        }),
    ))
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_basics() {
        let a = word_set("the login function checks hash");
        let b = word_set("login function checks the password hash");
        let sim = jaccard(&a, &b);
        assert!(sim > 0.5);
        assert_eq!(jaccard(&word_set("a b"), &word_set("c d")), 0.0);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn punctuation_does_not_break_words() {
        let a = word_set("checks the hash.");
        assert!(a.contains("hash"));
    }
}
