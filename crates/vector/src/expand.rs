//! Rule-based query expansion for multi-vector retrieval.
//!
//! Each variant is embedded and searched independently, then the ranked
//! lists are fused. The variants are deterministic so retrieval stays
//! reproducible run to run.

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "how", "in", "is", "it", "of", "on",
    "or", "the", "to", "what", "when", "where", "which", "who", "why", "with",
    // Spanish
    "cómo", "como", "cuál", "de", "del", "el", "en", "es", "la", "las", "los", "para", "por",
    "qué", "que", "un", "una", "y",
];

/// Produce up to `max_expansions` query variants, the original first.
///
/// Variants beyond the original: a lowercased/punctuation-stripped form, a
/// keyword form with stopwords removed, and an identifier form keeping only
/// code-shaped tokens (`snake_case`, `CamelCase`, dotted or `::` paths).
/// Duplicates and empty variants are dropped.
pub fn expand_query(query: &str, max_expansions: usize) -> Vec<String> {
    let mut variants: Vec<String> = vec![query.to_string()];

    let normalized: String = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == ' ' { c } else { ' ' })
        .collect();
    let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    push_variant(&mut variants, normalized.clone());

    let keywords: String = normalized
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ");
    push_variant(&mut variants, keywords);

    let identifiers: String = query
        .split_whitespace()
        .filter(|w| looks_like_identifier(w))
        .collect::<Vec<_>>()
        .join(" ");
    push_variant(&mut variants, identifiers);

    variants.truncate(max_expansions.max(1));
    variants
}

fn push_variant(variants: &mut Vec<String>, candidate: String) {
    if !candidate.is_empty() && !variants.iter().any(|v| v == &candidate) {
        variants.push(candidate);
    }
}

fn looks_like_identifier(word: &str) -> bool {
    let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != ':' && c != '.');
    if word.len() < 3 {
        return false;
    }
    let snake = word.contains('_');
    let pathy = word.contains("::") || word.contains('.');
    let camel = word.chars().next().is_some_and(|c| c.is_lowercase())
        && word.chars().any(|c| c.is_uppercase());
    snake || pathy || camel
}
