use std::collections::HashMap;

use regex::Regex;
use searchcore_core::{Entity, Intent, ParsedQuery};

/// One weighted regex rule contributing to an intent's score.
struct IntentRule {
    intent: Intent,
    pattern: Regex,
    weight: f32,
}

fn rule(intent: Intent, pattern: &str, weight: f32) -> IntentRule {
    IntentRule {
        intent,
        pattern: Regex::new(pattern).expect("static intent pattern"),
        weight,
    }
}

fn intent_rules() -> Vec<IntentRule> {
    vec![
        rule(Intent::Debug, r"\b(bug|error|crash|fail(ing|ed)?|exception|traceback)\b", 1.0),
        rule(Intent::Debug, r"\bwhy (is|does|did)\b", 0.6),
        rule(Intent::Refactor, r"\b(refactor|clean ?up|simplify|restructure)\b", 1.0),
        rule(Intent::Optimize, r"\b(optimi[sz]e|speed ?up|performance|faster|slow)\b", 1.0),
        rule(Intent::Implement, r"\b(implement|add|create|build|write)\b", 0.9),
        rule(Intent::Document, r"\b(document|docstring|comment|explain in docs)\b", 0.8),
        rule(Intent::Understand, r"\b(understand|how does|what does|explain how)\b", 0.8),
        rule(Intent::Search, r"\b(find|search|locate|where is)\b", 1.0),
        rule(Intent::Explain, r"\b(explain|what is|describe)\b", 0.7),
    ]
}

fn file_path_pattern() -> Regex {
    Regex::new(r"[\w./-]+\.[A-Za-z0-9]{1,8}").expect("static file path pattern")
}

fn identifier_pattern() -> Regex {
    Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]{2,}(?:::[A-Za-z_][A-Za-z0-9_]*)*\b").expect("static identifier pattern")
}

fn error_message_pattern() -> Regex {
    Regex::new("\"([^\"]{4,200})\"|'([^']{4,200})'").expect("static error message pattern")
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "in", "on", "at", "to", "of", "for", "and", "or",
    "does", "do", "this", "that", "it", "how", "what", "why",
];

/// Static domain dictionary for query expansion, grounded on the teacher's
/// `rag::query_processor` synonym-table approach.
fn expansion_table() -> HashMap<&'static str, &'static [&'static str]> {
    let mut map: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    map.insert("auth", &["authentication", "authorization", "login"]);
    map.insert("db", &["database", "storage", "persistence"]);
    map.insert("api", &["endpoint", "route", "handler"]);
    map.insert("fn", &["function", "method"]);
    map.insert("err", &["error", "exception", "failure"]);
    map.insert("config", &["configuration", "settings"]);
    map
}

fn base_budget(intent: Intent) -> usize {
    match intent {
        Intent::Debug | Intent::Search => 8,
        Intent::Understand | Intent::Explain => 6,
        Intent::Refactor | Intent::Optimize | Intent::Implement => 10,
        Intent::Document => 5,
    }
}

const MAX_BUDGET: usize = 40;

/// Classifies intent, extracts entities, expands terms, and estimates a
/// budget, deterministically for a given input and workspace snapshot
/// (§4.5). `known_files` and `known_identifiers` come from the caller's
/// symbol/file index; an empty set degrades gracefully (entities are simply
/// marked unresolved rather than dropped).
pub fn analyze(
    query: &str,
    known_files: &std::collections::HashSet<String>,
    known_identifiers: &std::collections::HashSet<String>,
) -> ParsedQuery {
    let normalized = normalize(query);
    let (intent, confidence) = classify_intent(&normalized);
    let entities = extract_entities(query, known_files, known_identifiers);
    let keywords = tokenize(&normalized);
    let expanded_terms = expand(&keywords);
    let estimated_budget = (base_budget(intent) + entities.len()).min(MAX_BUDGET);

    ParsedQuery {
        original: query.to_string(),
        intent,
        entities,
        expanded_terms,
        keywords,
        confidence,
        estimated_budget,
    }
}

fn normalize(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w) && w.len() > 1)
        .map(str::to_string)
        .collect()
}

fn expand(keywords: &[String]) -> Vec<String> {
    let table = expansion_table();
    let mut expanded = Vec::new();
    for keyword in keywords {
        if let Some(synonyms) = table.get(keyword.as_str()) {
            expanded.extend(synonyms.iter().map(|s| s.to_string()));
        }
    }
    expanded
}

/// Highest-scoring intent wins; ties break by `Intent::ALL_IN_TIEBREAK_ORDER`.
/// No rule firing defaults to `explain` at confidence 0.5.
fn classify_intent(normalized: &str) -> (Intent, f32) {
    let mut scores: HashMap<Intent, f32> = HashMap::new();
    for rule in intent_rules() {
        if rule.pattern.is_match(normalized) {
            *scores.entry(rule.intent).or_insert(0.0) += rule.weight;
        }
    }
    if scores.is_empty() {
        return (Intent::Explain, 0.5);
    }
    let max_score = scores.values().cloned().fold(f32::MIN, f32::max);
    let winner = Intent::ALL_IN_TIEBREAK_ORDER
        .iter()
        .find(|intent| scores.get(intent).copied().unwrap_or(0.0) == max_score)
        .copied()
        .unwrap_or(Intent::Explain);
    let confidence = (max_score / 2.0).min(1.0).max(0.5);
    (winner, confidence)
}

fn extract_entities(
    raw: &str,
    known_files: &std::collections::HashSet<String>,
    known_identifiers: &std::collections::HashSet<String>,
) -> Vec<Entity> {
    let mut entities = Vec::new();

    for m in file_path_pattern().find_iter(raw) {
        let value = m.as_str().to_string();
        let exists = known_files.contains(&value);
        entities.push(Entity::FilePath { value, exists });
    }

    for m in error_message_pattern().captures_iter(raw) {
        if let Some(g) = m.get(1).or_else(|| m.get(2)) {
            entities.push(Entity::ErrorMessage { value: g.as_str().to_string() });
        }
    }

    for m in identifier_pattern().find_iter(raw) {
        let value = m.as_str().to_string();
        if STOPWORDS.contains(&value.to_lowercase().as_str()) {
            continue;
        }
        if entities.iter().any(|e| matches!(e, Entity::FilePath { value: v, .. } if v.contains(&value))) {
            continue;
        }
        let known = known_identifiers.contains(&value);
        entities.push(Entity::Identifier { value, known });
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn classifies_debug_intent() {
        let parsed = analyze("why does this function crash", &HashSet::new(), &HashSet::new());
        assert_eq!(parsed.intent, Intent::Debug);
    }

    #[test]
    fn defaults_to_explain_when_no_rule_fires() {
        let parsed = analyze("zzz qqq", &HashSet::new(), &HashSet::new());
        assert_eq!(parsed.intent, Intent::Explain);
        assert_eq!(parsed.confidence, 0.5);
    }

    #[test]
    fn extracts_file_path_entity() {
        let parsed = analyze("look at src/main.rs for the bug", &HashSet::new(), &HashSet::new());
        assert!(parsed.entities.iter().any(|e| matches!(e, Entity::FilePath { value, .. } if value == "src/main.rs")));
    }

    #[test]
    fn deterministic_for_same_input() {
        let a = analyze("refactor the auth module", &HashSet::new(), &HashSet::new());
        let b = analyze("refactor the auth module", &HashSet::new(), &HashSet::new());
        assert_eq!(a, b);
    }
}
