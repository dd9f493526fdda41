use chrono::Utc;
use searchcore_core::{Priority, ProjectId, ScoreBreakdown, SearchResult};
use std::collections::HashSet;

/// Configurable per-signal weights for the Context Ranker (§4.7). Defaults
/// mirror the teacher's `RankingConfig` shape — named weight fields plus a
/// `Default` impl — generalized to this spec's seven signals.
#[derive(Debug, Clone)]
pub struct RankingWeights {
    pub vector_similarity: f32,
    pub project_priority: f32,
    pub relationship_boost: f32,
    pub recency: f32,
    pub exact_match: f32,
    pub proximity: f32,
    pub entity_match: f32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            vector_similarity: 1.0,
            project_priority: 0.3,
            relationship_boost: 0.2,
            recency: 0.1,
            exact_match: 0.5,
            proximity: 0.2,
            entity_match: 0.3,
        }
    }
}

/// Per-result context needed to compute the non-vector signals; kept
/// separate from `SearchResult` since most of it is transient scoring input,
/// not part of the persisted result shape.
pub struct RankingContext<'a> {
    pub query_keywords: &'a [String],
    pub query_entities: &'a [String],
    pub target_project_id: &'a ProjectId,
    pub direct_dependency_ids: &'a HashSet<ProjectId>,
    pub relationship_weight: Option<f32>,
    pub anchor_file_path: Option<&'a str>,
    pub min_score: f32,
}

/// Computes `final_score`/`confidence_score`/`score_breakdown` for one
/// result and, if the result fails `min_score`, signals the caller to drop
/// it. The ranker itself is pure: identical inputs always produce identical
/// outputs (§4.7 test contract).
pub fn score_result(
    result: &mut SearchResult,
    priority: Priority,
    weights: &RankingWeights,
    ctx: &RankingContext,
) -> bool {
    let vector_similarity = result.similarity_score;
    let project_priority = priority.weight_multiplier();
    let relationship_boost = relationship_boost(result, ctx);
    let recency = recency_score(result);
    let exact_match = jaccard(ctx.query_keywords, &tokenize(&result.snippet));
    let proximity = proximity_score(result, ctx);
    let entity_match = if entity_hits(result, ctx.query_entities) { 1.0 } else { 0.0 };

    let final_score = vector_similarity * weights.vector_similarity
        + project_priority * weights.project_priority
        + relationship_boost * weights.relationship_boost
        + recency * weights.recency
        + exact_match * weights.exact_match
        + proximity * weights.proximity
        + entity_match * weights.entity_match;

    let max_achievable = weights.vector_similarity.max(0.0)
        + weights.project_priority * Priority::Critical.weight_multiplier()
        + weights.relationship_boost
        + weights.recency
        + weights.exact_match
        + weights.proximity
        + weights.entity_match;

    result.confidence_score = if max_achievable > 0.0 {
        (final_score / max_achievable).clamp(0.0, 1.0)
    } else {
        0.0
    };
    result.score_breakdown = ScoreBreakdown {
        vector_similarity,
        project_priority,
        relationship_boost,
        recency,
        exact_match,
        proximity,
        entity_match,
    };

    final_score >= ctx.min_score
}

fn relationship_boost(result: &SearchResult, ctx: &RankingContext) -> f32 {
    if &result.project_id == ctx.target_project_id {
        1.0
    } else if ctx.direct_dependency_ids.contains(&result.project_id) {
        0.5
    } else {
        ctx.relationship_weight.unwrap_or(0.0)
    }
}

fn recency_score(result: &SearchResult) -> f32 {
    let age_days = (Utc::now() - result.modified_time).num_days() as f32;
    (1.0 - age_days / 30.0).max(0.0)
}

fn proximity_score(result: &SearchResult, ctx: &RankingContext) -> f32 {
    let Some(anchor) = ctx.anchor_file_path else {
        return 0.0;
    };
    if anchor == result.file_path {
        1.0
    } else if same_parent(anchor, &result.file_path) {
        0.8
    } else if same_top_level_module(anchor, &result.file_path) {
        0.6
    } else {
        0.3
    }
}

fn same_parent(a: &str, b: &str) -> bool {
    parent_of(a) == parent_of(b)
}

fn same_top_level_module(a: &str, b: &str) -> bool {
    a.split('/').next() == b.split('/').next()
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn entity_hits(result: &SearchResult, entities: &[String]) -> bool {
    entities.iter().any(|e| result.snippet.contains(e.as_str()))
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_ascii_lowercase()).collect()
}

fn jaccard(query_keywords: &[String], snippet_tokens: &HashSet<String>) -> f32 {
    if query_keywords.is_empty() || snippet_tokens.is_empty() {
        return 0.0;
    }
    let query_set: HashSet<&String> = query_keywords.iter().collect();
    let snippet_set: HashSet<&String> = snippet_tokens.iter().collect();
    let intersection = query_set.intersection(&snippet_set).count();
    let union = query_set.union(&snippet_set).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Tie-break order for equal `final_score`: higher raw similarity, then more
/// recent `modified_time`, then lexicographically smaller `file_path`.
pub fn tie_break(a: &SearchResult, b: &SearchResult) -> std::cmp::Ordering {
    b.similarity_score
        .partial_cmp(&a.similarity_score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| b.modified_time.cmp(&a.modified_time))
        .then_with(|| a.file_path.cmp(&b.file_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use searchcore_core::ProjectId;

    fn sample_result() -> SearchResult {
        SearchResult {
            file_path: "src/main.rs".into(),
            file_name: "main.rs".into(),
            file_type: "rs".into(),
            project_id: ProjectId::new("demo"),
            project_name: "Demo".into(),
            snippet: "fn main() {}".into(),
            line_start: 1,
            line_end: 1,
            similarity_score: 0.8,
            confidence_score: 0.0,
            metadata: serde_json::Map::new(),
            relationship_context: Vec::new(),
            score_breakdown: ScoreBreakdown::default(),
            modified_time: Utc::now(),
        }
    }

    #[test]
    fn same_project_gets_full_relationship_boost() {
        let mut result = sample_result();
        let target = result.project_id.clone();
        let weights = RankingWeights::default();
        let ctx = RankingContext {
            query_keywords: &[],
            query_entities: &[],
            target_project_id: &target,
            direct_dependency_ids: &HashSet::new(),
            relationship_weight: None,
            anchor_file_path: None,
            min_score: 0.0,
        };
        score_result(&mut result, Priority::Normal, &weights, &ctx);
        assert_eq!(result.score_breakdown.relationship_boost, 1.0);
        // final_score = 0.8*1.0 (similarity) + 1.0*0.3 (normal priority) + 1.0*0.2
        // (same-project boost) + 1.0*0.1 (fresh recency) = 1.4, over max_achievable 2.75.
        approx::assert_abs_diff_eq!(result.confidence_score, 1.4 / 2.75, epsilon = 1e-6);
    }

    #[test]
    fn below_min_score_is_rejected() {
        let mut result = sample_result();
        result.similarity_score = 0.0;
        let other_project = ProjectId::new("other");
        let weights = RankingWeights::default();
        let ctx = RankingContext {
            query_keywords: &[],
            query_entities: &[],
            target_project_id: &other_project,
            direct_dependency_ids: &HashSet::new(),
            relationship_weight: None,
            anchor_file_path: None,
            min_score: 10.0,
        };
        assert!(!score_result(&mut result, Priority::Low, &weights, &ctx));
    }

    #[test]
    fn tie_break_prefers_smaller_file_path() {
        let mut a = sample_result();
        let mut b = sample_result();
        a.file_path = "z.rs".into();
        b.file_path = "a.rs".into();
        a.similarity_score = b.similarity_score;
        a.modified_time = b.modified_time;
        assert_eq!(tie_break(&a, &b), std::cmp::Ordering::Greater);
    }

    proptest! {
        /// The ranker is pure: scoring the same signals twice always yields
        /// the same `final_score` decision and `score_breakdown`.
        #[test]
        fn scoring_is_pure(
            similarity in 0.0f32..1.0,
            min_score in 0.0f32..2.0,
            same_project in proptest::bool::ANY,
        ) {
            let weights = RankingWeights::default();
            let target = ProjectId::new("demo");
            let other = ProjectId::new("other");

            let mut a = sample_result();
            a.similarity_score = similarity;
            a.project_id = if same_project { target.clone() } else { other.clone() };
            let mut b = a.clone();

            let ctx = RankingContext {
                query_keywords: &[],
                query_entities: &[],
                target_project_id: &target,
                direct_dependency_ids: &HashSet::new(),
                relationship_weight: None,
                anchor_file_path: None,
                min_score,
            };

            let kept_a = score_result(&mut a, Priority::Normal, &weights, &ctx);
            let kept_b = score_result(&mut b, Priority::Normal, &weights, &ctx);

            prop_assert_eq!(kept_a, kept_b);
            prop_assert_eq!(a.confidence_score, b.confidence_score);
            prop_assert_eq!(a.score_breakdown.relationship_boost, b.score_breakdown.relationship_boost);
        }
    }
}
