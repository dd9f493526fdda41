use std::collections::HashSet;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use searchcore_core::{Priority, ProjectId, ScoreBreakdown, SearchResult};
use searchcore_vector::{score_result, tie_break, RankingContext, RankingWeights};

fn synthetic_result(i: usize, project_id: &ProjectId) -> SearchResult {
    SearchResult {
        file_path: format!("src/module_{i}.rs"),
        file_name: format!("module_{i}.rs"),
        file_type: "rs".to_string(),
        project_id: project_id.clone(),
        project_name: "bench".to_string(),
        snippet: format!("fn handler_{i}() {{ authenticate(); }}"),
        line_start: 1,
        line_end: 20,
        similarity_score: (i % 100) as f32 / 100.0,
        confidence_score: 0.0,
        metadata: serde_json::Map::new(),
        relationship_context: Vec::new(),
        score_breakdown: ScoreBreakdown::default(),
        modified_time: Utc::now(),
    }
}

fn bench_score_result(c: &mut Criterion) {
    let weights = RankingWeights::default();
    let target = ProjectId::new("bench_project");
    let keywords = vec!["authenticate".to_string()];
    let ctx = RankingContext {
        query_keywords: &keywords,
        query_entities: &[],
        target_project_id: &target,
        direct_dependency_ids: &HashSet::new(),
        relationship_weight: Some(0.4),
        anchor_file_path: Some("src/module_0.rs"),
        min_score: 0.0,
    };

    c.bench_function("score_result/single", |b| {
        let mut result = synthetic_result(0, &target);
        b.iter(|| {
            black_box(score_result(&mut result, Priority::Normal, &weights, &ctx));
        });
    });
}

fn bench_score_result_set(c: &mut Criterion) {
    let weights = RankingWeights::default();
    let target = ProjectId::new("bench_project");
    let keywords = vec!["authenticate".to_string()];
    let ctx = RankingContext {
        query_keywords: &keywords,
        query_entities: &[],
        target_project_id: &target,
        direct_dependency_ids: &HashSet::new(),
        relationship_weight: Some(0.4),
        anchor_file_path: Some("src/module_0.rs"),
        min_score: 0.0,
    };

    let mut group = c.benchmark_group("score_result_set");
    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("score_then_sort", size), size, |b, &size| {
            b.iter(|| {
                let mut results: Vec<SearchResult> =
                    (0..size).map(|i| synthetic_result(i, &target)).collect();
                for result in &mut results {
                    score_result(result, Priority::Normal, &weights, &ctx);
                }
                results.sort_by(tie_break);
                black_box(&results);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_score_result, bench_score_result_set);
criterion_main!(benches);
