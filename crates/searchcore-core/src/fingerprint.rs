use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::ids::Fingerprint;
use crate::query::SearchRequest;

/// Number of (sorted) `recent_files` entries folded into the fingerprint, per
/// §4.8 ("a short prefix of (sorted) recent_files context").
const RECENT_FILES_PREFIX: usize = 8;

/// Normalization pinned for fingerprinting (Open Question 1 in SPEC_FULL.md
/// §9): lowercase, NFC-normalize, collapse internal whitespace runs to a
/// single ASCII space, trim. Applied to the query string only; everything
/// else is normalized structurally (sorted, deduplicated) rather than as
/// text. Changing this invalidates every L3 entry.
pub fn normalize_query_for_fingerprint(query: &str) -> String {
    let nfc: String = query.nfc().collect();
    let lower = nfc.to_lowercase();
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable hash over the request plus the workspace version it was answered
/// against. Distinct normalized inputs collide with probability ~2^-128
/// (SHA-256 truncated to 128 bits of hex, i.e. the first 32 hex chars).
pub fn fingerprint(request: &SearchRequest, workspace_version: &str) -> Fingerprint {
    let mut hasher = Sha256::new();

    hasher.update(normalize_query_for_fingerprint(&request.query).as_bytes());
    hasher.update(b"\0");
    hasher.update(request.scope.to_string().as_bytes());
    hasher.update(b"\0");
    if let Some(pid) = &request.project_id {
        hasher.update(pid.as_str().as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(workspace_version.as_bytes());
    hasher.update(b"\0");

    let mut file_types: Vec<_> = request.filters.file_types.iter().cloned().collect();
    file_types.sort();
    for ft in &file_types {
        hasher.update(ft.as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"\0");

    let mut dirs: Vec<_> = request.filters.directories.iter().cloned().collect();
    dirs.sort();
    for d in &dirs {
        hasher.update(d.as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"\0");

    let mut excludes = request.filters.exclude_patterns.clone();
    excludes.sort();
    for e in &excludes {
        hasher.update(e.as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"\0");

    if let Some(min_score) = request.filters.min_score {
        hasher.update(min_score.to_bits().to_le_bytes());
    }
    hasher.update(b"\0");

    let mut recent = request.recent_files.clone();
    recent.sort();
    recent.truncate(RECENT_FILES_PREFIX);
    for f in &recent {
        hasher.update(f.as_bytes());
        hasher.update(b",");
    }

    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Fingerprint(hex[..32].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Scope;
    use crate::query::SearchFilters;
    use proptest::prelude::*;

    fn req(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            scope: Scope::Workspace,
            project_id: None,
            include_dependencies: false,
            limit: 10,
            filters: SearchFilters::default(),
            similarity_threshold: None,
            recent_files: vec![],
        }
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let a = fingerprint(&req("  Find   Auth   Logic "), "1.0.0");
        let b = fingerprint(&req("find auth logic"), "1.0.0");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_queries_differ() {
        let a = fingerprint(&req("find auth logic"), "1.0.0");
        let b = fingerprint(&req("find payment logic"), "1.0.0");
        assert_ne!(a, b);
    }

    #[test]
    fn workspace_version_participates() {
        let a = fingerprint(&req("find auth logic"), "1.0.0");
        let b = fingerprint(&req("find auth logic"), "1.0.1");
        assert_ne!(a, b);
    }

    #[test]
    fn recent_files_order_independent() {
        let mut r1 = req("find auth logic");
        r1.recent_files = vec!["b.rs".into(), "a.rs".into()];
        let mut r2 = req("find auth logic");
        r2.recent_files = vec!["a.rs".into(), "b.rs".into()];
        assert_eq!(fingerprint(&r1, "1.0.0"), fingerprint(&r2, "1.0.0"));
    }

    proptest! {
        /// Reordering an unordered filter set (exclude_patterns, recent_files)
        /// never changes the fingerprint, for arbitrary inputs.
        #[test]
        fn fingerprint_ignores_vec_ordering(
            mut excludes in proptest::collection::vec("[a-z]{1,6}", 0..6),
            mut recent in proptest::collection::vec("[a-z]{1,6}\\.rs", 0..6),
        ) {
            let mut a = req("find auth logic");
            a.filters.exclude_patterns = excludes.clone();
            a.recent_files = recent.clone();
            let fp_a = fingerprint(&a, "1.0.0");

            // Shuffle deterministically by reversing, which is a distinct
            // permutation whenever there is more than one element.
            excludes.reverse();
            recent.reverse();
            let mut b = req("find auth logic");
            b.filters.exclude_patterns = excludes;
            b.recent_files = recent;
            let fp_b = fingerprint(&b, "1.0.0");

            prop_assert_eq!(fp_a, fp_b);
        }
    }
}
