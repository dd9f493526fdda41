use chrono::Utc;
use searchcore_core::{Chunk, ProjectId, SymbolExtractor};

/// Minimum overlap between consecutive line-aware windows, per §4.3.
const WINDOW_LINES: usize = 40;
const WINDOW_OVERLAP: usize = 4;

/// Splits `content` into chunks. Prefers symbol boundaries from an external
/// `SymbolExtractor` when one is configured and returns boundaries for this
/// file; otherwise falls back to line-aware windows of ~40 lines with a
/// 4-line overlap.
pub fn chunk_file(
    project_id: &ProjectId,
    file_path: &str,
    language: Option<&str>,
    content: &str,
    symbol_extractor: Option<&dyn SymbolExtractor>,
) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let boundaries = symbol_extractor
        .and_then(|extractor| extractor.boundaries(file_path, content))
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| line_windows(lines.len()));

    let now = Utc::now();
    boundaries
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            let start_idx = (start as usize).saturating_sub(1).min(lines.len());
            let end_idx = (end as usize).min(lines.len());
            let text = lines[start_idx..end_idx].join("\n");
            let content_hash = Chunk::compute_content_hash(&text);
            let id = Chunk::compute_id(project_id, file_path, index, &content_hash);
            Chunk {
                id,
                project_id: project_id.clone(),
                file_path: file_path.to_string(),
                language: language.map(str::to_string),
                chunk_index: index,
                line_start: start,
                line_end: end,
                content: truncate_snippet(&text),
                content_hash,
                embedding: None,
                modified_time: now,
                indexed_time: None,
            }
        })
        .collect()
}

fn truncate_snippet(text: &str) -> String {
    if text.len() <= searchcore_core::MAX_CHUNK_CONTENT_BYTES {
        text.to_string()
    } else {
        text.chars()
            .take(searchcore_core::MAX_CHUNK_CONTENT_BYTES)
            .collect()
    }
}

/// 1-indexed inclusive `(line_start, line_end)` windows covering `total_lines`
/// with `WINDOW_OVERLAP` lines shared between consecutive windows.
fn line_windows(total_lines: usize) -> Vec<(u32, u32)> {
    let mut windows = Vec::new();
    let mut start = 1usize;
    loop {
        let end = (start + WINDOW_LINES - 1).min(total_lines);
        windows.push((start as u32, end as u32));
        if end >= total_lines {
            break;
        }
        start = end.saturating_sub(WINDOW_OVERLAP) + 1;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_short_file_is_one_chunk() {
        let windows = line_windows(10);
        assert_eq!(windows, vec![(1, 10)]);
    }

    #[test]
    fn long_file_overlaps_windows() {
        let windows = line_windows(90);
        assert_eq!(windows[0], (1, 40));
        assert_eq!(windows[1].0, 37);
    }

    #[test]
    fn chunk_ids_are_stable_for_unchanged_content() {
        let p = ProjectId::new("demo");
        let content = "fn a() {}\nfn b() {}\n";
        let c1 = chunk_file(&p, "src/lib.rs", Some("rust"), content, None);
        let c2 = chunk_file(&p, "src/lib.rs", Some("rust"), content, None);
        assert_eq!(c1.len(), c2.len());
        assert_eq!(c1[0].id, c2[0].id);
    }
}
