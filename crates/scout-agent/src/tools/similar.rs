//! Similar-filename suggestions for missed reads

use std::path::{Path, PathBuf};

const NOT_SIMILAR: u32 = 100;
const MAX_SCORE: u32 = 10;

/// Files in the target's directory ranked by name similarity, best first.
/// Used to build a "did you mean" hint when a read misses.
pub(crate) fn suggest_similar_files(target: &Path, max_suggestions: usize) -> Vec<PathBuf> {
    let Some(dir) = target.parent() else {
        return vec![];
    };
    let Some(base) = target.file_name().and_then(|n| n.to_str()) else {
        return vec![];
    };
    let base = base.to_lowercase();

    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };

    let mut scored: Vec<(u32, PathBuf)> = entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            let score = similarity(&base, &name);
            (score < MAX_SCORE).then(|| (score, entry.path()))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, path)| path)
        .collect()
}

/// Similarity score between two lowercased filenames; lower is closer.
fn similarity(a: &str, b: &str) -> u32 {
    if a == b {
        return 0;
    }
    if a.contains(b) || b.contains(a) {
        return 1;
    }

    let a_stem = strip_extension(a);
    let b_stem = strip_extension(b);
    if a_stem == b_stem {
        return 2;
    }
    if a_stem.contains(b_stem) || b_stem.contains(a_stem) {
        return 3;
    }

    let distance = levenshtein(a, b);
    if distance <= 3 {
        return 4 + distance as u32;
    }

    let common_prefix = a
        .bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .count();
    if common_prefix >= 3 {
        return 8;
    }

    NOT_SIMILAR
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) if index > 0 => &name[..index],
        _ => name,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
