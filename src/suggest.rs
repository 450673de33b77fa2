//! "Did you mean" lookup for unknown command names.

use crate::command_handlers::METACOMMAND_MARKER;

/// Damerau-Levenshtein distance (optimal string alignment), so a swapped pair of adjacent
/// characters costs one edit.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut d = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        d[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            d[i][j] = (d[i - 1][j] + 1)
                .min(d[i][j - 1] + 1)
                .min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                d[i][j] = d[i][j].min(d[i - 2][j - 2] + 1);
            }
        }
    }
    d[a.len()][b.len()]
}

fn threshold(candidate: &str) -> usize {
    (candidate.chars().count() / 3).clamp(1, 3)
}

/// Closest known name within the edit-distance threshold. The metacommand marker is ignored
/// on both sides; ties go to the lexicographically smaller name.
pub fn suggest<'a, I>(requested: &str, known: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = requested.trim_start_matches(METACOMMAND_MARKER);
    known
        .into_iter()
        .filter_map(|name| {
            let bare = name.trim_start_matches(METACOMMAND_MARKER);
            let dist = edit_distance(wanted, bare);
            (dist <= threshold(bare)).then_some((dist, name))
        })
        .min()
        .map(|(_, name)| name)
}
