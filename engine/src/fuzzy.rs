//! Fuzzy scoring for slash-command completion and auto-correction.
//!
//! Two strategies compose: an in-order subsequence match that rewards
//! consecutive runs and word starts, and a restricted Damerau-Levenshtein
//! edit distance that catches typos the subsequence match cannot (swapped or
//! missing letters). A candidate's score is the better of the two. Lengths
//! are counted in chars, not bytes.

use std::cmp::Ordering;

const EXACT_BONUS: i32 = 20;

/// Scores `pattern` against `candidate`. `None` means no match.
#[must_use]
pub fn fuzzy_match(pattern: &str, candidate: &str) -> Option<i32> {
    let subsequence = subsequence_score(pattern, candidate);
    let edit = edit_score(pattern, candidate);
    match (subsequence, edit) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Ranks `candidates` by score, best first; ties break alphabetically.
#[must_use]
pub fn rank<'a, I>(pattern: &str, candidates: I) -> Vec<(&'a str, i32)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(&str, i32)> = candidates
        .into_iter()
        .filter_map(|candidate| fuzzy_match(pattern, candidate).map(|score| (candidate, score)))
        .collect();
    scored.sort_by(|a, b| match b.1.cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });
    scored
}

/// The best candidate, if its score is positive.
#[must_use]
pub fn best<'a, I>(pattern: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    rank(pattern, candidates)
        .into_iter()
        .next()
        .filter(|(_, score)| *score > 0)
        .map(|(name, _)| name)
}

fn len_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn is_exact(pattern: &[char], candidate: &[char]) -> bool {
    pattern.len() == candidate.len()
        && pattern
            .iter()
            .zip(candidate)
            .all(|(p, c)| p.to_lowercase().eq(c.to_lowercase()))
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn subsequence_score(pattern: &str, candidate: &str) -> Option<i32> {
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    if p.is_empty() || p.len() > c.len() {
        return None;
    }

    let mut score = 0i32;
    let mut next = 0usize;
    let mut previous: Option<usize> = None;
    for &pc in &p {
        let offset = c[next..].iter().position(|&cc| chars_eq_ignore_case(pc, cc))?;
        let at = next + offset;
        score += 1;
        if previous.is_some_and(|prev| prev + 1 == at) {
            score += 4;
        }
        if at == 0 {
            score += 8;
        } else if is_word_boundary(c[at - 1], c[at]) {
            score += 4;
        }
        previous = Some(at);
        next = at + 1;
    }

    score -= len_i32(c.len() - p.len());
    if is_exact(&p, &c) {
        score += EXACT_BONUS;
    }
    Some(score)
}

fn is_word_boundary(previous: char, current: char) -> bool {
    previous == '_' || previous == '-' || (previous.is_lowercase() && current.is_uppercase())
}

fn edit_score(pattern: &str, candidate: &str) -> Option<i32> {
    let p: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let c: Vec<char> = candidate.chars().flat_map(char::to_lowercase).collect();
    if p.is_empty() || c.is_empty() {
        return None;
    }

    let longest = p.len().max(c.len());
    let threshold = longest.div_ceil(3).clamp(1, 3);
    let distance = restricted_damerau_levenshtein(&p, &c);
    if distance > threshold {
        return None;
    }

    let mut score = 2 * len_i32(longest) - 5 * len_i32(distance);
    if p[0] == c[0] {
        score += 6;
    }
    if c.len() > p.len() {
        score -= len_i32(c.len() - p.len());
    }
    if distance == 0 && p.len() == c.len() {
        score += EXACT_BONUS;
    }
    Some(score)
}

/// Optimal string alignment distance: insertion, deletion, substitution, and
/// transposition of adjacent characters, each substring edited at most once.
fn restricted_damerau_levenshtein(a: &[char], b: &[char]) -> usize {
    let rows = a.len() + 1;
    let cols = b.len() + 1;
    let mut d = vec![0usize; rows * cols];
    let at = |i: usize, j: usize| i * cols + j;

    for i in 0..rows {
        d[at(i, 0)] = i;
    }
    for j in 0..cols {
        d[at(0, j)] = j;
    }
    for i in 1..rows {
        for j in 1..cols {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (d[at(i - 1, j)] + 1)
                .min(d[at(i, j - 1)] + 1)
                .min(d[at(i - 1, j - 1)] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(d[at(i - 2, j - 2)] + 1);
            }
            d[at(i, j)] = best;
        }
    }
    d[at(a.len(), b.len())]
}

#[cfg(test)]
mod tests {
    use super::{best, fuzzy_match, rank, restricted_damerau_levenshtein};

    fn distance(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        restricted_damerau_levenshtein(&a, &b)
    }

    #[test]
    fn distance_counts_transposition_once() {
        assert_eq!(distance("settigns", "settings"), 1);
        assert_eq!(distance("abc", "abc"), 0);
        assert_eq!(distance("abc", "abd"), 1);
        assert_eq!(distance("", "abc"), 3);
    }

    #[test]
    fn exact_beats_every_superstring() {
        for (pattern, superstring) in [
            ("help", "helper"),
            ("mode", "model"),
            ("clear", "unclear"),
            ("re", "resume"),
            ("co", "compact"),
        ] {
            let exact = fuzzy_match(pattern, pattern).unwrap();
            let other = fuzzy_match(pattern, superstring).unwrap_or(i32::MIN);
            assert!(exact > other, "{pattern} vs {superstring}: {exact} <= {other}");
        }
    }

    #[test]
    fn subsequence_is_case_insensitive() {
        assert_eq!(fuzzy_match("CFG", "config"), fuzzy_match("cfg", "config"));
        assert!(fuzzy_match("CoN", "config").is_some());
    }

    #[test]
    fn transposed_letters_correct_to_settings() {
        let names = ["settings", "status", "resume", "help", "session"];
        assert_eq!(best("settigns", names), Some("settings"));
    }

    #[test]
    fn missing_letter_corrects() {
        let names = ["compact", "config", "context", "cost"];
        assert_eq!(best("compat", names), Some("compact"));
    }

    #[test]
    fn unrelated_input_has_no_best() {
        let names = ["help", "model", "clear"];
        assert_eq!(best("zzzzzzzz", names), None);
    }

    #[test]
    fn rank_breaks_ties_alphabetically() {
        let ranked = rank("x", ["xb", "xa"]);
        assert_eq!(ranked[0].0, "xa");
        assert_eq!(ranked[1].0, "xb");
    }

    #[test]
    fn multibyte_lengths_use_chars() {
        let score = fuzzy_match("é", "é").unwrap();
        let longer = fuzzy_match("é", "éa").unwrap();
        assert_eq!(score - longer, 20 + 1);
    }
}
