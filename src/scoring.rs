//! Scoring functions for automatic metadata matches.
//!
//! This module contains:
//! - Character-level and token-set similarity ratios (0-100)
//! - Artist/title/version scoring of a lookup candidate against a local identity
//! - The confidence gate deciding whether a match is accepted

use rustc_hash::FxHashSet;

use crate::models::{LookupCandidate, NormalizedIdentity, SimilarityResult};
use crate::normalize::fold_to_ascii;

// ============================================================================
// Score Thresholds
// ============================================================================

/// Minimum artist score to accept a match
pub const ARTIST_THRESHOLD: f64 = 90.0;

/// Minimum title score to accept a match
pub const TITLE_THRESHOLD: f64 = 70.0;

/// Minimum version score to accept a match
pub const VERSION_THRESHOLD: f64 = 70.0;

/// Version labels the lookup reports when a release carries no remix
/// designation. A local file without a version suffix matches these.
pub const DEFAULT_VERSION_LABELS: [&str; 2] = ["Original Mix", "Extended Mix"];

// ============================================================================
// Similarity Ratios
// ============================================================================

/// Length of the longest common subsequence of two char sequences.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diag = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    row[b.len()]
}

/// Indel similarity of two strings, 0-100: `100 * (1 - indel / (len_a + len_b))`,
/// where the indel distance counts insertions and deletions only.
/// Two empty strings are identical (100).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    // 1 - indel / total, with indel = total - 2 * lcs
    (200 * lcs_len(&a, &b)) as f64 / total as f64
}

fn join_sorted(tokens: &[&str]) -> String {
    tokens.join(" ")
}

fn join_parts(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

/// Order-insensitive, subset-tolerant similarity on whitespace tokens, 0-100.
///
/// If every token of one side appears in the other, the score is 100.
/// Otherwise the best ratio among (shared, shared+rest_a, shared+rest_b)
/// pairings is returned.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: FxHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: FxHashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut shared: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let mut only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let mut only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();
    shared.sort_unstable();
    only_a.sort_unstable();
    only_b.sort_unstable();

    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let shared = join_sorted(&shared);
    let combined_a = join_parts(&shared, &join_sorted(&only_a));
    let combined_b = join_parts(&shared, &join_sorted(&only_b));

    let mut best = ratio(&combined_a, &combined_b);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &combined_a))
            .max(ratio(&shared, &combined_b));
    }
    best
}

// ============================================================================
// Candidate Scoring
// ============================================================================

/// Score raw candidate fields against a local identity.
///
/// `candidate_artists` is the comma-joined artist list; it and the title are
/// diacritic-folded before comparison. The version is compared as given.
pub fn score_fields(
    candidate_artists: &str,
    candidate_title: &str,
    candidate_version: &str,
    local: &NormalizedIdentity,
) -> SimilarityResult {
    let artist = token_set_ratio(&fold_to_ascii(candidate_artists), &local.artist);
    let title = ratio(&fold_to_ascii(candidate_title), &local.title);

    let mut version = local
        .version
        .as_deref()
        .map(|v| ratio(candidate_version, v))
        .unwrap_or(0.0);

    // A local file without a version suffix is the default release
    if version == 0.0 && DEFAULT_VERSION_LABELS.contains(&candidate_version) {
        version = 100.0;
    }

    SimilarityResult {
        artist,
        title,
        version,
    }
}

/// Score a lookup candidate against a local identity.
pub fn score_candidate(candidate: &LookupCandidate, local: &NormalizedIdentity) -> SimilarityResult {
    score_fields(
        &candidate.artists.join(", "),
        &candidate.title,
        &candidate.version,
        local,
    )
}

// ============================================================================
// Confidence Gate
// ============================================================================

/// Routing decision for an automatic lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    Accepted,
    /// File goes to the mismatch holding area for manual review
    LowConfidence,
}

/// Accept only if artist >= 90, version >= 70 and title >= 70.
pub fn decide(scores: &SimilarityResult) -> MatchDecision {
    if scores.artist >= ARTIST_THRESHOLD
        && scores.version >= VERSION_THRESHOLD
        && scores.title >= TITLE_THRESHOLD
    {
        MatchDecision::Accepted
    } else {
        MatchDecision::LowConfidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_identity;

    fn scores(artist: f64, title: f64, version: f64) -> SimilarityResult {
        SimilarityResult {
            artist,
            title,
            version,
        }
    }

    fn candidate(artists: &[&str], title: &str, version: &str) -> LookupCandidate {
        LookupCandidate {
            artists: artists.iter().map(|a| a.to_string()).collect(),
            title: title.to_string(),
            version: version.to_string(),
            genre: "Techno".to_string(),
            label: "LabelName".to_string(),
        }
    }

    #[test]
    fn test_decide_thresholds() {
        assert_eq!(decide(&scores(95.0, 72.0, 80.0)), MatchDecision::Accepted);
        assert_eq!(decide(&scores(85.0, 72.0, 80.0)), MatchDecision::LowConfidence);
        assert_eq!(decide(&scores(95.0, 69.9, 80.0)), MatchDecision::LowConfidence);
        assert_eq!(decide(&scores(95.0, 72.0, 69.0)), MatchDecision::LowConfidence);
        assert_eq!(decide(&scores(90.0, 70.0, 70.0)), MatchDecision::Accepted);
    }

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(ratio("title", "title"), 100.0);
        assert_eq!(ratio("", ""), 100.0);
        assert_eq!(ratio("abc", ""), 0.0);
        let r = ratio("kitten", "sitting");
        assert!(r > 0.0 && r < 100.0);
    }

    #[test]
    fn test_ratio_counts_insertions_and_deletions() {
        // A swap costs one deletion plus one insertion
        assert_eq!(ratio("title", "titel"), 80.0);
        assert_eq!(ratio("levels", "lvls"), 80.0);
        assert_eq!(ratio("abcd", "abce"), 75.0);
        assert_eq!(ratio("ab", "cd"), 0.0);
        assert_eq!(ratio("title", "titel"), ratio("titel", "title"));
    }

    #[test]
    fn test_swapped_letters_in_title_are_accepted() {
        let local = normalize_identity("Artist - Titel (Extended Mix)").unwrap();
        let result = score_candidate(&candidate(&["Artist"], "Title", "Extended Mix"), &local);
        assert_eq!(result.title, 80.0);
        assert_eq!(decide(&result), MatchDecision::Accepted);
    }

    #[test]
    fn test_token_set_ratio_order_and_subset() {
        assert_eq!(token_set_ratio("b, a", "b, a"), 100.0);
        assert_eq!(token_set_ratio("daft punk", "punk daft"), 100.0);
        // local artist is a subset of the candidate's credits
        assert_eq!(token_set_ratio("artist, other", "artist,"), 100.0);
        assert_eq!(token_set_ratio("artist other", "artist"), 100.0);
        assert_eq!(token_set_ratio("", "artist"), 0.0);
        let partial = token_set_ratio("someone else", "artist");
        assert!(partial < ARTIST_THRESHOLD);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let local = normalize_identity("Zzz - Qqq (Weird Remix)").unwrap();
        let result = score_candidate(&candidate(&["Abc", "Def"], "Xyz", "Other"), &local);
        for s in [result.artist, result.title, result.version] {
            assert!((0.0..=100.0).contains(&s));
        }
    }

    #[test]
    fn test_exact_match_scores_full() {
        let local = normalize_identity("Artist - Title (Extended Mix)").unwrap();
        let result = score_candidate(&candidate(&["Artist"], "Title", "Extended Mix"), &local);
        assert_eq!(result.artist, 100.0);
        assert_eq!(result.title, 100.0);
        assert_eq!(result.version, 100.0);
        assert_eq!(decide(&result), MatchDecision::Accepted);
    }

    #[test]
    fn test_default_version_override() {
        let local = normalize_identity("Artist - Title").unwrap();
        let result = score_candidate(&candidate(&["Artist"], "Title", "Original Mix"), &local);
        assert_eq!(result.version, 100.0);

        // Non-default labels are not rescued
        let result = score_candidate(&candidate(&["Artist"], "Title", "Dub Mix"), &local);
        assert_eq!(result.version, 0.0);
    }

    #[test]
    fn test_override_needs_zero_raw_score() {
        // Local carries a different version: raw score is above zero, no override
        let local = normalize_identity("Artist - Title (Original Dub Mix)").unwrap();
        let result = score_candidate(&candidate(&["Artist"], "Title", "Original Mix"), &local);
        assert!(result.version > 0.0 && result.version < 100.0);
    }

    #[test]
    fn test_candidate_artists_are_folded() {
        let local = normalize_identity("Bjork - Joga").unwrap();
        let result = score_candidate(&candidate(&["Björk"], "Jóga", "Original Mix"), &local);
        assert_eq!(result.artist, 100.0);
        assert_eq!(result.title, 100.0);
    }
}
