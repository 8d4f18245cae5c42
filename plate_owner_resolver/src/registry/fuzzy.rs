//! Approximate plate matching.
//!
//! Scores follow the usual `fuzz.ratio` convention: an insert/delete edit
//! distance normalized by the combined length, scaled to 0-100 and rounded
//! half to even.

use super::{MatchResult, RegistryEntry};
use crate::plate_text::{normalize, NormalizedPlate};

pub const MAX_SCORE: u8 = 100;

/// Similarity of two strings in `[0, 100]`.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let len_sum = a.len() + b.len();
    if len_sum == 0 {
        return MAX_SCORE;
    }

    let distance = len_sum - 2 * longest_common_subsequence(&a, &b);
    let similarity = 1.0 - distance as f64 / len_sum as f64;
    (similarity * 100.0).round_ties_even() as u8
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Best scoring registry entry for an already normalized plate.
#[derive(Debug, Clone, Copy)]
pub struct BestMatch<'a> {
    pub entry: &'a RegistryEntry,
    pub score: u8,
}

/// Scans every entry once. Ties go to the first entry that reached the
/// score; an entry scoring 0 is never selected.
pub fn best_match<'a>(plate: &str, entries: &'a [RegistryEntry]) -> Option<BestMatch<'a>> {
    let mut best: Option<BestMatch<'a>> = None;
    let mut best_score = 0u8;
    for entry in entries {
        let registered = normalize(&entry.plate);
        let score = ratio(plate, registered.as_str());
        if score > best_score {
            best_score = score;
            best = Some(BestMatch { entry, score });
        }
    }
    best
}

/// Resolves a plate against a registry snapshot.
///
/// Placeholders skip matching. Below `threshold` the recognized plate is
/// returned unchanged without an owner.
pub fn resolve(plate: &NormalizedPlate, entries: &[RegistryEntry], threshold: u8) -> MatchResult {
    if plate.is_placeholder() {
        return MatchResult::no_match(plate.as_str());
    }

    match best_match(plate.as_str(), entries) {
        Some(best) if best.score >= threshold => {
            tracing::info!(
                plate = %plate,
                matched = %best.entry.plate,
                score = best.score,
                "fuzzy match"
            );
            MatchResult {
                matched_plate: best.entry.plate.clone(),
                owner: Some(best.entry.owner_display()),
            }
        }
        best => {
            tracing::info!(
                plate = %plate,
                best_score = best.map(|b| b.score).unwrap_or(0),
                "no registry match"
            );
            MatchResult::no_match(plate.as_str())
        }
    }
}
