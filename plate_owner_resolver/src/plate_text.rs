//! Canonical plate strings.
//!
//! Both recognized text and registry plates go through [`normalize`] before
//! they are compared. Display transliteration of owner names lives in the
//! renderer and must never be applied here.

use serde::Serialize;
use std::fmt;

pub const UNKNOWN: &str = "Unknown";
pub const ERROR: &str = "Error";

const SEPARATORS: [char; 3] = ['.', '-', ' '];
const MIN_PLATE_CHARS: usize = 3;

/// A plate string in comparable form, or one of the `Unknown` / `Error`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedPlate(String);

impl NormalizedPlate {
    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    pub fn error() -> Self {
        Self(ERROR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `Unknown` and `Error`, which never take part in matching.
    pub fn is_placeholder(&self) -> bool {
        is_placeholder(&self.0)
    }
}

impl fmt::Display for NormalizedPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_placeholder(text: &str) -> bool {
    text == UNKNOWN || text == ERROR
}

/// Strips `.`, `-` and spaces, uppercases the rest and rejects anything
/// shorter than three characters.
///
/// The placeholders are returned unchanged so that normalizing twice gives
/// the same result as normalizing once.
pub fn normalize(raw: &str) -> NormalizedPlate {
    if raw.is_empty() {
        return NormalizedPlate::unknown();
    }
    if is_placeholder(raw) {
        return NormalizedPlate(raw.to_string());
    }

    let cleaned: String = raw
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .flat_map(char::to_uppercase)
        .collect();

    if cleaned.chars().count() < MIN_PLATE_CHARS {
        return NormalizedPlate::unknown();
    }
    NormalizedPlate(cleaned)
}

pub fn normalize_opt(raw: Option<&str>) -> NormalizedPlate {
    raw.map(normalize).unwrap_or_else(NormalizedPlate::unknown)
}

/// Joins the fragments returned by a recognition engine the way they are fed
/// to [`normalize`].
pub fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> String {
    let joined: String = fragments.iter().map(|f| f.as_ref()).collect();
    joined.trim().to_string()
}
