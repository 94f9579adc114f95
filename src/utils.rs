use std::{collections::HashSet, hash::Hash};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::types::DatePrecision;

/// Generates a cryptographically random PKCE code verifier.
///
/// The verifier is 128 alphanumeric characters, the maximum length allowed
/// by RFC 7636.
pub fn generate_code_verifier() -> String {
    random_alphanumeric(128)
}

/// Derives the S256 code challenge for `verifier`: the URL-safe base64
/// (no padding) encoding of its SHA-256 digest.
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Opaque value echoed back by the authorization callback.
pub fn generate_state() -> String {
    random_alphanumeric(16)
}

fn random_alphanumeric(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Oldest release date that is no longer considered new. A release must be
/// dated strictly after this day.
pub fn release_date_threshold(now: DateTime<Utc>, release_age_days: i64) -> NaiveDate {
    (now - Duration::days(release_age_days)).date_naive()
}

/// Parses a release date that is known to the day.
///
/// Returns `None` for year or month precision and for malformed dates.
pub fn parse_day_release_date(release_date: &str, precision: DatePrecision) -> Option<NaiveDate> {
    if precision != DatePrecision::Day {
        return None;
    }
    NaiveDate::parse_from_str(release_date, "%Y-%m-%d").ok()
}

/// Removes repeated values, keeping the first occurrence of each.
pub fn dedup_preserving_order<T: Eq + Hash + Clone>(values: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert((*v).clone()))
        .cloned()
        .collect()
}

/// Parses a release date of any precision, anchoring year and month
/// precision dates to the first day of the period.
pub fn parse_release_date(release_date: &str, precision: DatePrecision) -> Option<NaiveDate> {
    let padded = match precision {
        DatePrecision::Year => format!("{release_date}-01-01"),
        DatePrecision::Month => format!("{release_date}-01"),
        DatePrecision::Day => release_date.to_string(),
    };
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d").ok()
}
