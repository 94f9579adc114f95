use chrono::{NaiveDate, TimeZone, Utc};
use sporlsync::sync::IdBuffer;
use sporlsync::types::DatePrecision;
use sporlsync::utils::*;

#[test]
fn test_generate_code_verifier() {
    let verifier = generate_code_verifier();

    // Should be exactly 128 characters
    assert_eq!(verifier.len(), 128);

    // Should contain only alphanumeric characters
    assert!(verifier.chars().all(|c| c.is_ascii_alphanumeric()));

    // Two generated verifiers should be different
    let verifier2 = generate_code_verifier();
    assert_ne!(verifier, verifier2);
}

#[test]
fn test_generate_code_challenge() {
    let verifier = "test_verifier_123";
    let challenge = generate_code_challenge(verifier);

    // Should not be empty
    assert!(!challenge.is_empty());

    // Should be deterministic - same input produces same output
    let challenge2 = generate_code_challenge(verifier);
    assert_eq!(challenge, challenge2);

    // Different input should produce different output
    let challenge3 = generate_code_challenge("different_verifier");
    assert_ne!(challenge, challenge3);

    // Should be URL-safe base64 without padding
    assert!(!challenge.contains('='));
    assert!(!challenge.contains('+'));
    assert!(!challenge.contains('/'));
}

#[test]
fn test_generate_code_challenge_rfc7636_vector() {
    // Appendix B of RFC 7636
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    assert_eq!(
        generate_code_challenge(verifier),
        "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
    );
}

#[test]
fn test_generate_state() {
    let state = generate_state();
    assert_eq!(state.len(), 16);
    assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_ne!(state, generate_state());
}

#[test]
fn test_release_date_threshold() {
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

    assert_eq!(
        release_date_threshold(now, 14),
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    );
    assert_eq!(
        release_date_threshold(now, 0),
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    );

    // Crosses a year boundary
    let new_year = Utc.with_ymd_and_hms(2025, 1, 3, 0, 30, 0).unwrap();
    assert_eq!(
        release_date_threshold(new_year, 14),
        NaiveDate::from_ymd_opt(2024, 12, 20).unwrap()
    );
}

#[test]
fn test_parse_day_release_date() {
    assert_eq!(
        parse_day_release_date("2024-06-10", DatePrecision::Day),
        NaiveDate::from_ymd_opt(2024, 6, 10)
    );

    // Coarser precisions are never considered
    assert_eq!(parse_day_release_date("2024-06", DatePrecision::Month), None);
    assert_eq!(parse_day_release_date("2024", DatePrecision::Year), None);

    // Malformed dates
    assert_eq!(parse_day_release_date("2024-13-01", DatePrecision::Day), None);
    assert_eq!(parse_day_release_date("", DatePrecision::Day), None);
    assert_eq!(parse_day_release_date("0000-00-00", DatePrecision::Day), None);
}

#[test]
fn test_parse_release_date_pads_coarse_precision() {
    assert_eq!(
        parse_release_date("2024", DatePrecision::Year),
        NaiveDate::from_ymd_opt(2024, 1, 1)
    );
    assert_eq!(
        parse_release_date("2024-06", DatePrecision::Month),
        NaiveDate::from_ymd_opt(2024, 6, 1)
    );
    assert_eq!(
        parse_release_date("2024-06-10", DatePrecision::Day),
        NaiveDate::from_ymd_opt(2024, 6, 10)
    );
    assert_eq!(parse_release_date("soon", DatePrecision::Year), None);
}

#[test]
fn test_dedup_preserving_order() {
    let ids = vec!["b", "a", "b", "c", "a"];
    assert_eq!(dedup_preserving_order(&ids), vec!["b", "a", "c"]);

    let empty: Vec<i64> = Vec::new();
    assert!(dedup_preserving_order(&empty).is_empty());
}

#[test]
fn test_id_buffer_reports_full_at_limit() {
    let mut buffer = IdBuffer::new(3);
    assert!(buffer.is_empty());

    assert!(!buffer.push("a"));
    assert!(!buffer.push("b"));
    // Duplicates are not counted
    assert!(!buffer.push("a"));
    assert_eq!(buffer.len(), 2);
    assert!(buffer.push("c"));
    assert!(buffer.is_full());

    assert_eq!(buffer.take(), vec!["a", "b", "c"]);
    assert!(buffer.is_empty());

    // A flushed id may be collected again
    assert!(!buffer.push("a"));
    assert_eq!(buffer.len(), 1);
}
