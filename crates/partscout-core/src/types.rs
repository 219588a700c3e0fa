//! Shared types used across the Partscout workspace.
//!
//! This module defines common newtypes that provide type safety
//! and clear domain modeling.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for scrape session identifiers.
///
/// A session ID is a composite of the license plate, the part query and the
/// creation timestamp, which makes it unique per concurrent request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Compose a session ID from its identity parts.
    #[must_use]
    pub fn compose(plate: &LicensePlate, part_query: &str, created_at: &Timestamp) -> Self {
        Self(format!(
            "{}_{}_{}",
            plate.compact(),
            part_query.trim().to_lowercase().replace(' ', "-"),
            created_at.timestamp_millis()
        ))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for Dutch license plates with normalization.
///
/// Input is uppercased and stripped of dashes and whitespace; the canonical
/// dashed `XX-XX-XX` rendering is produced for six-character plates, matching
/// the format the marketplace's plate form expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Create a plate from raw user input.
    ///
    /// # Errors
    /// Returns error if the input is empty or contains characters other than
    /// ASCII letters, digits, dashes and spaces.
    pub fn new(input: impl AsRef<str>) -> Result<Self, CoreError> {
        static PLATE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = PLATE_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9]{4,8}$").expect("valid regex"));

        let compact: String = input
            .as_ref()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_uppercase();

        if !regex.is_match(&compact) {
            return Err(CoreError::Validation(format!(
                "invalid license plate: expected 4-8 alphanumeric characters, got '{}'",
                input.as_ref()
            )));
        }

        Ok(Self(compact))
    }

    /// The plate without separators, e.g. `27XHVX`.
    #[must_use]
    pub fn compact(&self) -> &str {
        &self.0
    }

    /// The dashed form the plate form expects, e.g. `27-XH-VX`.
    ///
    /// Plates that are not six characters long are returned as-is.
    #[must_use]
    pub fn dashed(&self) -> String {
        if self.0.len() == 6 {
            format!("{}-{}-{}", &self.0[..2], &self.0[2..4], &self.0[4..])
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dashed())
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
///
/// Provides serialization/deserialization and utility methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, CoreError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| CoreError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get seconds since Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }

    /// Get milliseconds since Unix epoch.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_normalization() {
        let plate = LicensePlate::new("27-xh-vx").expect("valid plate");
        assert_eq!(plate.compact(), "27XHVX");
        assert_eq!(plate.dashed(), "27-XH-VX");
    }

    #[test]
    fn test_plate_without_dashes() {
        let plate = LicensePlate::new("27XHVX").expect("valid plate");
        assert_eq!(plate.dashed(), "27-XH-VX");
    }

    #[test]
    fn test_plate_non_six_chars_kept_as_is() {
        let plate = LicensePlate::new("G001BB7").expect("valid plate");
        assert_eq!(plate.dashed(), "G001BB7");
    }

    #[test]
    fn test_plate_invalid() {
        let invalid = vec!["", "ab", "27_XH_VX", "27-XH-VX-27-XH"];
        for input in invalid {
            assert!(LicensePlate::new(input).is_err(), "should fail for: {input}");
        }
    }

    #[test]
    fn test_session_id_compose() {
        let plate = LicensePlate::new("27-XH-VX").expect("valid plate");
        let ts = Timestamp::now();
        let id = SessionId::compose(&plate, "Accubak", &ts);
        assert!(id.as_str().starts_with("27XHVX_accubak_"));
    }

    #[test]
    fn test_session_id_unique_per_timestamp() {
        let plate = LicensePlate::new("27-XH-VX").expect("valid plate");
        let ts1 = Timestamp::from_rfc3339("2026-01-01T10:00:00Z").expect("valid timestamp");
        let ts2 = Timestamp::from_rfc3339("2026-01-01T10:00:01Z").expect("valid timestamp");
        assert_ne!(
            SessionId::compose(&plate, "Accubak", &ts1),
            SessionId::compose(&plate, "Accubak", &ts2)
        );
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::now();
        let s = ts.to_rfc3339();
        let parsed = Timestamp::from_rfc3339(&s).expect("parse RFC3339 timestamp");
        assert_eq!(ts.timestamp(), parsed.timestamp());
    }

    #[test]
    fn test_timestamp_json_roundtrip() {
        let ts = Timestamp::from_rfc3339("2026-01-01T10:00:00Z").expect("valid timestamp");
        let json = serde_json::to_string(&ts).expect("serialize timestamp");
        let parsed: Timestamp = serde_json::from_str(&json).expect("deserialize timestamp");
        assert_eq!(ts, parsed);
    }

    #[test]
    fn test_timestamp_ordering() {
        let ts1 = Timestamp::from_rfc3339("2026-01-01T10:00:00Z").expect("valid timestamp");
        let ts2 = Timestamp::from_rfc3339("2026-01-01T11:00:00Z").expect("valid timestamp");
        assert!(ts2 > ts1);
    }
}
