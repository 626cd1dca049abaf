//! Case identifiers
//!
//! A case id has the fixed shape `CASE-YYYYMMDD-HHMMSS`, taken from the
//! wall-clock time of the creating event. It is the partition key for replay.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every case id
pub const CASE_ID_PREFIX: &str = "CASE-";

const CASE_ID_TIME_FORMAT: &str = "%Y%m%d-%H%M%S";
const CASE_ID_LEN: usize = 20;

/// Raised when a string is not a well-formed case id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid case id '{0}': expected CASE-YYYYMMDD-HHMMSS")]
pub struct InvalidCaseId(pub String);

/// Identifier of a case, e.g. `CASE-20250114-093012`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseId(String);

impl CaseId {
    /// Parse and validate a case id
    pub fn parse(raw: &str) -> Result<Self, InvalidCaseId> {
        let invalid = || InvalidCaseId(raw.to_string());

        if raw.len() != CASE_ID_LEN || !raw.starts_with(CASE_ID_PREFIX) {
            return Err(invalid());
        }

        let body = &raw[CASE_ID_PREFIX.len()..];
        let shape_ok = body.bytes().enumerate().all(|(i, b)| {
            if i == 8 {
                b == b'-'
            } else {
                b.is_ascii_digit()
            }
        });
        if !shape_ok {
            return Err(invalid());
        }

        // Rejects impossible dates such as month 13 or 25:00:00
        NaiveDateTime::parse_from_str(body, CASE_ID_TIME_FORMAT).map_err(|_| invalid())?;

        Ok(Self(raw.to_string()))
    }

    /// Build the id for a case created at `at`
    pub fn from_datetime<Tz: TimeZone>(at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(format!("{}{}", CASE_ID_PREFIX, at.format(CASE_ID_TIME_FORMAT)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CaseId {
    type Err = InvalidCaseId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CaseId {
    type Error = InvalidCaseId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CaseId> for String {
    fn from(id: CaseId) -> Self {
        id.0
    }
}

impl AsRef<str> for CaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_parse_valid_case_id() {
        let id = CaseId::parse("CASE-20250114-093012").unwrap();
        assert_eq!(id.as_str(), "CASE-20250114-093012");
        assert_eq!(id.to_string(), "CASE-20250114-093012");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for raw in [
            "",
            "CASE-2025011-093012",
            "case-20250114-093012",
            "CASE-20250114093012",
            "CASE-20250114-09301a",
            "CASE-20251314-093012",
            "CASE-20250114-250000",
            "CASE-20250114-093012 ",
        ] {
            assert!(CaseId::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_from_datetime_uses_local_wall_clock() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let at = offset.with_ymd_and_hms(2025, 12, 13, 14, 45, 9).unwrap();
        assert_eq!(CaseId::from_datetime(&at).as_str(), "CASE-20251213-144509");
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let id: CaseId = serde_json::from_str("\"CASE-20200101-000000\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CASE-20200101-000000\"");

        let bad: Result<CaseId, _> = serde_json::from_str("\"CASE-nope\"");
        assert!(bad.is_err());
    }
}
