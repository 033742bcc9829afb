//! Sitting date - the calendar day identifying one day of proceedings

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A parliamentary sitting date, canonicalized to ISO `YYYY-MM-DD`.
///
/// The upstream Hansard catalog uses `DD-MM-YYYY`; both forms are accepted
/// on input, the ISO form is used everywhere internally and in store keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SittingDate(NaiveDate);

impl SittingDate {
    /// Parse from `DD-MM-YYYY` or `YYYY-MM-DD`; anything else is rejected
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let s = input.trim();
        if s.len() != 10 {
            return Err(CoreError::InvalidDate(input.to_string()));
        }
        NaiveDate::parse_from_str(s, "%d-%m-%Y")
            .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
            .map(Self)
            .map_err(|_| CoreError::InvalidDate(input.to_string()))
    }

    /// Canonical ISO form, e.g. `2024-07-02`
    #[must_use]
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// Upstream catalog form, e.g. `02-07-2024`
    #[must_use]
    pub fn dmy(&self) -> String {
        self.0.format("%d-%m-%Y").to_string()
    }

    /// Date-partition components for object store keys: (`yyyy`, `mm`, `dd`)
    #[must_use]
    pub fn partition(&self) -> (String, String, String) {
        (
            self.0.format("%Y").to_string(),
            self.0.format("%m").to_string(),
            self.0.format("%d").to_string(),
        )
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Whole days between two sitting dates (`other - self`)
    #[must_use]
    pub fn days_until(&self, other: NaiveDate) -> i64 {
        (other - self.0).num_days()
    }
}

impl From<NaiveDate> for SittingDate {
    fn from(d: NaiveDate) -> Self {
        Self(d)
    }
}

impl FromStr for SittingDate {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SittingDate {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SittingDate> for String {
    fn from(d: SittingDate) -> Self {
        d.iso()
    }
}

impl fmt::Display for SittingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iso())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_upstream_form() {
        let d = SittingDate::parse("02-07-2024").unwrap();
        assert_eq!(d.iso(), "2024-07-02");
        assert_eq!(d.dmy(), "02-07-2024");
    }

    #[test]
    fn accepts_iso_form() {
        let d = SittingDate::parse("2024-07-02").unwrap();
        assert_eq!(d.iso(), "2024-07-02");
    }

    #[test]
    fn rejects_short_and_slashed_forms() {
        assert!(SittingDate::parse("2-7-24").is_err());
        assert!(SittingDate::parse("2024/07/02").is_err());
        assert!(SittingDate::parse("").is_err());
    }

    #[test]
    fn partition_is_zero_padded() {
        let d = SittingDate::parse("02-07-2024").unwrap();
        assert_eq!(
            d.partition(),
            ("2024".to_string(), "07".to_string(), "02".to_string())
        );
    }

    #[test]
    fn serde_round_trips_as_iso_string() {
        let d = SittingDate::parse("02-07-2024").unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"2024-07-02\"");
        let back: SittingDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
