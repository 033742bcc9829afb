//! Section type enum for the five Hansard section classes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Structural class of a sitting section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectionType {
    /// Oral statements
    Os,
    /// Oral answers to questions
    Oa,
    /// Bills introduced or debated
    Bills,
    /// Papers presented
    Papers,
    /// Everything else (motions, adjournment, corrections)
    #[default]
    Other,
}

impl SectionType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Os => "OS",
            Self::Oa => "OA",
            Self::Bills => "BILLS",
            Self::Papers => "PAPERS",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OS" => Ok(Self::Os),
            "OA" => Ok(Self::Oa),
            "BILLS" => Ok(Self::Bills),
            "PAPERS" => Ok(Self::Papers),
            _ => Ok(Self::Other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_case_insensitively() {
        assert_eq!("oa".parse::<SectionType>().unwrap(), SectionType::Oa);
        assert_eq!("BILLS".parse::<SectionType>().unwrap(), SectionType::Bills);
    }

    #[test]
    fn unknown_types_fall_back_to_other() {
        assert_eq!(
            "WRITTEN".parse::<SectionType>().unwrap(),
            SectionType::Other
        );
    }

    #[test]
    fn serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&SectionType::Oa).unwrap(),
            "\"OA\""
        );
    }
}
