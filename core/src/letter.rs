use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EngineError;

/// A single drive letter, stored uppercase.
///
/// Accepts `"e"`, `"E"`, `"e:"` and `"E:"` on input and renders as `E:`.
/// Deserialization routes through [`parse`](Self::parse), so letters
/// arriving in data face the same checks as operator input.
/// PowerShell emits letterless partitions as null or a NUL character;
/// both fail to parse, which is how absence is represented downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DriveLetter(char);

impl DriveLetter {
    pub fn parse(input: &str) -> Result<Self, EngineError> {
        let trimmed = input.trim().trim_end_matches(':');
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(DriveLetter(c.to_ascii_uppercase())),
            _ => Err(EngineError::InvalidInput(format!(
                "not a drive letter: {:?}",
                input
            ))),
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// `E:` form used in command arguments.
    pub fn with_colon(&self) -> String {
        format!("{}:", self.0)
    }

    /// The 24 letters assignments can draw from. A and B are never offered.
    pub fn usable_space() -> impl Iterator<Item = DriveLetter> {
        ('C'..='Z').map(DriveLetter)
    }

    /// Conservative offer used when the mounted-letter query fails.
    pub fn fallback_letters() -> Vec<DriveLetter> {
        ('D'..='N').map(DriveLetter).collect()
    }
}

impl FromStr for DriveLetter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for DriveLetter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DriveLetter::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.0)
    }
}
