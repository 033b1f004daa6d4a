use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Row-level validation checks that can be listed in a table's `check_list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CheckCode {
    /// No field of the record is null.
    NotNull,
    /// Every numeric field is zero or greater.
    NonNegative,
    /// No text field is empty after trimming whitespace.
    NonBlank,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown check code: {0}")]
pub struct UnknownCheckCode(pub String);

impl CheckCode {
    pub const ALL: [CheckCode; 3] = [CheckCode::NotNull, CheckCode::NonNegative, CheckCode::NonBlank];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCode::NotNull => "not_null",
            CheckCode::NonNegative => "non_negative",
            CheckCode::NonBlank => "non_blank",
        }
    }

    /// Joins codes the way they are stored in the `reject_reasons` column.
    pub fn join(codes: &[CheckCode]) -> String {
        codes
            .iter()
            .map(CheckCode::as_str)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl FromStr for CheckCode {
    type Err = UnknownCheckCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_null" => Ok(CheckCode::NotNull),
            "non_negative" => Ok(CheckCode::NonNegative),
            "non_blank" => Ok(CheckCode::NonBlank),
            other => Err(UnknownCheckCode(other.to_string())),
        }
    }
}

impl TryFrom<String> for CheckCode {
    type Error = UnknownCheckCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CheckCode> for String {
    fn from(code: CheckCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for CheckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
