//! Status enums for storefront entities.
//!
//! Statuses are stored as lowercase `TEXT` columns guarded by `CHECK`
//! constraints; `Display`/`FromStr` produce and accept exactly those values.

use serde::{Deserialize, Serialize};

/// Error returned when a stored status string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} status: {value}")]
pub struct StatusParseError {
    /// Which status enum failed to parse.
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}

/// Account payment status for storefront users.
///
/// A user becomes `Paid` when the payment webhook confirms a completed
/// checkout for their e-mail address; paid users can read the chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Pending,
    Paid,
}

impl AccountStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            _ => Err(StatusParseError {
                kind: "account",
                value: s.to_owned(),
            }),
        }
    }
}

/// Lifecycle status of a partner mailing schedule.
///
/// `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MailingStatus {
    #[default]
    Active,
    Finished,
}

impl MailingStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for MailingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MailingStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "finished" => Ok(Self::Finished),
            _ => Err(StatusParseError {
                kind: "mailing",
                value: s.to_owned(),
            }),
        }
    }
}
