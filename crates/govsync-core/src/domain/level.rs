//! Enforcement levels
//!
//! The four precedence classes a catalog file can carry. Variant order is
//! significant: the derived `Ord` gives `Optional < Suggested < Required < Forced`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Precedence class of a governed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementLevel {
    /// Synced only when the repository opts in
    Optional,
    /// Synced unless the repository opts out
    Suggested,
    /// Always synced unless sync is disabled; protection is overridden
    Required,
    /// Always synced; immune to every repository-local declaration
    Forced,
}

impl EnforcementLevel {
    /// All levels, lowest precedence first
    pub const ALL: [EnforcementLevel; 4] = [
        EnforcementLevel::Optional,
        EnforcementLevel::Suggested,
        EnforcementLevel::Required,
        EnforcementLevel::Forced,
    ];

    /// Returns true for levels the repository cannot remove (`Required`, `Forced`)
    pub fn is_enforced(&self) -> bool {
        matches!(self, EnforcementLevel::Required | EnforcementLevel::Forced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementLevel::Optional => "optional",
            EnforcementLevel::Suggested => "suggested",
            EnforcementLevel::Required => "required",
            EnforcementLevel::Forced => "forced",
        }
    }
}

impl fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnforcementLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optional" => Ok(EnforcementLevel::Optional),
            "suggested" => Ok(EnforcementLevel::Suggested),
            "required" => Ok(EnforcementLevel::Required),
            "forced" => Ok(EnforcementLevel::Forced),
            _ => Err(DomainError::UnknownVariant {
                field: "enforcement level",
                value: s.to_string(),
            }),
        }
    }
}
