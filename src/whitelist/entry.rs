//! Whitelist Entry Types
//!
//! A whitelist entry binds a bare command name to a security level and an
//! optional positional argument shape.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Security level assigned to a whitelisted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Runs immediately
    Safe,
    /// Queued until explicitly approved or denied
    RequiresApproval,
    /// Rejected before anything is spawned
    Forbidden,
}

impl SecurityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Safe => "safe",
            SecurityLevel::RequiresApproval => "requires_approval",
            SecurityLevel::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(SecurityLevel::Safe),
            "requires_approval" | "requires-approval" => Ok(SecurityLevel::RequiresApproval),
            "forbidden" => Ok(SecurityLevel::Forbidden),
            other => Err(format!(
                "Invalid security level: {}. Must be one of: safe, requires_approval, forbidden",
                other
            )),
        }
    }
}

/// Constraint on a single argument position
///
/// Serialized as a plain string for exact matches and as
/// `{ "pattern": "<regex>" }` for patterns.
#[derive(Debug, Clone)]
pub enum ArgPattern {
    /// Argument must equal this string
    Exact(String),
    /// Argument must match this regex (unanchored unless the regex anchors itself)
    Pattern(Regex),
}

impl ArgPattern {
    pub fn exact(value: impl Into<String>) -> Self {
        ArgPattern::Exact(value.into())
    }

    /// Compile a regex constraint
    pub fn pattern(source: &str) -> Result<Self, regex::Error> {
        Ok(ArgPattern::Pattern(Regex::new(source)?))
    }

    pub fn matches(&self, arg: &str) -> bool {
        match self {
            ArgPattern::Exact(expected) => expected == arg,
            ArgPattern::Pattern(re) => re.is_match(arg),
        }
    }
}

impl PartialEq for ArgPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgPattern::Exact(a), ArgPattern::Exact(b)) => a == b,
            (ArgPattern::Pattern(a), ArgPattern::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ArgPatternRepr {
    Exact(String),
    Pattern { pattern: String },
}

impl Serialize for ArgPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            ArgPattern::Exact(value) => ArgPatternRepr::Exact(value.clone()),
            ArgPattern::Pattern(re) => ArgPatternRepr::Pattern {
                pattern: re.as_str().to_string(),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ArgPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ArgPatternRepr::deserialize(deserializer)? {
            ArgPatternRepr::Exact(value) => Ok(ArgPattern::Exact(value)),
            ArgPatternRepr::Pattern { pattern } => {
                ArgPattern::pattern(&pattern).map_err(serde::de::Error::custom)
            }
        }
    }
}

/// Policy entry for one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    /// Command name; stored under its bare name (directories stripped)
    pub command: String,

    #[serde(alias = "security_level")]
    pub security_level: SecurityLevel,

    /// Positional argument constraints; empty means any arguments
    #[serde(default, alias = "allowed_args", skip_serializing_if = "Vec::is_empty")]
    pub allowed_args: Vec<ArgPattern>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WhitelistEntry {
    pub fn new(command: impl Into<String>, security_level: SecurityLevel) -> Self {
        Self {
            command: command.into(),
            security_level,
            allowed_args: Vec::new(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_allowed_args(mut self, allowed_args: Vec<ArgPattern>) -> Self {
        self.allowed_args = allowed_args;
        self
    }
}
