//! Query complexity tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete complexity classification of an incoming query.
///
/// Every query maps to exactly one tier. Tiers select which backend
/// priority list the router walks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Short factual questions and greetings.
    Simple,
    /// Explanations, comparisons, how-to questions.
    Medium,
    /// Deep analysis, architecture, long prompts.
    Complex,
}

impl Tier {
    /// All tiers in fallback order.
    pub const ALL: [Tier; 3] = [Tier::Simple, Tier::Medium, Tier::Complex];

    /// Lowercase label used in logs and the usage table.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Simple => "simple",
            Tier::Medium => "medium",
            Tier::Complex => "complex",
        }
    }

    /// The other two tiers, in the fixed fallback order.
    pub fn fallbacks(self) -> impl Iterator<Item = Tier> {
        Self::ALL.into_iter().filter(move |t| *t != self)
    }

    /// Composite label for an attempt made from `fallback`'s priority list
    /// while serving a query originally classified as `self`.
    pub fn fallback_label(self, fallback: Tier) -> String {
        format!("{}->{}", self.as_str(), fallback.as_str())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Tier::Simple),
            "medium" => Ok(Tier::Medium),
            "complex" => Ok(Tier::Complex),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}
