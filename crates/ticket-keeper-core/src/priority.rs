//! # Priority Policy Table
//!
//! Pure mapping from priority tier to SLA time budgets. Unknown priorities
//! resolve to the default tier instead of failing.

use crate::{Timestamp, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Priority tier of a ticket
///
/// Immutable after creation. Parsing is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    /// Every tier, most urgent first
    pub const ALL: [Priority; 4] = [Self::P1, Self::P2, Self::P3, Self::P4];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
            Self::P4 => "P4",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            "P4" => Ok(Self::P4),
            _ => Err(ValidationError::UnknownValue {
                field: "priority".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

/// Time budgets for one priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBudget {
    /// Minutes allowed until first response
    pub response_minutes: u32,

    /// Minutes allowed until resolution
    pub resolve_minutes: u32,
}

impl SlaBudget {
    pub const fn new(response_minutes: u32, resolve_minutes: u32) -> Self {
        Self {
            response_minutes,
            resolve_minutes,
        }
    }

    /// Absolute deadlines for a ticket created at `created_at`
    pub fn deadlines_from(&self, created_at: Timestamp) -> crate::ticket::Sla {
        crate::ticket::Sla::new(
            created_at.add_minutes(self.response_minutes),
            created_at.add_minutes(self.resolve_minutes),
        )
    }
}

/// Priority tier to SLA budget table
///
/// # Examples
///
/// ```
/// use ticket_keeper_core::{Priority, PriorityPolicy};
///
/// let policy = PriorityPolicy::default();
/// assert_eq!(policy.resolve_priority(Some("p1")), Priority::P1);
/// assert_eq!(policy.resolve_priority(Some("urgent")), Priority::P3);
/// assert_eq!(policy.resolve_priority(None), Priority::P3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityPolicy {
    /// Tier used for missing or unrecognized priorities
    pub default_tier: Priority,

    /// Budget per tier
    pub tiers: BTreeMap<Priority, SlaBudget>,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        let tiers = BTreeMap::from([
            (Priority::P1, SlaBudget::new(15, 240)),
            (Priority::P2, SlaBudget::new(60, 1440)),
            (Priority::P3, SlaBudget::new(240, 4320)),
            (Priority::P4, SlaBudget::new(480, 10080)),
        ]);

        Self {
            default_tier: Priority::P3,
            tiers,
        }
    }
}

impl PriorityPolicy {
    /// Budgets for a tier, falling back to the default tier
    ///
    /// A validated policy always contains the default tier. An unvalidated
    /// table missing both falls back to the built-in P3 budget.
    pub fn budgets_for(&self, priority: Priority) -> SlaBudget {
        self.tiers
            .get(&priority)
            .or_else(|| self.tiers.get(&self.default_tier))
            .copied()
            .unwrap_or(SlaBudget::new(240, 4320))
    }

    /// Lenient priority resolution used at ticket creation
    pub fn resolve_priority(&self, raw: Option<&str>) -> Priority {
        raw.and_then(|value| value.parse::<Priority>().ok())
            .filter(|priority| self.tiers.contains_key(priority))
            .unwrap_or(self.default_tier)
    }

    /// Check table consistency
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.tiers.contains_key(&self.default_tier) {
            return Err(ValidationError::InvalidFormat {
                field: "sla.default_tier".to_string(),
                message: format!("tier {} has no budget", self.default_tier),
            });
        }

        for (priority, budget) in &self.tiers {
            if budget.response_minutes > budget.resolve_minutes {
                return Err(ValidationError::InvalidFormat {
                    field: format!("sla.tiers.{}", priority),
                    message: format!(
                        "response budget {}m exceeds resolve budget {}m",
                        budget.response_minutes, budget.resolve_minutes
                    ),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
