//! # Lifecycle Classes
//!
//! A lifecycle class names the legal statuses of a kind of ticket, their
//! ordering, the follow-up transitions scheduled at creation, and the input
//! rules applied on submission.
//!
//! Statuses carry a rank. A transition is applied only when it moves to a
//! strictly higher rank and the current status is not terminal. Statuses that
//! share a rank are alternative branches (`approved` / `rejected`), so moving
//! sideways between them is treated like a regression.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One named status within a lifecycle class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusStage {
    pub name: String,

    /// Position in the lifecycle; 0 is the initial status
    pub rank: u32,

    /// No transition may leave a terminal status
    #[serde(default)]
    pub terminal: bool,
}

impl StatusStage {
    pub fn new(name: &str, rank: u32) -> Self {
        Self {
            name: name.to_string(),
            rank,
            terminal: false,
        }
    }

    pub fn terminal(name: &str, rank: u32) -> Self {
        Self {
            name: name.to_string(),
            rank,
            terminal: true,
        }
    }
}

/// Automatic transition requested at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpStep {
    /// Minutes after creation
    pub delay_minutes: u32,

    /// Status to advance to
    pub status: String,
}

impl FollowUpStep {
    pub fn new(delay_minutes: u32, status: &str) -> Self {
        Self {
            delay_minutes,
            status: status.to_string(),
        }
    }
}

/// Why a requested transition was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Target rank is at or below the current rank
    Regressive,
    /// Current status is terminal
    AfterTerminal,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regressive => "regressive",
            Self::AfterTerminal => "after_terminal",
        }
    }
}

/// Outcome of the monotonic transition guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// Write the new status
    Apply,
    /// Requested status equals the current status
    Unchanged,
    /// Leave the current status in place
    Ignore(IgnoreReason),
}

/// Definition of one lifecycle class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Class name, e.g. `issue`
    pub name: String,

    /// Prefix for generated ticket ids, e.g. `INC`
    pub id_prefix: String,

    /// Legal statuses
    pub stages: Vec<StatusStage>,

    /// Transitions scheduled at creation
    #[serde(default)]
    pub follow_ups: Vec<FollowUpStep>,

    /// Minimum trimmed description length; 0 makes the description optional
    #[serde(default)]
    pub min_description_chars: usize,

    /// Attributes that must be present and non-blank on submission
    #[serde(default)]
    pub required_attributes: Vec<String>,

    /// Prompt for the acknowledgement text service; `None` disables it
    #[serde(default)]
    pub acknowledgement_prompt: Option<String>,
}

impl LifecyclePolicy {
    /// Support issues: `new → assigned → in_progress → completed`
    pub fn issue() -> Self {
        Self {
            name: "issue".to_string(),
            id_prefix: "INC".to_string(),
            stages: vec![
                StatusStage::new("new", 0),
                StatusStage::new("assigned", 1),
                StatusStage::new("in_progress", 2),
                StatusStage::terminal("completed", 3),
            ],
            follow_ups: vec![
                FollowUpStep::new(5, "assigned"),
                FollowUpStep::new(7, "in_progress"),
                FollowUpStep::new(12, "completed"),
            ],
            min_description_chars: 5,
            required_attributes: Vec::new(),
            acknowledgement_prompt: Some(
                "You are a support assistant. Acknowledge the issue politely and briefly."
                    .to_string(),
            ),
        }
    }

    /// Access requests: same states as issues on a faster schedule
    pub fn access_request() -> Self {
        Self {
            name: "access_request".to_string(),
            id_prefix: "AR".to_string(),
            stages: vec![
                StatusStage::new("new", 0),
                StatusStage::new("assigned", 1),
                StatusStage::new("in_progress", 2),
                StatusStage::terminal("completed", 3),
            ],
            follow_ups: vec![
                FollowUpStep::new(1, "assigned"),
                FollowUpStep::new(2, "in_progress"),
                FollowUpStep::new(3, "completed"),
            ],
            min_description_chars: 0,
            required_attributes: vec!["resource".to_string(), "access_level".to_string()],
            acknowledgement_prompt: None,
        }
    }

    /// Supplier onboarding: document and compliance checks, then approval
    pub fn supplier_onboarding() -> Self {
        Self {
            name: "supplier_onboarding".to_string(),
            id_prefix: "SUP".to_string(),
            stages: vec![
                StatusStage::new("new", 0),
                StatusStage::new("documents_verified", 1),
                StatusStage::new("compliance_checked", 2),
                StatusStage::terminal("approved", 3),
            ],
            follow_ups: vec![
                FollowUpStep::new(1, "documents_verified"),
                FollowUpStep::new(2, "compliance_checked"),
                FollowUpStep::new(3, "approved"),
            ],
            min_description_chars: 0,
            required_attributes: vec!["supplier_name".to_string(), "country".to_string()],
            acknowledgement_prompt: None,
        }
    }

    /// Supply orders: budget decision branches, approved orders ship
    pub fn supply_order() -> Self {
        Self {
            name: "supply_order".to_string(),
            id_prefix: "ORD".to_string(),
            stages: vec![
                StatusStage::new("new", 0),
                StatusStage::new("approved", 1),
                StatusStage::terminal("rejected", 1),
                StatusStage::terminal("shipped", 2),
            ],
            follow_ups: Vec::new(),
            min_description_chars: 0,
            required_attributes: vec!["item_id".to_string()],
            acknowledgement_prompt: Some("Acknowledge this supply request briefly.".to_string()),
        }
    }

    /// Look up a stage by name
    pub fn stage(&self, status: &str) -> Option<&StatusStage> {
        self.stages.iter().find(|stage| stage.name == status)
    }

    /// Whether `status` belongs to this class
    pub fn is_known_status(&self, status: &str) -> bool {
        self.stage(status).is_some()
    }

    /// Status assigned at creation
    pub fn initial_status(&self) -> &str {
        self.stages
            .iter()
            .min_by_key(|stage| stage.rank)
            .map(|stage| stage.name.as_str())
            .unwrap_or("new")
    }

    /// Whether `status` is terminal in this class
    pub fn is_terminal(&self, status: &str) -> bool {
        self.stage(status).is_some_and(|stage| stage.terminal)
    }

    /// Apply the monotonic guard to a requested transition
    ///
    /// A current status that is not part of the class (legacy data) is
    /// treated as a non-terminal rank-0 status.
    pub fn decide(&self, current: &str, requested: &str) -> Result<TransitionDecision, ValidationError> {
        let target = self
            .stage(requested)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "status".to_string(),
                value: requested.to_string(),
            })?;

        if current == requested {
            return Ok(TransitionDecision::Unchanged);
        }

        let (current_rank, current_terminal) = self
            .stage(current)
            .map(|stage| (stage.rank, stage.terminal))
            .unwrap_or((0, false));

        if current_terminal {
            return Ok(TransitionDecision::Ignore(IgnoreReason::AfterTerminal));
        }

        if target.rank <= current_rank {
            return Ok(TransitionDecision::Ignore(IgnoreReason::Regressive));
        }

        Ok(TransitionDecision::Apply)
    }

    /// Check the class definition for consistency
    pub fn validate(&self) -> Result<(), ValidationError> {
        let field = |suffix: &str| format!("lifecycles.{}.{}", self.name, suffix);

        if self.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "lifecycles.name".to_string(),
            });
        }

        if self.id_prefix.is_empty() || !self.id_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ValidationError::InvalidCharacters {
                field: field("id_prefix"),
                invalid_chars: "prefix must be non-empty ASCII alphanumerics".to_string(),
            });
        }

        if self.stages.is_empty() {
            return Err(ValidationError::Required {
                field: field("stages"),
            });
        }

        let mut names = HashSet::new();
        for stage in &self.stages {
            if !names.insert(stage.name.as_str()) {
                return Err(ValidationError::InvalidFormat {
                    field: field("stages"),
                    message: format!("duplicate status '{}'", stage.name),
                });
            }
        }

        let initial_count = self.stages.iter().filter(|stage| stage.rank == 0).count();
        if initial_count != 1 {
            return Err(ValidationError::InvalidFormat {
                field: field("stages"),
                message: "exactly one status must have rank 0".to_string(),
            });
        }

        if self.is_terminal(self.initial_status()) {
            return Err(ValidationError::InvalidFormat {
                field: field("stages"),
                message: "initial status cannot be terminal".to_string(),
            });
        }

        for step in &self.follow_ups {
            match self.stage(&step.status) {
                Some(stage) if stage.rank > 0 => {}
                Some(_) => {
                    return Err(ValidationError::InvalidFormat {
                        field: field("follow_ups"),
                        message: format!("follow-up cannot target initial status '{}'", step.status),
                    });
                }
                None => {
                    return Err(ValidationError::UnknownValue {
                        field: field("follow_ups"),
                        value: step.status.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Set of lifecycle classes known to a tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRegistry {
    classes: BTreeMap<String, LifecyclePolicy>,
    default_class: String,
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::from_policies(
            vec![
                LifecyclePolicy::issue(),
                LifecyclePolicy::access_request(),
                LifecyclePolicy::supplier_onboarding(),
                LifecyclePolicy::supply_order(),
            ],
            "issue",
        )
        .unwrap_or_else(|_| Self {
            classes: BTreeMap::from([("issue".to_string(), LifecyclePolicy::issue())]),
            default_class: "issue".to_string(),
        })
    }
}

impl LifecycleRegistry {
    /// Build a registry, validating every class
    pub fn from_policies(
        policies: Vec<LifecyclePolicy>,
        default_class: &str,
    ) -> Result<Self, ValidationError> {
        let mut classes = BTreeMap::new();

        for policy in policies {
            policy.validate()?;
            let name = policy.name.clone();
            if classes.insert(name.clone(), policy).is_some() {
                return Err(ValidationError::InvalidFormat {
                    field: "lifecycles".to_string(),
                    message: format!("duplicate lifecycle '{}'", name),
                });
            }
        }

        if !classes.contains_key(default_class) {
            return Err(ValidationError::UnknownValue {
                field: "lifecycles.default".to_string(),
                value: default_class.to_string(),
            });
        }

        Ok(Self {
            classes,
            default_class: default_class.to_string(),
        })
    }

    /// Look up a class by name
    pub fn get(&self, name: &str) -> Option<&LifecyclePolicy> {
        self.classes.get(name)
    }

    /// Class used when a submission names none
    pub fn default_class(&self) -> &LifecyclePolicy {
        // from_policies guarantees presence
        &self.classes[&self.default_class]
    }

    /// Resolve an optional class name from a submission
    pub fn resolve(&self, requested: Option<&str>) -> Result<&LifecyclePolicy, ValidationError> {
        match requested.map(str::trim).filter(|name| !name.is_empty()) {
            None => Ok(self.default_class()),
            Some(name) => self.get(name).ok_or_else(|| ValidationError::UnknownValue {
                field: "lifecycle".to_string(),
                value: name.to_string(),
            }),
        }
    }

    /// Names of all registered classes
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
