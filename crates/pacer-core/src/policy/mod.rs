//! SLA policy model and policy matching.
//!
//! A tenant configures a set of [`SlaPolicy`] records. Each policy carries
//! applicability conditions over the entity's priority, category, department
//! and customer tier (an empty condition list is a wildcard for that
//! dimension), an evaluation anchor, and per-priority [`SlaTarget`] budgets
//! with ordered escalation levels.
//!
//! [`match_target`] selects the applicable target for an entity. Ties are
//! broken by the number of non-wildcard matching dimensions (most specific
//! first), then by policy creation time (newest wins), so repeated calls
//! over the same inputs are deterministic. No match is a normal outcome,
//! not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Ticket/task priority levels, highest urgency first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Highest urgency.
    Critical,
    /// Elevated urgency.
    High,
    /// Default urgency.
    Medium,
    /// Lowest urgency.
    Low,
}

impl Priority {
    /// Stable lowercase label, used in logs and notification payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer tiers recognised by policy conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    /// Contractual premium support.
    Premium,
    /// Default tier.
    Standard,
    /// Reduced-commitment tier.
    Basic,
}

/// Where the SLA clock is anchored for entities governed by a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationAnchor {
    /// Budgets are measured from the entity's creation time.
    Creation,
    /// Budgets are measured from an externally recorded qualifying event
    /// (for example, first customer contact). Until that event is
    /// recorded, deadlines stay pending and no clock runs.
    FirstQualifyingEvent,
}

/// Recipient of an escalation or reminder notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifyTarget {
    /// Whoever the entity is currently assigned to; resolved by the
    /// notification dispatcher.
    AssignedAgent,
    /// A named agent group.
    Group {
        /// Group identifier.
        name: String,
    },
    /// A specific user.
    User {
        /// User identifier.
        id: String,
    },
    /// A raw email address.
    Email {
        /// Destination address.
        address: String,
    },
}

/// One escalation threshold past a breach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// Level number, starting at 1 and strictly increasing within a target.
    pub level: u32,
    /// Counted minutes past the breached deadline at which this level
    /// fires.
    pub offset_minutes: u32,
    /// Who gets notified when the level fires.
    pub notify: Vec<NotifyTarget>,
}

/// Per-priority budgets and escalation layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTarget {
    /// The priority this target governs.
    pub priority: Priority,
    /// First-response budget in counted minutes.
    pub response_minutes: u32,
    /// Resolution budget in counted minutes.
    pub resolution_minutes: u32,
    /// Optional at-risk reminder lead, in counted minutes before a
    /// deadline. When unset the evaluator falls back to a fraction of the
    /// budget.
    #[serde(default)]
    pub reminder_lead_minutes: Option<u32>,
    /// Escalation levels in ascending order.
    #[serde(default)]
    pub escalations: Vec<EscalationLevel>,
}

/// A tenant's SLA policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    /// Policy identifier.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Priority condition; empty matches any priority.
    #[serde(default)]
    pub priorities: Vec<Priority>,
    /// Category condition; empty matches any category.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Department condition; empty matches any department.
    #[serde(default)]
    pub departments: Vec<String>,
    /// Customer-tier condition; empty matches any tier.
    #[serde(default)]
    pub customer_tiers: Vec<CustomerTier>,
    /// Where the SLA clock is anchored.
    pub anchor: EvaluationAnchor,
    /// Whether entities on hold pause the SLA clock under this policy.
    #[serde(default)]
    pub pause_on_hold: bool,
    /// Per-priority targets.
    pub targets: Vec<SlaTarget>,
    /// Inactive policies never match.
    pub is_active: bool,
    /// Creation time, used as the recency tie-breaker.
    pub created_at: DateTime<Utc>,
}

/// Policy validation failures, reported per tenant at sweep time.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// A target's escalation levels are not strictly ascending by level
    /// number.
    #[error("policy {policy_id}: escalation levels for {priority} are not strictly ascending")]
    UnorderedEscalationLevels {
        /// The offending policy.
        policy_id: Uuid,
        /// The target priority whose levels are unordered.
        priority: Priority,
    },

    /// A target's escalation offsets are not strictly increasing, which
    /// would make monotonic escalation ambiguous.
    #[error("policy {policy_id}: escalation offsets for {priority} are not strictly increasing")]
    UnorderedEscalationOffsets {
        /// The offending policy.
        policy_id: Uuid,
        /// The target priority whose offsets are unordered.
        priority: Priority,
    },

    /// A policy defines two targets for the same priority.
    #[error("policy {policy_id}: duplicate target for priority {priority}")]
    DuplicateTarget {
        /// The offending policy.
        policy_id: Uuid,
        /// The duplicated priority.
        priority: Priority,
    },
}

impl SlaPolicy {
    /// Validates the policy's internal ordering invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            if seen.contains(&target.priority) {
                return Err(PolicyError::DuplicateTarget {
                    policy_id: self.id,
                    priority: target.priority,
                });
            }
            seen.push(target.priority);

            for pair in target.escalations.windows(2) {
                if pair[0].level >= pair[1].level {
                    return Err(PolicyError::UnorderedEscalationLevels {
                        policy_id: self.id,
                        priority: target.priority,
                    });
                }
                if pair[0].offset_minutes >= pair[1].offset_minutes {
                    return Err(PolicyError::UnorderedEscalationOffsets {
                        policy_id: self.id,
                        priority: target.priority,
                    });
                }
            }
        }
        Ok(())
    }

    /// The target governing `priority`, if this policy defines one.
    #[must_use]
    pub fn target_for(&self, priority: Priority) -> Option<&SlaTarget> {
        self.targets.iter().find(|t| t.priority == priority)
    }
}

/// The entity attributes consulted by the matcher.
#[derive(Debug, Clone, Copy)]
pub struct EntityAttributes<'a> {
    /// Entity priority.
    pub priority: Priority,
    /// Entity category.
    pub category: &'a str,
    /// Entity department.
    pub department: &'a str,
    /// Customer tier of the entity's requester.
    pub customer_tier: CustomerTier,
}

/// A matched policy/target pair.
#[derive(Debug, Clone, Copy)]
pub struct MatchedTarget<'a> {
    /// The selected policy.
    pub policy: &'a SlaPolicy,
    /// The policy's target for the entity's priority.
    pub target: &'a SlaTarget,
}

/// Counts the non-wildcard dimensions a policy matches for `attributes`,
/// or `None` when any dimension rejects them.
fn specificity(policy: &SlaPolicy, attributes: &EntityAttributes<'_>) -> Option<usize> {
    let mut score = 0;
    if !policy.priorities.is_empty() {
        if !policy.priorities.contains(&attributes.priority) {
            return None;
        }
        score += 1;
    }
    if !policy.categories.is_empty() {
        if !policy.categories.iter().any(|c| c == attributes.category) {
            return None;
        }
        score += 1;
    }
    if !policy.departments.is_empty() {
        if !policy
            .departments
            .iter()
            .any(|d| d == attributes.department)
        {
            return None;
        }
        score += 1;
    }
    if !policy.customer_tiers.is_empty() {
        if !policy.customer_tiers.contains(&attributes.customer_tier) {
            return None;
        }
        score += 1;
    }
    Some(score)
}

/// Selects the applicable target for `attributes` among `policies`.
///
/// Inactive policies, policies rejected by a condition, and policies with
/// no target for the entity's priority are skipped. Ties resolve by
/// specificity (descending) then creation time (newest wins). Returns
/// `None` when nothing matches, which callers treat as "SLA tracking
/// skipped", not as a failure.
#[must_use]
pub fn match_target<'a>(
    attributes: &EntityAttributes<'_>,
    policies: &'a [SlaPolicy],
) -> Option<MatchedTarget<'a>> {
    let mut best: Option<(usize, DateTime<Utc>, MatchedTarget<'a>)> = None;
    for policy in policies.iter().filter(|p| p.is_active) {
        let Some(score) = specificity(policy, attributes) else {
            continue;
        };
        let Some(target) = policy.target_for(attributes.priority) else {
            continue;
        };
        let candidate = (score, policy.created_at, MatchedTarget { policy, target });
        let better = match &best {
            None => true,
            Some((best_score, best_created, _)) => {
                score > *best_score || (score == *best_score && policy.created_at > *best_created)
            },
        };
        if better {
            best = Some(candidate);
        }
    }
    best.map(|(_, _, matched)| matched)
}
