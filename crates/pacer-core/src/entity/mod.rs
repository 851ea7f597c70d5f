//! Tracked entities and their SLA bookkeeping.
//!
//! A [`TrackedEntity`] is the engine's read/write view of a ticket or task
//! owned by the external store. The engine populates the [`SlaState`]
//! binding (matched policy, computed deadlines) and mutates only the
//! [`FiredLedger`] and deadline fields; everything else is owned by the
//! surrounding product.
//!
//! The fired ledger is an explicit ordered set keyed by `(track, stage)`,
//! which is the single source of truth for "already handled" and what makes
//! the idempotence and monotonic-escalation guarantees mechanically
//! checkable.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::{CustomerTier, EntityAttributes, Priority};

/// Ticket/task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Newly created, not yet picked up.
    Open,
    /// Being worked.
    InProgress,
    /// Parked pending external input.
    Hold,
    /// Work finished; part of the closed class.
    Resolved,
    /// Fully closed; part of the closed class.
    Closed,
}

impl EntityStatus {
    /// Whether the status belongs to the closed class. Closed-class
    /// entities are excluded from sweeps and their SLA fields are frozen.
    #[must_use]
    pub const fn is_closed_class(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// The two independent SLA tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    /// First-response deadline.
    Response,
    /// Resolution deadline.
    Resolution,
}

impl Track {
    /// Stable label used in logs and violation kinds.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Response => "response",
            Self::Resolution => "resolution",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage along a track's escalation progression. The derived ordering
/// (reminder, then breach, then ascending levels) is the firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiredStage {
    /// The one-shot at-risk reminder.
    Reminder,
    /// The base deadline breach.
    Breach,
    /// An escalation level past the breach.
    Level(u32),
}

/// Ledger key: a stage on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiredKey {
    /// The track the firing belongs to.
    pub track: Track,
    /// The stage that fired.
    pub stage: FiredStage,
}

impl FiredKey {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(track: Track, stage: FiredStage) -> Self {
        Self { track, stage }
    }
}

/// Ordered set of firings already handled for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredLedger {
    entries: BTreeSet<FiredKey>,
}

impl FiredLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has already fired.
    #[must_use]
    pub fn contains(&self, key: FiredKey) -> bool {
        self.entries.contains(&key)
    }

    /// Marks `key` as fired. Returns `false` when it was already present.
    pub fn mark(&mut self, key: FiredKey) -> bool {
        self.entries.insert(key)
    }

    /// The highest escalation level already fired on `track`, if any.
    #[must_use]
    pub fn highest_level(&self, track: Track) -> Option<u32> {
        self.entries
            .iter()
            .filter(|key| key.track == track)
            .filter_map(|key| match key.stage {
                FiredStage::Level(level) => Some(level),
                _ => None,
            })
            .max()
    }

    /// Iterates the fired keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &FiredKey> {
        self.entries.iter()
    }

    /// Number of recorded firings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has fired yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The engine-owned SLA binding on an entity: which policy/target governs
/// it, the computed deadlines, and the fired ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaState {
    /// The matched policy.
    pub policy_id: Uuid,
    /// The matched target's priority at computation time. A mismatch with
    /// the entity's current priority marks the deadlines stale.
    pub target_priority: Priority,
    /// Computed first-response deadline; `None` while pending.
    pub response_due: Option<DateTime<Utc>>,
    /// Computed resolution deadline; `None` while pending.
    pub resolution_due: Option<DateTime<Utc>>,
    /// Firings already handled.
    #[serde(default)]
    pub fired: FiredLedger,
}

/// A ticket or task under SLA monitoring, as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedEntity {
    /// Store-assigned entity identifier.
    pub id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Current priority.
    pub priority: Priority,
    /// Current category.
    pub category: String,
    /// Current department.
    pub department: String,
    /// Requester's customer tier.
    pub customer_tier: CustomerTier,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Current assignee, if any; consumed by notification targeting.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    /// Qualifying-event instant for policies anchored on
    /// first-qualifying-event; recorded externally.
    #[serde(default)]
    pub anchor_event_at: Option<DateTime<Utc>>,
    /// When the first agent response happened; `None` while the response
    /// SLA is still running.
    #[serde(default)]
    pub first_response_at: Option<DateTime<Utc>>,
    /// When the entity was resolved.
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Start of the pause currently in effect, if any.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Accumulated pause credit from completed pauses, in minutes.
    #[serde(default)]
    pub pause_credit_minutes: i64,
    /// Engine-owned SLA binding; `None` until a policy has matched.
    #[serde(default)]
    pub sla: Option<SlaState>,
}

impl TrackedEntity {
    /// The attribute tuple consulted by the policy matcher.
    #[must_use]
    pub fn attributes(&self) -> EntityAttributes<'_> {
        EntityAttributes {
            priority: self.priority,
            category: &self.category,
            department: &self.department,
            customer_tier: self.customer_tier,
        }
    }

    /// Total pause credit at `now`: completed pauses plus the pause
    /// currently in effect. Effective deadlines are the stored deadlines
    /// shifted by this amount.
    #[must_use]
    pub fn pause_credit(&self, now: DateTime<Utc>) -> Duration {
        let mut credit = Duration::minutes(self.pause_credit_minutes);
        if let Some(paused_at) = self.paused_at {
            if now > paused_at {
                credit += now - paused_at;
            }
        }
        credit
    }

    /// Whether the entity's SLA clock is currently paused, either
    /// explicitly or because it is on hold under a pause-on-hold policy.
    #[must_use]
    pub fn is_paused(&self, pause_on_hold: bool) -> bool {
        self.paused_at.is_some() || (pause_on_hold && self.status == EntityStatus::Hold)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn fired_stage_ordering_is_reminder_breach_then_levels() {
        let mut stages = vec![
            FiredStage::Level(3),
            FiredStage::Breach,
            FiredStage::Level(1),
            FiredStage::Reminder,
        ];
        stages.sort();
        assert_eq!(
            stages,
            vec![
                FiredStage::Reminder,
                FiredStage::Breach,
                FiredStage::Level(1),
                FiredStage::Level(3),
            ]
        );
    }

    #[test]
    fn ledger_mark_is_idempotent() {
        let mut ledger = FiredLedger::new();
        let key = FiredKey::new(Track::Response, FiredStage::Breach);

        assert!(ledger.mark(key));
        assert!(!ledger.mark(key));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(key));
    }

    #[test]
    fn highest_level_ignores_the_other_track() {
        let mut ledger = FiredLedger::new();
        ledger.mark(FiredKey::new(Track::Response, FiredStage::Level(2)));
        ledger.mark(FiredKey::new(Track::Resolution, FiredStage::Level(5)));

        assert_eq!(ledger.highest_level(Track::Response), Some(2));
        assert_eq!(ledger.highest_level(Track::Resolution), Some(5));
    }

    #[test]
    fn pause_credit_includes_the_open_pause() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let entity = TrackedEntity {
            id: "T-1".to_string(),
            tenant_id: "acme".to_string(),
            priority: Priority::High,
            category: "billing".to_string(),
            department: "support".to_string(),
            customer_tier: CustomerTier::Standard,
            status: EntityStatus::Hold,
            assigned_to: None,
            created_at: start,
            anchor_event_at: None,
            first_response_at: None,
            resolved_at: None,
            paused_at: Some(start),
            pause_credit_minutes: 30,
            sla: None,
        };

        let now = start + Duration::minutes(45);
        assert_eq!(entity.pause_credit(now), Duration::minutes(75));
        assert!(entity.is_paused(false));
    }

    #[test]
    fn hold_only_pauses_under_a_pause_on_hold_policy() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        let entity = TrackedEntity {
            id: "T-2".to_string(),
            tenant_id: "acme".to_string(),
            priority: Priority::Low,
            category: "general".to_string(),
            department: "support".to_string(),
            customer_tier: CustomerTier::Basic,
            status: EntityStatus::Hold,
            assigned_to: None,
            created_at: start,
            anchor_event_at: None,
            first_response_at: None,
            resolved_at: None,
            paused_at: None,
            pause_credit_minutes: 0,
            sla: None,
        };

        assert!(entity.is_paused(true));
        assert!(!entity.is_paused(false));
    }
}
