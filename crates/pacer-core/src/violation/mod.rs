//! Violation records and notification requests.
//!
//! A [`Violation`] is the append-only audit record of a breach or an
//! escalation-level crossing. Records are immutable once created; the
//! engine never updates or deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::Track;
use crate::policy::NotifyTarget;

/// What kind of crossing a violation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// First-response deadline passed without a response.
    ResponseBreach,
    /// Resolution deadline passed without resolution.
    ResolutionBreach,
    /// An escalation level past a breached deadline was crossed.
    EscalationLevel {
        /// The breached track.
        track: Track,
        /// The crossed level number.
        level: u32,
    },
}

impl ViolationKind {
    /// The track this violation belongs to.
    #[must_use]
    pub const fn track(self) -> Track {
        match self {
            Self::ResponseBreach => Track::Response,
            Self::ResolutionBreach => Track::Resolution,
            Self::EscalationLevel { track, .. } => track,
        }
    }

    /// Stable label used in logs, metrics, and notification payloads.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::ResponseBreach => "response_breach".to_string(),
            Self::ResolutionBreach => "resolution_breach".to_string(),
            Self::EscalationLevel { track, level } => {
                format!("{track}_escalation_level_{level}")
            },
        }
    }
}

/// An immutable violation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Record identifier.
    pub id: Uuid,
    /// The entity that breached.
    pub entity_id: String,
    /// The entity's tenant.
    pub tenant_id: String,
    /// What was crossed.
    pub kind: ViolationKind,
    /// When the sweep observed the crossing.
    pub detected_at: DateTime<Utc>,
    /// Counted minutes past the deadline at detection time.
    pub overdue_minutes: i64,
}

/// A request handed to the notification dispatcher after a firing has been
/// durably committed. Delivery is fire-and-forget from the engine's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// The entity's tenant.
    pub tenant_id: String,
    /// The entity the notification is about.
    pub entity_id: String,
    /// Stable label of what fired (violation kind or reminder).
    pub reason: String,
    /// Who to notify.
    pub notify: Vec<NotifyTarget>,
}
