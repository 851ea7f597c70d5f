//! Applying planned firings.
//!
//! [`apply_firing`] turns one [`PlannedFiring`] into its side-effect
//! records: it marks the entity's fired ledger, builds the immutable
//! [`Violation`] (when the firing records one), and builds the
//! [`NotificationRequest`] for the dispatcher. The caller owns the commit
//! ordering: the entity update and violation must be persisted atomically
//! before the notification is enqueued, so a persistence failure means
//! nothing happened and the next sweep retries safely.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::breach::PlannedFiring;
use crate::entity::TrackedEntity;
use crate::violation::{NotificationRequest, Violation};

/// Label used for reminder notifications, which record no violation.
const REMINDER_REASON_SUFFIX: &str = "_at_risk_reminder";

/// The records produced by applying one firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiringOutcome {
    /// The violation to append, when the firing records one.
    pub violation: Option<Violation>,
    /// The notification to enqueue after the commit succeeds.
    pub notification: NotificationRequest,
}

/// Applies `firing` to `entity`: marks the ledger and builds the records.
///
/// Returns `None` when the ledger already contained the firing's key, which
/// keeps application idempotent even if a plan is replayed.
pub fn apply_firing(
    entity: &mut TrackedEntity,
    firing: &PlannedFiring,
    now: DateTime<Utc>,
) -> Option<FiringOutcome> {
    let state = entity.sla.as_mut()?;
    if !state.fired.mark(firing.key) {
        return None;
    }

    let violation = firing.violation.map(|kind| Violation {
        id: Uuid::new_v4(),
        entity_id: entity.id.clone(),
        tenant_id: entity.tenant_id.clone(),
        kind,
        detected_at: now,
        overdue_minutes: firing.overdue_minutes,
    });

    let reason = match firing.violation {
        Some(kind) => kind.label(),
        None => format!("{}{}", firing.key.track, REMINDER_REASON_SUFFIX),
    };

    Some(FiringOutcome {
        violation,
        notification: NotificationRequest {
            tenant_id: entity.tenant_id.clone(),
            entity_id: entity.id.clone(),
            reason,
            notify: firing.notify.clone(),
        },
    })
}
