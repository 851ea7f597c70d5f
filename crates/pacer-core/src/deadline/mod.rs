//! Deadline computation.
//!
//! Combines the calendar resolver with a matched target to compute the
//! first-response and resolution deadlines for an entity. Deadlines are
//! anchored at the entity's creation time, or at the externally recorded
//! qualifying event under [`EvaluationAnchor::FirstQualifyingEvent`]; while
//! that event is absent the deadlines stay pending and are recomputed on a
//! later sweep.
//!
//! On a priority change the deadlines are recalculated in full from the
//! original anchor with the newly matched target. The anchor never moves,
//! so an entity cannot bank already-elapsed time against a looser budget.

use chrono::{DateTime, Duration, Utc};

use crate::calendar::{add_counted_duration, CalendarError, HolidaySet, OperationalHoursProfile};
use crate::entity::TrackedEntity;
use crate::policy::{EvaluationAnchor, MatchedTarget};

/// Computed deadlines for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// First-response deadline; `None` while the anchor is pending.
    pub response_due: Option<DateTime<Utc>>,
    /// Resolution deadline; `None` while the anchor is pending.
    pub resolution_due: Option<DateTime<Utc>>,
}

impl Deadlines {
    /// Deadlines that are still waiting for their anchor event.
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            response_due: None,
            resolution_due: None,
        }
    }

    /// Whether both deadlines are unset.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.response_due.is_none() && self.resolution_due.is_none()
    }
}

/// The instant budgets are measured from, per the policy's anchor mode.
/// `None` under first-qualifying-event anchoring when the event has not
/// been recorded yet.
#[must_use]
pub fn anchor_instant(
    entity: &TrackedEntity,
    anchor: EvaluationAnchor,
) -> Option<DateTime<Utc>> {
    match anchor {
        EvaluationAnchor::Creation => Some(entity.created_at),
        EvaluationAnchor::FirstQualifyingEvent => entity.anchor_event_at,
    }
}

/// Computes both deadlines for `entity` under `matched`.
///
/// # Errors
///
/// Propagates [`CalendarError`] from the calendar walk (an unusable
/// operational-hours configuration).
pub fn compute(
    entity: &TrackedEntity,
    matched: &MatchedTarget<'_>,
    profile: &OperationalHoursProfile,
    holidays: &HolidaySet,
) -> Result<Deadlines, CalendarError> {
    let Some(anchor) = anchor_instant(entity, matched.policy.anchor) else {
        return Ok(Deadlines::pending());
    };

    let response_due = add_counted_duration(
        anchor,
        Duration::minutes(i64::from(matched.target.response_minutes)),
        profile,
        holidays,
    )?;
    let resolution_due = add_counted_duration(
        anchor,
        Duration::minutes(i64::from(matched.target.resolution_minutes)),
        profile,
        holidays,
    )?;

    Ok(Deadlines {
        response_due: Some(response_due),
        resolution_due: Some(resolution_due),
    })
}

/// Whether the entity's stored deadlines must be (re)computed: nothing
/// computed yet, a different policy or target now matches, or the anchor
/// event has arrived for deadlines that were left pending.
#[must_use]
pub fn is_stale(entity: &TrackedEntity, matched: &MatchedTarget<'_>) -> bool {
    match &entity.sla {
        None => true,
        Some(state) => {
            state.policy_id != matched.policy.id
                || state.target_priority != matched.target.priority
                || (state.response_due.is_none()
                    && anchor_instant(entity, matched.policy.anchor).is_some())
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::calendar::WeekSchedule;
    use crate::entity::{EntityStatus, SlaState};
    use crate::policy::{CustomerTier, Priority, SlaPolicy, SlaTarget};

    fn business_profile() -> OperationalHoursProfile {
        let schedule = WeekSchedule::weekdays(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
        .unwrap();
        OperationalHoursProfile::business(chrono_tz::UTC, schedule)
    }

    fn policy(anchor: EvaluationAnchor) -> SlaPolicy {
        SlaPolicy {
            id: Uuid::new_v4(),
            name: "default".to_string(),
            priorities: Vec::new(),
            categories: Vec::new(),
            departments: Vec::new(),
            customer_tiers: Vec::new(),
            anchor,
            pause_on_hold: false,
            targets: vec![SlaTarget {
                priority: Priority::High,
                response_minutes: 60,
                resolution_minutes: 480,
                reminder_lead_minutes: None,
                escalations: Vec::new(),
            }],
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn entity() -> TrackedEntity {
        TrackedEntity {
            id: "T-1".to_string(),
            tenant_id: "acme".to_string(),
            priority: Priority::High,
            category: "billing".to_string(),
            department: "support".to_string(),
            customer_tier: CustomerTier::Standard,
            status: EntityStatus::Open,
            assigned_to: None,
            // Monday 2025-06-02 10:00 UTC, inside the business window.
            created_at: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap(),
            anchor_event_at: None,
            first_response_at: None,
            resolved_at: None,
            paused_at: None,
            pause_credit_minutes: 0,
            sla: None,
        }
    }

    fn matched(policy: &SlaPolicy) -> MatchedTarget<'_> {
        MatchedTarget {
            policy,
            target: &policy.targets[0],
        }
    }

    #[test]
    fn creation_anchor_computes_both_deadlines() {
        let policy = policy(EvaluationAnchor::Creation);
        let deadlines = compute(
            &entity(),
            &matched(&policy),
            &business_profile(),
            &HolidaySet::empty(),
        )
        .unwrap();

        assert_eq!(
            deadlines.response_due,
            Some(Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap())
        );
        // 8h budget: 7h remain Monday (10:00-17:00), 1h Tuesday.
        assert_eq!(
            deadlines.resolution_due,
            Some(Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn missing_anchor_event_leaves_deadlines_pending() {
        let policy = policy(EvaluationAnchor::FirstQualifyingEvent);
        let deadlines = compute(
            &entity(),
            &matched(&policy),
            &business_profile(),
            &HolidaySet::empty(),
        )
        .unwrap();

        assert!(deadlines.is_pending());
    }

    #[test]
    fn recorded_anchor_event_unpends_the_deadlines() {
        let policy = policy(EvaluationAnchor::FirstQualifyingEvent);
        let mut entity = entity();
        entity.anchor_event_at = Some(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());

        let deadlines = compute(
            &entity,
            &matched(&policy),
            &business_profile(),
            &HolidaySet::empty(),
        )
        .unwrap();
        assert_eq!(
            deadlines.response_due,
            Some(Utc.with_ymd_and_hms(2025, 6, 2, 13, 0, 0).unwrap())
        );
    }

    #[test]
    fn staleness_tracks_policy_and_priority_changes() {
        let policy = policy(EvaluationAnchor::Creation);
        let mut entity = entity();
        assert!(is_stale(&entity, &matched(&policy)));

        entity.sla = Some(SlaState {
            policy_id: policy.id,
            target_priority: Priority::High,
            response_due: Some(entity.created_at),
            resolution_due: Some(entity.created_at),
            fired: Default::default(),
        });
        assert!(!is_stale(&entity, &matched(&policy)));

        // A different policy id means the binding is stale.
        let replacement = self::policy(EvaluationAnchor::Creation);
        assert!(is_stale(&entity, &matched(&replacement)));
    }

    #[test]
    fn pending_deadlines_become_stale_once_the_event_arrives() {
        let policy = policy(EvaluationAnchor::FirstQualifyingEvent);
        let mut entity = entity();
        entity.sla = Some(SlaState {
            policy_id: policy.id,
            target_priority: Priority::High,
            response_due: None,
            resolution_due: None,
            fired: Default::default(),
        });
        assert!(!is_stale(&entity, &matched(&policy)));

        entity.anchor_event_at = Some(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());
        assert!(is_stale(&entity, &matched(&policy)));
    }
}
