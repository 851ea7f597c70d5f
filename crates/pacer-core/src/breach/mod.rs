//! Breach evaluation.
//!
//! Given an entity with computed deadlines, the evaluator determines the
//! current state of each track and plans the firings the sweep must apply.
//! Planning is pure: the evaluator reads the entity's fired ledger but
//! never mutates it, so evaluating the same state twice plans the same
//! firings and an already-handled firing is never planned again.
//!
//! # Track states
//!
//! Each track progresses `pending -> on-track -> at-risk -> breached`, with
//! a terminal `satisfied`: the response track once `first_response_at` is
//! set, the resolution track once the entity reaches the closed status
//! class. The at-risk window is the target's reminder lead when configured,
//! otherwise a configurable fraction of the budget.
//!
//! # Monotonic escalation
//!
//! Escalation levels are checked in ascending order and every not-yet-fired
//! level whose counted offset has been crossed is planned in the same pass,
//! so a coarse sweep interval can never skip a level.
//!
//! # Pause semantics
//!
//! Effective deadlines are the stored deadlines shifted by the entity's
//! pause credit. A currently paused entity (explicit pause, or hold status
//! under a pause-on-hold policy) keeps its state evaluated but has no
//! firings planned while the pause lasts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{counted_duration, HolidaySet, OperationalHoursProfile};
use crate::entity::{FiredKey, FiredStage, Track, TrackedEntity};
use crate::policy::{MatchedTarget, NotifyTarget};
use crate::violation::ViolationKind;


/// Evaluator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Fraction of a track's budget used as the at-risk lead window when
    /// the target does not configure an explicit reminder lead.
    pub at_risk_ratio: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self { at_risk_ratio: 0.10 }
    }
}

/// State of one track at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// No deadline computed yet (anchor event outstanding).
    Pending,
    /// Inside the budget with comfortable margin.
    OnTrack,
    /// Inside the budget but within the lead window of the deadline.
    AtRisk,
    /// The effective deadline has passed.
    Breached,
    /// Terminal: the track's obligation was met.
    Satisfied,
}

/// One firing the sweep must apply: mark the ledger, optionally append a
/// violation, and enqueue a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFiring {
    /// Ledger key to mark.
    pub key: FiredKey,
    /// Violation to record; `None` for notification-only firings
    /// (the at-risk reminder).
    pub violation: Option<ViolationKind>,
    /// Counted minutes past the deadline at evaluation time.
    pub overdue_minutes: i64,
    /// Notification recipients.
    pub notify: Vec<NotifyTarget>,
}

/// Result of evaluating one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Response-track state.
    pub response: TrackState,
    /// Resolution-track state.
    pub resolution: TrackState,
    /// Firings to apply, response track first, stages ascending.
    pub firings: Vec<PlannedFiring>,
}

impl Evaluation {
    const fn idle(response: TrackState, resolution: TrackState) -> Self {
        Self {
            response,
            resolution,
            firings: Vec::new(),
        }
    }
}

struct TrackInput<'a> {
    track: Track,
    due: Option<DateTime<Utc>>,
    satisfied: bool,
    budget_minutes: u32,
    matched: &'a MatchedTarget<'a>,
}

/// Evaluates `entity` at `now`.
///
/// The caller must have recomputed stale deadlines first; an entity without
/// an SLA binding evaluates to pending on both tracks with no firings.
#[must_use]
pub fn evaluate(
    entity: &TrackedEntity,
    matched: &MatchedTarget<'_>,
    profile: &OperationalHoursProfile,
    holidays: &HolidaySet,
    config: &EvaluatorConfig,
    now: DateTime<Utc>,
) -> Evaluation {
    let Some(state) = &entity.sla else {
        return Evaluation::idle(TrackState::Pending, TrackState::Pending);
    };

    let paused = entity.is_paused(matched.policy.pause_on_hold);
    let pause_credit = entity.pause_credit(now);

    let tracks = [
        TrackInput {
            track: Track::Response,
            due: state.response_due,
            satisfied: entity.first_response_at.is_some(),
            budget_minutes: matched.target.response_minutes,
            matched,
        },
        TrackInput {
            track: Track::Resolution,
            due: state.resolution_due,
            satisfied: entity.status.is_closed_class(),
            budget_minutes: matched.target.resolution_minutes,
            matched,
        },
    ];

    let mut states = [TrackState::Pending; 2];
    let mut firings = Vec::new();

    for (index, input) in tracks.iter().enumerate() {
        if input.satisfied {
            states[index] = TrackState::Satisfied;
            continue;
        }
        let Some(due) = input.due else {
            states[index] = TrackState::Pending;
            continue;
        };
        let effective_due = due + pause_credit;

        if now <= effective_due {
            let remaining = counted_duration(now, effective_due, profile, holidays);
            let lead = at_risk_lead(input, config);
            if remaining <= lead {
                states[index] = TrackState::AtRisk;
                if !paused {
                    plan_reminder(entity, input, &mut firings);
                }
            } else {
                states[index] = TrackState::OnTrack;
            }
            continue;
        }

        states[index] = TrackState::Breached;
        if paused {
            continue;
        }
        let overdue = counted_duration(effective_due, now, profile, holidays);
        plan_breach_firings(entity, input, overdue.num_minutes(), &mut firings);
    }

    Evaluation {
        response: states[0],
        resolution: states[1],
        firings,
    }
}

fn at_risk_lead(input: &TrackInput<'_>, config: &EvaluatorConfig) -> Duration {
    match input.matched.target.reminder_lead_minutes {
        Some(minutes) => Duration::minutes(i64::from(minutes)),
        None => {
            let budget = f64::from(input.budget_minutes);
            let lead = (budget * config.at_risk_ratio).ceil();
            // The ratio is validated into (0, 1), so the product fits i64.
            Duration::minutes(lead as i64)
        },
    }
}

/// Plans the one-shot at-risk reminder for a track, when the target
/// configures an explicit reminder lead and the reminder has not fired.
fn plan_reminder(entity: &TrackedEntity, input: &TrackInput<'_>, firings: &mut Vec<PlannedFiring>) {
    if input.matched.target.reminder_lead_minutes.is_none() {
        return;
    }
    let Some(state) = &entity.sla else { return };
    let key = FiredKey::new(input.track, FiredStage::Reminder);
    if state.fired.contains(key) {
        return;
    }
    firings.push(PlannedFiring {
        key,
        violation: None,
        overdue_minutes: 0,
        notify: vec![NotifyTarget::AssignedAgent],
    });
}

/// Plans the base breach and every crossed-but-unfired escalation level,
/// ascending, for one breached track.
fn plan_breach_firings(
    entity: &TrackedEntity,
    input: &TrackInput<'_>,
    overdue_minutes: i64,
    firings: &mut Vec<PlannedFiring>,
) {
    let Some(state) = &entity.sla else { return };

    let breach_key = FiredKey::new(input.track, FiredStage::Breach);
    if !state.fired.contains(breach_key) {
        let kind = match input.track {
            Track::Response => ViolationKind::ResponseBreach,
            Track::Resolution => ViolationKind::ResolutionBreach,
        };
        firings.push(PlannedFiring {
            key: breach_key,
            violation: Some(kind),
            overdue_minutes,
            notify: vec![NotifyTarget::AssignedAgent],
        });
    }

    for escalation in &input.matched.target.escalations {
        if i64::from(escalation.offset_minutes) > overdue_minutes {
            break;
        }
        let key = FiredKey::new(input.track, FiredStage::Level(escalation.level));
        if state.fired.contains(key) {
            continue;
        }
        firings.push(PlannedFiring {
            key,
            violation: Some(ViolationKind::EscalationLevel {
                track: input.track,
                level: escalation.level,
            }),
            overdue_minutes,
            notify: escalation.notify.clone(),
        });
    }
}
