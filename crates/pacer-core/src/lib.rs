//! pacer-core - SLA compliance engine domain logic.
//!
//! This crate holds the pure, deterministic half of the engine: the
//! calendar resolver, the policy matcher, the deadline calculator, the
//! breach evaluator, and firing application. Nothing here performs I/O or
//! reads the clock — every evaluation function takes `now` as an argument,
//! so given the same inputs the engine always plans the same firings.
//!
//! The async half (the tenant sweep scheduler, store traits, metrics and
//! the daemon binary) lives in `pacer-daemon`.
//!
//! # Evaluation pipeline
//!
//! ```text
//! match_target -> deadline::compute -> breach::evaluate -> apply_firing
//! ```
//!
//! The sweep recomputes stale deadlines, evaluates each entity against the
//! matched target, applies the planned firings, and commits the entity
//! update together with the new violation records as one atomic unit
//! before any notification is dispatched.

pub mod breach;
pub mod calendar;
pub mod deadline;
pub mod entity;
pub mod escalation;
pub mod policy;
pub mod violation;

pub use breach::{evaluate, Evaluation, EvaluatorConfig, PlannedFiring, TrackState};
pub use calendar::{
    add_counted_duration, counted_duration, CalendarError, HolidaySet, OperationalHours,
    OperationalHoursProfile, TimeWindow, WeekSchedule,
};
pub use deadline::Deadlines;
pub use entity::{
    EntityStatus, FiredKey, FiredLedger, FiredStage, SlaState, Track, TrackedEntity,
};
pub use escalation::{apply_firing, FiringOutcome};
pub use policy::{
    match_target, CustomerTier, EntityAttributes, EscalationLevel, EvaluationAnchor,
    MatchedTarget, NotifyTarget, PolicyError, Priority, SlaPolicy, SlaTarget,
};
pub use violation::{NotificationRequest, Violation, ViolationKind};
