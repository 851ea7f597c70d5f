//! pacer-daemon - SLA compliance sweep daemon.
//!
//! The async half of the engine: the tenant sweep runner and its
//! fixed-interval scheduler, the external-collaborator traits (entity
//! store, notification dispatcher, tenant directory), daemon
//! configuration, and Prometheus metrics.
//!
//! The pure evaluation logic lives in `pacer-core`; this crate owns every
//! side effect and its ordering. The load-bearing guarantee is in
//! [`sweep::SweepRunner`]: an entity update and its new violation records
//! commit atomically through [`store::EntityStore::commit_evaluation`]
//! before any notification is dispatched, which is what makes sweeps
//! idempotent and crash-safe.
//!
//! Embedders construct a [`sweep::SweepRunner`] over their own store and
//! dispatcher implementations; the shipped binary wires the in-memory
//! store for local operation.

pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod store;
pub mod sweep;

pub use config::{ConfigError, DaemonConfig};
pub use metrics::{MetricsError, SweepMetrics};
pub use scheduler::SweepScheduler;
pub use store::{
    DispatchOutcome, EntityStore, InMemoryStore, LoggingDispatcher, NotificationDispatcher,
    PolicyConfig, StoreError, TenantDirectory,
};
pub use sweep::{SweepError, SweepOptions, SweepReport, SweepRunner, SweepScope, TenantSweepReport};
