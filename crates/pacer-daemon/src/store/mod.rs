//! External collaborator interfaces.
//!
//! The engine does not own persistence, notification delivery, or tenant
//! provisioning. It consumes them through the traits in this module:
//!
//! - [`EntityStore`]: tenant policy configuration and tracked entities,
//!   with an atomic `commit_evaluation` that persists an entity update and
//!   its new violation records as one unit.
//! - [`NotificationDispatcher`]: fire-and-forget notification handoff.
//!   Delivery failures are the dispatcher's concern; the engine only logs
//!   rejections and never retries.
//! - [`TenantDirectory`]: the set of active tenants to sweep.
//!
//! [`memory::InMemoryStore`] implements all three for tests and local
//! runs.

use async_trait::async_trait;
use pacer_core::calendar::{HolidaySet, OperationalHoursProfile};
use pacer_core::entity::TrackedEntity;
use pacer_core::policy::{PolicyError, SlaPolicy};
use pacer_core::violation::{NotificationRequest, Violation};
use thiserror::Error;
use tracing::info;

pub mod memory;

pub use memory::InMemoryStore;

/// A tenant's SLA configuration, read as an immutable snapshot for the
/// duration of one sweep pass.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// The tenant's operational-hours profile.
    pub profile: OperationalHoursProfile,
    /// The tenant's holiday set.
    pub holidays: HolidaySet,
    /// The tenant's SLA policies.
    pub policies: Vec<SlaPolicy>,
}

impl PolicyConfig {
    /// Validates every policy's internal invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`PolicyError`] encountered.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for policy in &self.policies {
            policy.validate()?;
        }
        Ok(())
    }
}

/// Store and directory failures, classified for retry behaviour.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A read failed transiently; the tenant is skipped this cycle and
    /// retried on the next scheduled sweep.
    #[error("transient read failure: {reason}")]
    TransientRead {
        /// Backend-provided failure description.
        reason: String,
    },

    /// A write failed mid-commit. Nothing was persisted and nothing was
    /// dispatched, so the next sweep retries safely.
    #[error("persistence failure: {reason}")]
    Persistence {
        /// Backend-provided failure description.
        reason: String,
    },

    /// The tenant is not known to the store.
    #[error("unknown tenant: {tenant_id}")]
    UnknownTenant {
        /// The tenant that was requested.
        tenant_id: String,
    },
}

/// Read/write access to tracked entities and tenant SLA configuration.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Loads the tenant's SLA configuration snapshot.
    async fn load_policy_config(&self, tenant_id: &str) -> Result<PolicyConfig, StoreError>;

    /// Lists the tenant's open-class entities under SLA tracking.
    async fn list_open_tracked(&self, tenant_id: &str) -> Result<Vec<TrackedEntity>, StoreError>;

    /// Re-reads one entity's current state. The sweep calls this at
    /// evaluation time so a concurrent status change (for example, a
    /// resolution landing mid-sweep) is honored within the same pass.
    async fn load_entity(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Option<TrackedEntity>, StoreError>;

    /// Persists an entity update together with its new violation records
    /// as one atomic unit: both land or neither does.
    async fn commit_evaluation(
        &self,
        entity: &TrackedEntity,
        violations: &[Violation],
    ) -> Result<(), StoreError>;
}

/// Whether the dispatcher accepted a notification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The request was queued for delivery.
    Accepted,
    /// The request was refused; logged by the engine, never retried.
    Rejected,
}

/// Fire-and-forget notification handoff.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Enqueues one notification request.
    async fn enqueue(&self, request: NotificationRequest) -> DispatchOutcome;
}

/// The set of tenants to sweep.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Lists active tenant identifiers.
    async fn list_active_tenants(&self) -> Result<Vec<String>, StoreError>;
}

/// Dispatcher that logs each request and accepts it. Used by the daemon
/// binary when no real dispatcher is wired in.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn enqueue(&self, request: NotificationRequest) -> DispatchOutcome {
        info!(
            tenant_id = %request.tenant_id,
            entity_id = %request.entity_id,
            reason = %request.reason,
            recipients = request.notify.len(),
            "notification enqueued"
        );
        DispatchOutcome::Accepted
    }
}
