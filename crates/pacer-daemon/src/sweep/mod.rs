//! The tenant sweep: the engine's single operational entry point.
//!
//! A sweep iterates active tenants and, per tenant: loads the SLA
//! configuration snapshot, lists open tracked entities, re-reads each
//! entity's current state, recomputes stale deadlines, evaluates breaches,
//! applies planned firings, and commits the entity update together with its
//! new violation records as one atomic unit before dispatching
//! notifications.
//!
//! # Isolation and exclusion
//!
//! Tenants run in parallel under a bounded worker pool; tenant data is
//! fully partitioned, so there is no cross-tenant shared mutable state. A
//! per-tenant async mutex guarantees two overlapping sweeps never race on
//! the same entity's fired ledger: a tenant whose lock is held is skipped
//! this cycle and retried on the next one.
//!
//! # Failure containment
//!
//! Tenant-scoped failures (unusable configuration, transient reads, failed
//! commits) are caught at the tenant boundary and recorded in the
//! [`SweepReport`]; only a tenant-directory failure aborts the run. A
//! failed commit dispatched nothing, so the next sweep retries it safely.
//!
//! # Dry run
//!
//! `dry_run = true` executes the full evaluation pipeline but suppresses
//! commits and notification dispatch, reporting what would have fired.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use pacer_core::breach::{self, EvaluatorConfig};
use pacer_core::calendar::CalendarError;
use pacer_core::deadline;
use pacer_core::entity::{SlaState, TrackedEntity};
use pacer_core::escalation::apply_firing;
use pacer_core::policy::match_target;
use pacer_core::violation::{NotificationRequest, Violation};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::metrics::SweepMetrics;
use crate::store::{
    DispatchOutcome, EntityStore, NotificationDispatcher, PolicyConfig, StoreError,
    TenantDirectory,
};


/// What a sweep invocation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepScope {
    /// Every active tenant from the directory.
    All,
    /// A single tenant.
    Tenant(String),
}

/// Fatal sweep failures. Everything tenant-scoped is contained in the
/// report instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SweepError {
    /// The tenant directory could not be read; the whole run is aborted
    /// and retried at the next scheduled interval.
    #[error("tenant directory unavailable: {reason}")]
    TenantDirectory {
        /// Backend-provided failure description.
        reason: String,
    },
}

/// Runner tuning.
#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    /// Maximum tenants evaluated concurrently.
    pub max_concurrent_tenants: usize,
    /// Breach evaluator tuning.
    pub evaluator: EvaluatorConfig,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            max_concurrent_tenants: 4,
            evaluator: EvaluatorConfig::default(),
        }
    }
}

/// Per-tenant sweep outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TenantSweepReport {
    /// The tenant this entry covers.
    pub tenant_id: String,
    /// Entities that went through the evaluation pipeline.
    pub entities_evaluated: usize,
    /// Violations recorded (or, under dry run, that would have been).
    pub violations_recorded: usize,
    /// Notifications enqueued (or, under dry run, that would have been).
    pub notifications_enqueued: usize,
    /// Whether the tenant was skipped without evaluation (overlapping
    /// sweep or cancellation).
    pub skipped: bool,
    /// Tenant-scoped errors encountered.
    pub errors: Vec<String>,
}

impl TenantSweepReport {
    fn new(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            entities_evaluated: 0,
            violations_recorded: 0,
            notifications_enqueued: 0,
            skipped: false,
            errors: Vec::new(),
        }
    }

    fn skipped(tenant_id: &str, reason: &str) -> Self {
        let mut report = Self::new(tenant_id);
        report.skipped = true;
        report.errors.push(reason.to_string());
        report
    }
}

/// Outcome of one sweep invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Whether persistence and dispatch were suppressed.
    pub dry_run: bool,
    /// When the sweep started.
    pub started_at: DateTime<Utc>,
    /// Per-tenant outcomes, ordered by tenant id.
    pub tenants: Vec<TenantSweepReport>,
}

impl SweepReport {
    /// Total violations recorded across tenants.
    #[must_use]
    pub fn total_violations(&self) -> usize {
        self.tenants.iter().map(|t| t.violations_recorded).sum()
    }

    /// Total tenant-scoped errors across tenants.
    #[must_use]
    pub fn total_errors(&self) -> usize {
        self.tenants.iter().map(|t| t.errors.len()).sum()
    }
}

/// Per-entity failures, contained at the tenant boundary.
#[derive(Debug, Error)]
enum EntitySweepError {
    /// The tenant's calendar configuration is unusable; the rest of the
    /// tenant's entities are skipped this cycle.
    #[error("calendar configuration error: {0}")]
    Calendar(#[from] CalendarError),

    /// A store read or commit failed for this entity only.
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct EntityOutcome {
    violations: usize,
    notifications: usize,
}

/// Drives sweeps over the configured collaborators. Cheap to clone; all
/// state is shared.
#[derive(Clone)]
pub struct SweepRunner {
    store: Arc<dyn EntityStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    directory: Arc<dyn TenantDirectory>,
    options: SweepOptions,
    limiter: Arc<Semaphore>,
    tenant_locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<SweepMetrics>,
}

impl SweepRunner {
    /// Creates a runner over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        directory: Arc<dyn TenantDirectory>,
        options: SweepOptions,
        metrics: Arc<SweepMetrics>,
    ) -> Self {
        let permits = options.max_concurrent_tenants.max(1);
        Self {
            store,
            dispatcher,
            directory,
            options,
            limiter: Arc::new(Semaphore::new(permits)),
            tenant_locks: Arc::new(StdMutex::new(HashMap::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            metrics,
        }
    }

    /// Handle for requesting cancellation. A cancelled sweep finishes the
    /// tenants it has started and skips the rest; committed tenant state
    /// stays durable.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The runner's metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<SweepMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs one sweep over `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::TenantDirectory`] when the active-tenant list
    /// cannot be read. All other failures are tenant-scoped and land in
    /// the report.
    pub async fn run_sweep(
        &self,
        scope: SweepScope,
        dry_run: bool,
    ) -> Result<SweepReport, SweepError> {
        let started_at = Utc::now();
        let timer = std::time::Instant::now();
        let tenant_ids = match scope {
            SweepScope::Tenant(tenant_id) => vec![tenant_id],
            SweepScope::All => self.directory.list_active_tenants().await.map_err(|err| {
                SweepError::TenantDirectory {
                    reason: err.to_string(),
                }
            })?,
        };

        let mut join_set = JoinSet::new();
        let mut tenants = Vec::with_capacity(tenant_ids.len());
        for tenant_id in tenant_ids {
            if self.shutdown.load(Ordering::Relaxed) {
                info!(tenant_id = %tenant_id, "sweep cancelled before tenant");
                tenants.push(TenantSweepReport::skipped(&tenant_id, "sweep cancelled"));
                continue;
            }
            let runner = self.clone();
            join_set.spawn(async move {
                let _permit = match runner.limiter.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TenantSweepReport::skipped(&tenant_id, "worker pool closed")
                    },
                };
                runner.sweep_tenant(&tenant_id, dry_run).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(report) => tenants.push(report),
                Err(err) => error!(error = %err, "tenant sweep task failed"),
            }
        }
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));

        let report = SweepReport {
            dry_run,
            started_at,
            tenants,
        };
        if !dry_run {
            self.metrics.observe_sweep(timer.elapsed().as_secs_f64());
        }
        info!(
            tenants = report.tenants.len(),
            violations = report.total_violations(),
            errors = report.total_errors(),
            dry_run,
            "sweep complete"
        );
        Ok(report)
    }

    /// The tenant's exclusion lock, created on first use.
    fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock().expect("tenant lock map poisoned");
        Arc::clone(
            locks
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn sweep_tenant(&self, tenant_id: &str, dry_run: bool) -> TenantSweepReport {
        let lock = self.tenant_lock(tenant_id);
        let Ok(_guard) = lock.try_lock() else {
            debug!(tenant_id, "tenant sweep already in progress, skipping");
            return TenantSweepReport::skipped(tenant_id, "sweep already in progress");
        };

        let mut report = TenantSweepReport::new(tenant_id);

        let config = match self.store.load_policy_config(tenant_id).await {
            Ok(config) => config,
            Err(err) => {
                warn!(tenant_id, error = %err, "failed to load tenant policy config");
                if !dry_run {
                    self.metrics.tenant_failure("config_read");
                }
                report.errors.push(err.to_string());
                return report;
            },
        };
        if let Err(err) = config.validate() {
            warn!(tenant_id, error = %err, "tenant policy config rejected");
            if !dry_run {
                self.metrics.tenant_failure("config_invalid");
            }
            report.errors.push(err.to_string());
            return report;
        }

        let entities = match self.store.list_open_tracked(tenant_id).await {
            Ok(entities) => entities,
            Err(err) => {
                warn!(tenant_id, error = %err, "failed to list tracked entities");
                if !dry_run {
                    self.metrics.tenant_failure("entity_read");
                }
                report.errors.push(err.to_string());
                return report;
            },
        };

        let now = Utc::now();
        for listed in entities {
            let fresh = match self.store.load_entity(tenant_id, &listed.id).await {
                Ok(Some(entity)) => entity,
                Ok(None) => continue,
                Err(err) => {
                    report.errors.push(err.to_string());
                    continue;
                },
            };
            // A concurrent status change mid-sweep (for example a
            // resolution) takes effect within this same pass.
            if fresh.status.is_closed_class() {
                continue;
            }
            match self.evaluate_entity(fresh, &config, now, dry_run).await {
                Ok(Some(outcome)) => {
                    report.entities_evaluated += 1;
                    report.violations_recorded += outcome.violations;
                    report.notifications_enqueued += outcome.notifications;
                },
                Ok(None) => {},
                Err(EntitySweepError::Calendar(err)) => {
                    // The profile is unusable for every entity of this
                    // tenant; skip the remainder of the pass.
                    warn!(tenant_id, error = %err, "unusable calendar configuration");
                    if !dry_run {
                        self.metrics.tenant_failure("config_invalid");
                    }
                    report.errors.push(err.to_string());
                    break;
                },
                Err(EntitySweepError::Store(err)) => {
                    report.errors.push(err.to_string());
                },
            }
        }

        info!(
            tenant_id,
            entities = report.entities_evaluated,
            violations = report.violations_recorded,
            errors = report.errors.len(),
            "tenant sweep finished"
        );
        report
    }

    async fn evaluate_entity(
        &self,
        mut entity: TrackedEntity,
        config: &PolicyConfig,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<Option<EntityOutcome>, EntitySweepError> {
        let Some(matched) = match_target(&entity.attributes(), &config.policies) else {
            debug!(
                tenant_id = %entity.tenant_id,
                entity_id = %entity.id,
                "no SLA policy matched, tracking skipped"
            );
            return Ok(None);
        };

        let mut dirty = false;
        if deadline::is_stale(&entity, &matched) {
            let deadlines =
                deadline::compute(&entity, &matched, &config.profile, &config.holidays)?;
            // The fired ledger survives a recompute: already-handled
            // firings stay handled across priority changes.
            let fired = entity.sla.take().map(|state| state.fired).unwrap_or_default();
            entity.sla = Some(SlaState {
                policy_id: matched.policy.id,
                target_priority: matched.target.priority,
                response_due: deadlines.response_due,
                resolution_due: deadlines.resolution_due,
                fired,
            });
            dirty = true;
        }

        let evaluation = breach::evaluate(
            &entity,
            &matched,
            &config.profile,
            &config.holidays,
            &self.options.evaluator,
            now,
        );

        let mut violations: Vec<Violation> = Vec::new();
        let mut notifications: Vec<NotificationRequest> = Vec::new();
        for firing in &evaluation.firings {
            if let Some(outcome) = apply_firing(&mut entity, firing, now) {
                if let Some(violation) = outcome.violation {
                    violations.push(violation);
                }
                notifications.push(outcome.notification);
                dirty = true;
            }
        }

        if dry_run {
            return Ok(Some(EntityOutcome {
                violations: violations.len(),
                notifications: notifications.len(),
            }));
        }

        // Persist before dispatch: a failed commit means nothing happened
        // and nothing may be notified.
        if dirty {
            self.store.commit_evaluation(&entity, &violations).await?;
        }
        for violation in &violations {
            self.metrics.violation_recorded(&violation.kind.label());
        }
        self.metrics.entities_evaluated(1);

        let mut enqueued = 0;
        for request in notifications {
            match self.dispatcher.enqueue(request).await {
                DispatchOutcome::Accepted => enqueued += 1,
                DispatchOutcome::Rejected => {
                    self.metrics.notification_rejected();
                    warn!(
                        tenant_id = %entity.tenant_id,
                        entity_id = %entity.id,
                        "notification dispatcher rejected request"
                    );
                },
            }
        }

        Ok(Some(EntityOutcome {
            violations: violations.len(),
            notifications: enqueued,
        }))
    }
}
