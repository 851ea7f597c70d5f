//! In-memory store, dispatcher, and tenant directory.
//!
//! Backs the sweep tests and local daemon runs. The store keeps each
//! tenant's configuration, entities, and violation log under one mutex, so
//! `commit_evaluation` is atomic by construction: the entity update and the
//! appended violations land together or, with an injected failure, not at
//! all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use pacer_core::entity::TrackedEntity;
use pacer_core::violation::{NotificationRequest, Violation};

use super::{
    DispatchOutcome, EntityStore, NotificationDispatcher, PolicyConfig, StoreError,
    TenantDirectory,
};

#[derive(Debug, Default)]
struct TenantData {
    config: Option<PolicyConfig>,
    entities: HashMap<String, TrackedEntity>,
    violations: Vec<Violation>,
}

/// In-memory [`EntityStore`] + [`TenantDirectory`] with fault injection
/// hooks for exercising the sweep's failure paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tenants: Mutex<HashMap<String, TenantData>>,
    fail_next_commit: AtomicBool,
    fail_reads: AtomicBool,
}

impl InMemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces a tenant's SLA configuration.
    pub fn put_tenant(&self, tenant_id: &str, config: PolicyConfig) {
        let mut tenants = self.tenants.lock().expect("store mutex poisoned");
        tenants.entry(tenant_id.to_string()).or_default().config = Some(config);
    }

    /// Inserts or replaces an entity under its tenant.
    pub fn put_entity(&self, entity: TrackedEntity) {
        let mut tenants = self.tenants.lock().expect("store mutex poisoned");
        tenants
            .entry(entity.tenant_id.clone())
            .or_default()
            .entities
            .insert(entity.id.clone(), entity);
    }

    /// Snapshot of one entity's current state.
    #[must_use]
    pub fn entity(&self, tenant_id: &str, entity_id: &str) -> Option<TrackedEntity> {
        let tenants = self.tenants.lock().expect("store mutex poisoned");
        tenants
            .get(tenant_id)
            .and_then(|data| data.entities.get(entity_id))
            .cloned()
    }

    /// Snapshot of a tenant's violation log, in append order.
    #[must_use]
    pub fn violations(&self, tenant_id: &str) -> Vec<Violation> {
        let tenants = self.tenants.lock().expect("store mutex poisoned");
        tenants
            .get(tenant_id)
            .map(|data| data.violations.clone())
            .unwrap_or_default()
    }

    /// Makes the next `commit_evaluation` fail with a persistence error,
    /// leaving the store untouched.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Toggles failing every read with a transient error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::TransientRead {
                reason: "injected read failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn load_policy_config(&self, tenant_id: &str) -> Result<PolicyConfig, StoreError> {
        self.check_read()?;
        let tenants = self.tenants.lock().expect("store mutex poisoned");
        tenants
            .get(tenant_id)
            .and_then(|data| data.config.clone())
            .ok_or_else(|| StoreError::UnknownTenant {
                tenant_id: tenant_id.to_string(),
            })
    }

    async fn list_open_tracked(&self, tenant_id: &str) -> Result<Vec<TrackedEntity>, StoreError> {
        self.check_read()?;
        let tenants = self.tenants.lock().expect("store mutex poisoned");
        let Some(data) = tenants.get(tenant_id) else {
            return Err(StoreError::UnknownTenant {
                tenant_id: tenant_id.to_string(),
            });
        };
        let mut open: Vec<TrackedEntity> = data
            .entities
            .values()
            .filter(|entity| !entity.status.is_closed_class())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(open)
    }

    async fn load_entity(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Option<TrackedEntity>, StoreError> {
        self.check_read()?;
        Ok(self.entity(tenant_id, entity_id))
    }

    async fn commit_evaluation(
        &self,
        entity: &TrackedEntity,
        violations: &[Violation],
    ) -> Result<(), StoreError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Persistence {
                reason: "injected commit failure".to_string(),
            });
        }
        let mut tenants = self.tenants.lock().expect("store mutex poisoned");
        let Some(data) = tenants.get_mut(&entity.tenant_id) else {
            return Err(StoreError::UnknownTenant {
                tenant_id: entity.tenant_id.clone(),
            });
        };
        // Both mutations happen under the same lock: the atomic unit.
        data.entities.insert(entity.id.clone(), entity.clone());
        data.violations.extend_from_slice(violations);
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for InMemoryStore {
    async fn list_active_tenants(&self) -> Result<Vec<String>, StoreError> {
        self.check_read()?;
        let tenants = self.tenants.lock().expect("store mutex poisoned");
        let mut ids: Vec<String> = tenants.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Dispatcher that records every request, with optional blanket rejection.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<NotificationRequest>>,
    reject_all: AtomicBool,
}

impl RecordingDispatcher {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests enqueued so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().expect("dispatcher mutex poisoned").clone()
    }

    /// Toggles rejecting every request.
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn enqueue(&self, request: NotificationRequest) -> DispatchOutcome {
        if self.reject_all.load(Ordering::SeqCst) {
            return DispatchOutcome::Rejected;
        }
        self.sent
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(request);
        DispatchOutcome::Accepted
    }
}
