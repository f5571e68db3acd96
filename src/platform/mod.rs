pub mod automate;

use crate::config::domains::Domain;
use crate::error::Result;
use crate::trigger::TriggerModule;
use alloy::primitives::B256;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// A live automation task as reported by the platform. The name embeds the
/// deployment identity hash, which is what makes reconciliation idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedTaskRecord {
    pub task_id: B256,
    pub name: String,
    pub domain: Domain,
}

/// Everything needed to create one task.
#[derive(Debug)]
pub struct CreateTaskRequest<'a> {
    pub domain: Domain,
    pub name: &'a str,
    pub code_address: &'a str,
    pub args: &'a serde_json::Value,
    pub trigger: &'a TriggerModule,
}

/// The vendor automation platform boundary. Task listing, creation,
/// cancellation and secret storage are opaque remote calls; creation and
/// cancellation are awaited to on-chain confirmation by implementations.
#[async_trait]
pub trait TaskPlatform: Send + Sync {
    async fn list_active_tasks(&self, domain: Domain) -> Result<Vec<DeployedTaskRecord>>;

    /// Create a task and return its identifier once confirmed.
    async fn create_task(&self, request: &CreateTaskRequest<'_>) -> Result<B256>;

    /// Store resolved secret values against an existing task. Issued
    /// separately from creation; a crash in between leaves a task without
    /// secrets (accepted inconsistency window).
    async fn set_task_secrets(
        &self,
        domain: Domain,
        task_id: B256,
        secrets: &BTreeMap<String, String>,
    ) -> Result<()>;

    async fn cancel_task(&self, task: &DeployedTaskRecord) -> Result<()>;
}
