use crate::config::deployment::{
    load_keeper_definitions, CodeDeploymentIndex, DeployedState, DeploymentConfig,
    KeeperDefinition,
};
use crate::config::domains::{Domain, SUPPORTED_DOMAINS};
use crate::config::settings::Settings;
use crate::error::{ConfigError, Result, SecretError};
use crate::platform::{CreateTaskRequest, DeployedTaskRecord, TaskPlatform};
use crate::trigger;
use alloy::primitives::keccak256;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

/// Gate before each state-changing action. The interactive variant blocks on
/// stdin; tests and unattended runs use [`AutoConfirm`].
pub trait Confirmer {
    fn confirm(&self, action: &str) -> bool;
}

pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, _action: &str) -> bool {
        true
    }
}

/// "Press enter to continue" on the controlling terminal. Any input starting
/// with `n`/`N` declines the action.
pub struct StdinConfirm;

impl Confirmer for StdinConfirm {
    fn confirm(&self, action: &str) -> bool {
        eprintln!("About to {action}. Press enter to continue, or n to skip.");
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => !line.trim_start().to_ascii_lowercase().starts_with('n'),
            Err(_) => false,
        }
    }
}

/// Deterministic task name: the config label plus a digest of the raw config
/// bytes and the code content address. Any byte change to either produces a
/// new name, which is what drives cancel-and-recreate.
pub fn task_identity_name(label: &str, raw_config: &[u8], code_address: &str) -> String {
    let mut material = Vec::with_capacity(raw_config.len() + 32);
    material.extend_from_slice(raw_config);
    material.extend_from_slice(keccak256(code_address.as_bytes()).as_slice());
    format!("{label} {}", hex::encode(keccak256(&material)))
}

/// Map secret keys to values via their named environment variables. Any
/// unset variable fails the whole config before a transaction is attempted.
pub fn resolve_secrets(secrets: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
    let mut resolved = BTreeMap::new();
    for (key, var) in secrets {
        let value = std::env::var(var).map_err(|_| SecretError::MissingEnv {
            key: key.clone(),
            var: var.clone(),
        })?;
        resolved.insert(key.clone(), value);
    }
    Ok(resolved)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub kept: usize,
    pub cancelled: usize,
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn line(&self) -> String {
        format!(
            "reconcile complete: created={} kept={} cancelled={} skipped={}",
            self.created, self.kept, self.cancelled, self.skipped
        )
    }
}

enum DeployOutcome {
    Kept,
    Created,
    Declined,
}

async fn deploy_config(
    settings: &Settings,
    platform: &dyn TaskPlatform,
    confirmer: &dyn Confirmer,
    definition: &KeeperDefinition,
    config: &DeploymentConfig,
    old_tasks: &mut HashMap<String, DeployedTaskRecord>,
) -> Result<DeployOutcome> {
    let domain = Domain::parse(&config.spec.domain)
        .ok_or_else(|| ConfigError::UnsupportedDomain(config.spec.domain.clone()))?;

    let name = task_identity_name(&config.label, &config.raw, &definition.code_address);
    if old_tasks.remove(&name).is_some() {
        tracing::debug!("[DEPLOY] `{}` already deployed and unchanged.", name);
        return Ok(DeployOutcome::Kept);
    }

    let secrets = resolve_secrets(&config.spec.secrets)?;
    let module = trigger::translate(&config.spec.trigger, &settings.abi_dir)?;

    if !confirmer.confirm(&format!("create task `{name}` on {domain}")) {
        tracing::info!("[DEPLOY] Creation of `{}` declined by operator.", name);
        return Ok(DeployOutcome::Declined);
    }

    let task_id = platform
        .create_task(&CreateTaskRequest {
            domain,
            name: &name,
            code_address: &definition.code_address,
            args: &config.spec.args,
            trigger: &module,
        })
        .await?;
    tracing::info!("[DEPLOY] Created `{}` as task {:#x}.", name, task_id);

    if !secrets.is_empty() {
        platform.set_task_secrets(domain, task_id, &secrets).await?;
        tracing::info!(
            "[DEPLOY] Stored {} secret(s) for task {:#x}.",
            secrets.len(),
            task_id
        );
    }
    Ok(DeployOutcome::Created)
}

/// Bring the on-chain task set into agreement with local configuration.
///
/// Listing happens for every supported domain before any creation. A task
/// whose identity name matches a local config is left alone; unmatched local
/// configs are created (then given their secrets in a separate call); active
/// tasks matched by no local config are cancelled at the end. All
/// state-changing calls are sequential and individually awaited.
pub async fn reconcile(
    settings: &Settings,
    platform: &dyn TaskPlatform,
    confirmer: &dyn Confirmer,
) -> Result<ReconcileSummary> {
    let index = CodeDeploymentIndex::load(&settings.code_index_path)?;
    let definitions = load_keeper_definitions(&settings.config_root, &index)?;

    let mut old_tasks: HashMap<String, DeployedTaskRecord> = HashMap::new();
    for domain in SUPPORTED_DOMAINS {
        for task in platform.list_active_tasks(domain).await? {
            old_tasks.insert(task.name.clone(), task);
        }
    }
    tracing::info!(
        "[DEPLOY] {} active task(s) across {} domain(s); {} keeper type(s) configured.",
        old_tasks.len(),
        SUPPORTED_DOMAINS.len(),
        definitions.len()
    );

    let mut deployed_state = match settings.deployed_state_path.as_deref() {
        Some(path) => Some((path, DeployedState::load_or_default(path)?)),
        None => None,
    };

    let mut summary = ReconcileSummary::default();
    for definition in &definitions {
        let mut keeper_created = false;
        for config in &definition.configs {
            match deploy_config(
                settings,
                platform,
                confirmer,
                definition,
                config,
                &mut old_tasks,
            )
            .await
            {
                Ok(DeployOutcome::Kept) => summary.kept += 1,
                Ok(DeployOutcome::Created) => {
                    summary.created += 1;
                    keeper_created = true;
                }
                Ok(DeployOutcome::Declined) => summary.skipped += 1,
                Err(e) if e.is_config_scoped() => {
                    tracing::warn!("[DEPLOY] Skipping `{}`: {}", config.label, e);
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if keeper_created {
            if let Some((path, state)) = deployed_state.as_mut() {
                state.record(&definition.name, &definition.code_address);
                state.write(path)?;
            }
        }
    }

    // Everything still in the working set has no matching local config.
    let mut leftovers: Vec<DeployedTaskRecord> = old_tasks.into_values().collect();
    leftovers.sort_by(|a, b| a.name.cmp(&b.name));
    for task in leftovers {
        if !confirmer.confirm(&format!("cancel task `{}` on {}", task.name, task.domain)) {
            tracing::info!("[DEPLOY] Cancellation of `{}` declined by operator.", task.name);
            summary.skipped += 1;
            continue;
        }
        platform.cancel_task(&task).await?;
        tracing::info!("[DEPLOY] Cancelled stale task `{}`.", task.name);
        summary.cancelled += 1;
    }

    tracing::info!("[DEPLOY] {}", summary.line());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{resolve_secrets, task_identity_name, AutoConfirm, Confirmer};
    use crate::error::{FleetError, SecretError};
    use std::collections::BTreeMap;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn identity_name_is_deterministic() {
        let a = task_identity_name("rate-freshness-mainnet", b"{\"domain\":\"mainnet\"}", "bafy1");
        let b = task_identity_name("rate-freshness-mainnet", b"{\"domain\":\"mainnet\"}", "bafy1");
        assert_eq!(a, b);
        assert!(a.starts_with("rate-freshness-mainnet "));
    }

    #[test]
    fn identity_name_changes_with_any_config_byte() {
        let base = task_identity_name("k", b"{\"max_age\":600}", "bafy1");
        let tweaked = task_identity_name("k", b"{\"max_age\":601}", "bafy1");
        assert_ne!(base, tweaked);
    }

    #[test]
    fn identity_name_changes_with_code_address() {
        let base = task_identity_name("k", b"{}", "bafy1");
        let republished = task_identity_name("k", b"{}", "bafy2");
        assert_ne!(base, republished);
    }

    #[test]
    fn secrets_resolve_through_named_env_vars() {
        let _guard = env_lock().lock().expect("env lock");
        std::env::set_var("RECONCILER_TEST_API_KEY", "s3cret");
        let mut wanted = BTreeMap::new();
        wanted.insert("apiKey".to_string(), "RECONCILER_TEST_API_KEY".to_string());

        let resolved = resolve_secrets(&wanted).expect("resolve");
        assert_eq!(resolved.get("apiKey").map(String::as_str), Some("s3cret"));
        std::env::remove_var("RECONCILER_TEST_API_KEY");
    }

    #[test]
    fn unset_secret_env_var_fails_with_both_names() {
        let _guard = env_lock().lock().expect("env lock");
        std::env::remove_var("RECONCILER_TEST_UNSET_VAR");
        let mut wanted = BTreeMap::new();
        wanted.insert("apiKey".to_string(), "RECONCILER_TEST_UNSET_VAR".to_string());

        let err = resolve_secrets(&wanted).expect_err("should fail");
        assert!(matches!(
            err,
            FleetError::Secret(SecretError::MissingEnv { .. })
        ));
        let message = err.to_string();
        assert!(message.contains("apiKey"));
        assert!(message.contains("RECONCILER_TEST_UNSET_VAR"));
    }

    #[test]
    fn auto_confirm_always_approves() {
        assert!(AutoConfirm.confirm("create task `x` on mainnet"));
    }
}
