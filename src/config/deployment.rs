use crate::error::{ConfigError, Result};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One `{ "abi": ..., "event": ... }` pair inside an event trigger. The ABI
/// name refers to a JSON file under the configured ABI directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilterRef {
    pub abi: String,
    pub event: String,
}

/// Abstract trigger as written in deployment config files. Translated into
/// the vendor representation at deploy time and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    Block,
    Cron {
        expression: String,
    },
    Time {
        interval_ms: u64,
    },
    Event {
        address: Address,
        filters: Vec<EventFilterRef>,
        confirmations: u64,
    },
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Cron { .. } => "cron",
            Self::Time { .. } => "time",
            Self::Event { .. } => "event",
        }
    }
}

/// On-disk shape of a single deployment config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDeploymentConfig {
    pub domain: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    pub trigger: Trigger,
}

/// A parsed deployment config plus the raw bytes it was parsed from. The raw
/// bytes feed the identity hash, so the hash changes whenever the file does.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub label: String,
    pub raw: Vec<u8>,
    pub spec: RawDeploymentConfig,
}

/// A keeper type: its name, the content address of its published executable
/// logic, and every deployment config found for it.
#[derive(Debug, Clone)]
pub struct KeeperDefinition {
    pub name: String,
    pub code_address: String,
    pub configs: Vec<DeploymentConfig>,
}

/// Keeper name -> content address of the most recently published code.
/// Written by the publish pipeline, consumed read-only here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeDeploymentIndex(BTreeMap<String, String>);

impl CodeDeploymentIndex {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::MissingConfig(format!(
                "code deployment index `{}` unreadable: {e}",
                path.display()
            ))
        })?;
        let index = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "code deployment index `{}` is not a name -> address map: {e}",
                path.display()
            ))
        })?;
        Ok(index)
    }

    pub fn get(&self, keeper: &str) -> Option<&str> {
        self.0.get(keeper).map(String::as_str)
    }
}

/// Keeper name -> last successfully deployed content address. Read and
/// rewritten after each deployment in the all-in-one variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployedState(BTreeMap<String, String>);

impl DeployedState {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "deployed state `{}` is corrupt: {e}",
                    path.display()
                ))
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::InvalidConfig(format!(
                "deployed state `{}` unreadable: {e}",
                path.display()
            ))
            .into()),
        }
    }

    pub fn record(&mut self, keeper: &str, code_address: &str) {
        self.0.insert(keeper.to_string(), code_address.to_string());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).map_err(|e| {
            ConfigError::InvalidConfig(format!("deployed state serialization failed: {e}"))
        })?;
        std::fs::write(path, raw).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "deployed state `{}` not writable: {e}",
                path.display()
            ))
            .into()
        })
    }
}

/// Walk `<config_root>/<keeper>/<instance>.json` and pair each keeper
/// directory with its published code address. Keepers without a published
/// address are skipped; files that fail to parse are reported and skipped.
pub fn load_keeper_definitions(
    config_root: &Path,
    index: &CodeDeploymentIndex,
) -> Result<Vec<KeeperDefinition>> {
    let entries = std::fs::read_dir(config_root).map_err(|e| {
        ConfigError::MissingConfig(format!(
            "config root `{}` unreadable: {e}",
            config_root.display()
        ))
    })?;

    let mut keeper_dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "config root `{}` listing failed: {e}",
                config_root.display()
            ))
        })?;
        if entry.path().is_dir() {
            keeper_dirs.push(entry.path());
        }
    }
    keeper_dirs.sort();

    let mut definitions = Vec::new();
    for dir in keeper_dirs {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        let Some(code_address) = index.get(&name) else {
            tracing::debug!(
                "[DEPLOY] Keeper `{}` has configs but no published code address; skipping.",
                name
            );
            continue;
        };

        let mut config_files = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| {
            ConfigError::InvalidConfig(format!("keeper dir `{}` unreadable: {e}", dir.display()))
        })? {
            let entry = entry.map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "keeper dir `{}` listing failed: {e}",
                    dir.display()
                ))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                config_files.push(path);
            }
        }
        config_files.sort();

        let mut configs = Vec::new();
        for path in config_files {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("config")
                .to_string();
            let label = format!("{name}-{stem}");
            let raw = match std::fs::read(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        "[DEPLOY] Config `{}` unreadable, skipping: {}",
                        path.display(),
                        e
                    );
                    continue;
                }
            };
            match serde_json::from_slice::<RawDeploymentConfig>(&raw) {
                Ok(spec) => configs.push(DeploymentConfig { label, raw, spec }),
                Err(e) => {
                    tracing::warn!(
                        "[DEPLOY] Config `{}` failed to parse, skipping: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        definitions.push(KeeperDefinition {
            name,
            code_address: code_address.to_string(),
            configs,
        });
    }

    Ok(definitions)
}
