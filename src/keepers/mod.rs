pub mod rate_freshness;

use crate::config::domains::Domain;
use crate::config::settings::Settings;
use crate::error::{ConfigError, Result};
use alloy::primitives::{Address, Bytes, U256};

/// One call the automation platform should execute on our behalf. Decision
/// logic only proposes; execution happens in the vendor runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedCall {
    pub target: Address,
    pub call_data: Bytes,
    pub gas_limit: u64,
    pub value: U256,
}

/// Outcome of one keeper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoAction {
        reason: String,
    },
    Execute {
        calls: Vec<ProposedCall>,
        note: Option<String>,
    },
}

/// Dispatch a keeper by its registered name. The name doubles as the config
/// directory name under the config root.
pub async fn run_keeper(
    name: &str,
    settings: &Settings,
    domain: Domain,
    args: &serde_json::Value,
) -> Result<Decision> {
    match name {
        "rate-freshness" => rate_freshness::run(settings, domain, args).await,
        other => {
            Err(ConfigError::InvalidConfig(format!("unknown keeper `{other}`")).into())
        }
    }
}
