//! Data-freshness keeper: compares the reference rate against every
//! downstream consumer and proposes one refresh call per stale consumer.
//! Reads are batched through multicall3; the decision itself is pure.

use crate::config::domains::{Domain, DomainConfig};
use crate::config::settings::Settings;
use crate::error::{ChainError, ConfigError, Result};
use crate::keepers::{Decision, ProposedCall};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol_types::SolCall;
use serde::Deserialize;
use std::collections::HashMap;

alloy::sol! {
    struct Multicall3Call {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Multicall3Result {
        bool success;
        bytes returnData;
    }

    function aggregate3(Multicall3Call[] calldata calls)
        external
        payable
        returns (Multicall3Result[] memory returnData);

    function getRate() external view returns (uint256);
    function lastRate() external view returns (uint256);
    function lastUpdated() external view returns (uint256);

    function refresh(uint256 maxGas) external payable;
    function refreshWithFees(
        uint256 maxGas,
        uint256 sourceFeeWei,
        uint256 destinationFeeWei
    ) external payable;
}

fn default_gas_limit() -> u64 {
    300_000
}

/// How a consumer receives its refresh. Direct consumers take only a gas
/// limit; bridged ones also carry fee quotes from both sides of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum Transport {
    Direct,
    Bridged { destination: String },
}

impl Default for Transport {
    fn default() -> Self {
        Self::Direct
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerSpec {
    pub address: Address,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

/// Free-form `args` object of a rate-freshness deployment config.
#[derive(Debug, Clone, Deserialize)]
pub struct FreshnessParams {
    pub rate_source: Address,
    pub consumers: Vec<ConsumerSpec>,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerState {
    pub last_rate: U256,
    pub last_updated: u64,
}

/// Snapshot of every on-chain read the decision depends on. Assembled once
/// per invocation; `decide` never touches the network.
#[derive(Debug, Clone)]
pub struct ChainView {
    pub current_rate: U256,
    pub block_timestamp: u64,
    pub consumers: Vec<ConsumerState>,
    pub source_gas_price_wei: u128,
    pub destination_gas_price_wei: HashMap<String, u128>,
}

fn is_stale(current_rate: U256, now: u64, max_age_secs: u64, state: &ConsumerState) -> bool {
    state.last_rate != current_rate || now.saturating_sub(state.last_updated) > max_age_secs
}

/// Pure decision over a chain snapshot: no action when every consumer holds
/// the current rate within the allowed age, otherwise one proposed call per
/// stale consumer.
pub fn decide(params: &FreshnessParams, view: &ChainView) -> Result<Decision> {
    let mut calls = Vec::new();
    let mut refreshed = Vec::new();

    for (spec, state) in params.consumers.iter().zip(view.consumers.iter()) {
        if !is_stale(view.current_rate, view.block_timestamp, params.max_age_secs, state) {
            continue;
        }
        let call_data: Bytes = match &spec.transport {
            Transport::Direct => refreshCall {
                maxGas: U256::from(spec.gas_limit),
            }
            .abi_encode()
            .into(),
            Transport::Bridged { destination } => {
                let destination_fee = view
                    .destination_gas_price_wei
                    .get(destination)
                    .copied()
                    .ok_or_else(|| {
                        ChainError::Transport(format!(
                            "no fee quote for destination `{destination}`"
                        ))
                    })?;
                refreshWithFeesCall {
                    maxGas: U256::from(spec.gas_limit),
                    sourceFeeWei: U256::from(view.source_gas_price_wei),
                    destinationFeeWei: U256::from(destination_fee),
                }
                .abi_encode()
                .into()
            }
        };
        calls.push(ProposedCall {
            target: spec.address,
            call_data,
            gas_limit: spec.gas_limit,
            value: U256::ZERO,
        });
        refreshed.push(format!("{:#x}", spec.address));
    }

    if calls.is_empty() {
        return Ok(Decision::NoAction {
            reason: format!(
                "all {} consumer(s) hold rate {} within {}s",
                params.consumers.len(),
                view.current_rate,
                params.max_age_secs
            ),
        });
    }
    Ok(Decision::Execute {
        note: Some(format!(
            "refreshing {} consumer(s): {}",
            refreshed.len(),
            refreshed.join(", ")
        )),
        calls,
    })
}

fn decode_u256_word(raw: &[u8]) -> Result<U256> {
    if raw.len() < 32 {
        return Err(ChainError::Transport(format!(
            "short return word: {} bytes",
            raw.len()
        ))
        .into());
    }
    let mut word = [0u8; 32];
    word.copy_from_slice(&raw[0..32]);
    Ok(U256::from_be_bytes(word))
}

async fn fetch_chain_view(
    settings: &Settings,
    domain: Domain,
    params: &FreshnessParams,
) -> Result<ChainView> {
    let chain = DomainConfig::get(domain);
    let rpc_url = settings.rpc_url(domain)?;
    let provider = ProviderBuilder::new().on_http(rpc_url.parse().map_err(|e| {
        ChainError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: format!("{e}"),
        }
    })?);

    // One multicall covers the reference rate plus both reads per consumer.
    let mut calls = vec![Multicall3Call {
        target: params.rate_source,
        allowFailure: false,
        callData: getRateCall {}.abi_encode().into(),
    }];
    for spec in &params.consumers {
        calls.push(Multicall3Call {
            target: spec.address,
            allowFailure: false,
            callData: lastRateCall {}.abi_encode().into(),
        });
        calls.push(Multicall3Call {
            target: spec.address,
            allowFailure: false,
            callData: lastUpdatedCall {}.abi_encode().into(),
        });
    }
    let req = alloy::rpc::types::TransactionRequest::default()
        .to(chain.multicall3)
        .input(alloy::rpc::types::TransactionInput::new(
            aggregate3Call { calls }.abi_encode().into(),
        ));
    let raw = provider
        .call(&req)
        .await
        .map_err(|e| ChainError::Transport(format!("multicall failed: {e}")))?;
    let decoded = <aggregate3Call as SolCall>::abi_decode_returns(raw.as_ref(), true)
        .map_err(|e| ChainError::Transport(format!("multicall decode failed: {e}")))?;
    let mut results = decoded.returnData.into_iter();

    let mut next_word = |context: &str| -> Result<U256> {
        let result = results
            .next()
            .ok_or_else(|| ChainError::Transport(format!("{context}: missing result")))?;
        if !result.success {
            return Err(ChainError::Transport(format!("{context}: call reverted")).into());
        }
        decode_u256_word(result.returnData.as_ref())
    };

    let current_rate = next_word("reference rate")?;
    let mut consumers = Vec::with_capacity(params.consumers.len());
    for spec in &params.consumers {
        let last_rate = next_word(&format!("consumer {:#x} lastRate", spec.address))?;
        let last_updated = next_word(&format!("consumer {:#x} lastUpdated", spec.address))?;
        consumers.push(ConsumerState {
            last_rate,
            last_updated: last_updated.saturating_to::<u64>(),
        });
    }

    let block = provider
        .get_block_by_number(
            alloy::rpc::types::BlockNumberOrTag::Latest,
            alloy::rpc::types::BlockTransactionsKind::Hashes,
        )
        .await
        .map_err(|e| ChainError::Transport(format!("head fetch failed: {e}")))?
        .ok_or_else(|| ChainError::Transport("no latest block".to_string()))?;
    let block_timestamp = block.header.timestamp;

    let source_gas_price_wei = provider
        .get_gas_price()
        .await
        .map_err(|e| ChainError::Transport(format!("gas price fetch failed: {e}")))?;

    let mut destination_gas_price_wei = HashMap::new();
    for spec in &params.consumers {
        let Transport::Bridged { destination } = &spec.transport else {
            continue;
        };
        if destination_gas_price_wei.contains_key(destination) {
            continue;
        }
        let dest_domain = Domain::parse(destination)
            .ok_or_else(|| ConfigError::UnsupportedDomain(destination.clone()))?;
        let dest_url = settings.rpc_url(dest_domain)?;
        let dest_provider =
            ProviderBuilder::new().on_http(dest_url.parse().map_err(|e| {
                ChainError::InvalidUrl {
                    url: dest_url.to_string(),
                    reason: format!("{e}"),
                }
            })?);
        let quote = dest_provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Transport(format!("{destination} gas price: {e}")))?;
        destination_gas_price_wei.insert(destination.clone(), quote);
    }

    Ok(ChainView {
        current_rate,
        block_timestamp,
        consumers,
        source_gas_price_wei,
        destination_gas_price_wei,
    })
}

/// Entry point used by the keeper runner: read fresh state, then decide.
pub async fn run(settings: &Settings, domain: Domain, args: &serde_json::Value) -> Result<Decision> {
    let params: FreshnessParams = serde_json::from_value(args.clone()).map_err(|e| {
        ConfigError::InvalidConfig(format!("rate-freshness args rejected: {e}"))
    })?;
    let view = fetch_chain_view(settings, domain, &params).await?;
    decide(&params, &view)
}
