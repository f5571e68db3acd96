use crate::config::domains::{Domain, DomainConfig};
use crate::config::settings::Settings;
use crate::error::{ChainError, Result};
use crate::platform::{CreateTaskRequest, DeployedTaskRecord, TaskPlatform};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{address, Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{SolCall, SolEvent, SolValue};
use alloy::transports::http::Http;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

// Native-token sentinel used by the registry for fee accounting.
const NATIVE_FEE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;

alloy::sol! {
    #[derive(Debug)]
    enum Module {
        Resolver,
        DeprecatedTime,
        Proxy,
        SingleExec,
        Web3Function,
        Trigger
    }

    #[derive(Debug)]
    struct ModuleData {
        Module[] modules;
        bytes[] args;
    }

    function createTask(
        address execAddress,
        bytes execDataOrSelector,
        ModuleData moduleData,
        address feeToken
    ) external returns (bytes32 taskId);

    function cancelTask(bytes32 taskId) external;

    event TaskCreated(
        address indexed taskCreator,
        address indexed execAddress,
        bytes execDataOrSelector,
        ModuleData moduleData,
        address feeToken,
        bytes32 indexed taskId
    );
}

fn load_api_timeout_ms() -> u64 {
    std::env::var("VENDOR_API_TIMEOUT_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(|v| v.clamp(250, 60_000))
        .unwrap_or(DEFAULT_API_TIMEOUT_MS)
}

#[derive(Debug, Deserialize)]
struct ApiTaskEntry {
    #[serde(rename = "taskId")]
    task_id: B256,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiTaskList {
    tasks: Vec<ApiTaskEntry>,
}

/// Production platform client: task creation and cancellation go through the
/// on-chain automation registry and are awaited to confirmation; task names
/// and secrets live behind the vendor HTTP API.
pub struct AutomateClient {
    providers: HashMap<Domain, RootProvider<Http<Client>>>,
    signer: PrivateKeySigner,
    api_url: String,
    http: Client,
}

impl AutomateClient {
    pub fn new(settings: &Settings, signer: PrivateKeySigner) -> Result<Self> {
        let mut providers = HashMap::new();
        for (domain, url) in &settings.rpc_urls {
            let parsed = url.parse().map_err(|e| ChainError::InvalidUrl {
                url: url.clone(),
                reason: format!("{e}"),
            })?;
            providers.insert(*domain, ProviderBuilder::new().on_http(parsed));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(load_api_timeout_ms()))
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self {
            providers,
            signer,
            api_url: settings.task_api_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    fn provider(&self, domain: Domain) -> Result<&RootProvider<Http<Client>>> {
        self.providers.get(&domain).ok_or_else(|| {
            ChainError::Transport(format!("no provider configured for {domain}")).into()
        })
    }

    /// Probe connectivity by fetching the latest block number per domain.
    pub async fn probe_connectivity(&self) -> Result<Vec<(Domain, u64)>> {
        let mut heads = Vec::new();
        for (domain, provider) in &self.providers {
            let head = provider
                .get_block_number()
                .await
                .map_err(|e| ChainError::Transport(format!("{domain}: {e}")))?;
            heads.push((*domain, head));
        }
        Ok(heads)
    }

    async fn send_contract_call(
        &self,
        domain: Domain,
        to: Address,
        calldata: Vec<u8>,
        context: &str,
    ) -> Result<alloy::rpc::types::TransactionReceipt> {
        let provider = self.provider(domain)?;
        let chain = DomainConfig::get(domain);

        let nonce = provider
            .get_transaction_count(self.signer.address())
            .await
            .map_err(|e| ChainError::Transaction {
                context: context.to_string(),
                reason: format!("nonce fetch failed: {e}"),
            })?;
        let gas_price = provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::Transaction {
                context: context.to_string(),
                reason: format!("fee estimate failed: {e}"),
            })?;
        // Double headroom over the current quote; the node refunds the
        // difference under EIP-1559.
        let tip = (gas_price / 10).max(1);
        let max_fee = gas_price.saturating_mul(2);

        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_chain_id(chain.chain_id)
            .with_nonce(nonce)
            .with_max_priority_fee_per_gas(tip)
            .with_max_fee_per_gas(max_fee);
        tx.from = Some(self.signer.address());

        let gas = provider
            .estimate_gas(&tx)
            .await
            .map_err(|e| ChainError::Transaction {
                context: context.to_string(),
                reason: format!("gas estimate failed: {e}"),
            })?;
        tx = tx.with_gas_limit(gas);

        let wallet = EthereumWallet::from(self.signer.clone());
        let signed = tx.build(&wallet).await.map_err(|e| ChainError::Transaction {
            context: context.to_string(),
            reason: format!("signing failed: {e}"),
        })?;

        let receipt = provider
            .send_raw_transaction(&signed.encoded_2718())
            .await
            .map_err(|e| ChainError::Transaction {
                context: context.to_string(),
                reason: format!("submission failed: {e}"),
            })?
            .get_receipt()
            .await
            .map_err(|e| ChainError::Transaction {
                context: context.to_string(),
                reason: format!("confirmation wait failed: {e}"),
            })?;

        if !receipt.status() {
            return Err(ChainError::Transaction {
                context: context.to_string(),
                reason: format!("reverted in tx {:#x}", receipt.transaction_hash),
            }
            .into());
        }
        Ok(receipt)
    }

    async fn register_task_name(&self, domain: Domain, task_id: B256, name: &str) -> Result<()> {
        let chain_id = DomainConfig::get(domain).chain_id;
        let url = format!("{}/tasks/{chain_id}/{task_id:#x}", self.api_url);
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| ChainError::VendorApi(format!("task name registration: {e}")))?;
        if !response.status().is_success() {
            return Err(ChainError::VendorApi(format!(
                "task name registration returned {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl TaskPlatform for AutomateClient {
    async fn list_active_tasks(&self, domain: Domain) -> Result<Vec<DeployedTaskRecord>> {
        let chain_id = DomainConfig::get(domain).chain_id;
        let url = format!(
            "{}/tasks/{chain_id}/{:#x}",
            self.api_url,
            self.signer.address()
        );
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ChainError::VendorApi(format!("task listing: {e}")))?;
        if !response.status().is_success() {
            return Err(
                ChainError::VendorApi(format!("task listing returned {}", response.status()))
                    .into(),
            );
        }
        let listing: ApiTaskList = response
            .json()
            .await
            .map_err(|e| ChainError::VendorApi(format!("task listing decode: {e}")))?;
        Ok(listing
            .tasks
            .into_iter()
            .map(|entry| DeployedTaskRecord {
                task_id: entry.task_id,
                name: entry.name,
                domain,
            })
            .collect())
    }

    async fn create_task(&self, request: &CreateTaskRequest<'_>) -> Result<B256> {
        let chain = DomainConfig::get(request.domain);

        let args_json = serde_json::to_vec(request.args).map_err(|e| {
            ChainError::Transaction {
                context: format!("create `{}`", request.name),
                reason: format!("args serialization failed: {e}"),
            }
        })?;
        let w3f_arg = (request.code_address.to_string(), Bytes::from(args_json))
            .abi_encode_params();
        let module_data = ModuleData {
            modules: vec![Module::Proxy, Module::Web3Function, Module::Trigger],
            args: vec![
                Bytes::new(),
                Bytes::from(w3f_arg),
                request.trigger.encode_module_arg(),
            ],
        };
        // The registry treats exec data as opaque for proxied executable
        // tasks; a code-address commitment keeps it deterministic.
        let exec_commitment = alloy::primitives::keccak256(request.code_address.as_bytes());
        let calldata = createTaskCall {
            execAddress: self.signer.address(),
            execDataOrSelector: Bytes::copy_from_slice(&exec_commitment[..4]),
            moduleData: module_data,
            feeToken: NATIVE_FEE_TOKEN,
        }
        .abi_encode();

        let receipt = self
            .send_contract_call(
                request.domain,
                chain.automate,
                calldata,
                &format!("create `{}`", request.name),
            )
            .await?;

        let task_id = receipt
            .inner
            .logs()
            .iter()
            .find(|log| log.topic0() == Some(&TaskCreated::SIGNATURE_HASH))
            .and_then(|log| log.data().topics().get(3).copied())
            .ok_or_else(|| ChainError::Transaction {
                context: format!("create `{}`", request.name),
                reason: "no TaskCreated event in receipt".to_string(),
            })?;

        self.register_task_name(request.domain, task_id, request.name)
            .await?;
        Ok(task_id)
    }

    async fn set_task_secrets(
        &self,
        domain: Domain,
        task_id: B256,
        secrets: &BTreeMap<String, String>,
    ) -> Result<()> {
        let chain_id = DomainConfig::get(domain).chain_id;
        let url = format!("{}/secrets/{chain_id}/{task_id:#x}", self.api_url);
        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "secrets": secrets }))
            .send()
            .await
            .map_err(|e| ChainError::VendorApi(format!("secret storage: {e}")))?;
        if !response.status().is_success() {
            return Err(ChainError::VendorApi(format!(
                "secret storage returned {}",
                response.status()
            ))
            .into());
        }
        Ok(())
    }

    async fn cancel_task(&self, task: &DeployedTaskRecord) -> Result<()> {
        let chain = DomainConfig::get(task.domain);
        let calldata = cancelTaskCall {
            taskId: task.task_id,
        }
        .abi_encode();
        self.send_contract_call(
            task.domain,
            chain.automate,
            calldata,
            &format!("cancel `{}`", task.name),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{cancelTaskCall, createTaskCall, load_api_timeout_ms, ApiTaskList};
    use alloy::sol_types::SolCall;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn api_timeout_clamps_and_defaults() {
        let _guard = env_lock().lock().expect("env lock");
        std::env::remove_var("VENDOR_API_TIMEOUT_MS");
        assert_eq!(load_api_timeout_ms(), 10_000);
        std::env::set_var("VENDOR_API_TIMEOUT_MS", "50");
        assert_eq!(load_api_timeout_ms(), 250);
        std::env::set_var("VENDOR_API_TIMEOUT_MS", "nonsense");
        assert_eq!(load_api_timeout_ms(), 10_000);
        std::env::remove_var("VENDOR_API_TIMEOUT_MS");
    }

    #[test]
    fn task_listing_payload_decodes() {
        let raw = r#"{"tasks":[{"taskId":
            "0x1111111111111111111111111111111111111111111111111111111111111111",
            "name":"rate-freshness-mainnet abc123"}]}"#;
        let listing: ApiTaskList = serde_json::from_str(raw).expect("decode");
        assert_eq!(listing.tasks.len(), 1);
        assert_eq!(listing.tasks[0].name, "rate-freshness-mainnet abc123");
    }

    #[test]
    fn registry_selectors_are_distinct() {
        assert_ne!(createTaskCall::SELECTOR, cancelTaskCall::SELECTOR);
    }
}
