use crate::config::deployment::Trigger;
use crate::error::{ConfigError, Result};
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use std::path::Path;

// Vendor trigger type discriminants, in registry declaration order.
const TRIGGER_TYPE_TIME: u128 = 0;
const TRIGGER_TYPE_CRON: u128 = 1;
const TRIGGER_TYPE_EVENT: u128 = 2;
const TRIGGER_TYPE_BLOCK: u128 = 3;

/// Vendor-facing trigger payload. Event filters arrive here with their topic
/// hashes already resolved; nothing downstream touches ABI files.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerModule {
    Block,
    Cron(String),
    Time { interval_ms: u64 },
    Event {
        address: Address,
        topics: Vec<B256>,
        confirmations: u64,
    },
}

impl TriggerModule {
    /// ABI-encode as the registry's `(uint128 triggerType, bytes config)`
    /// module argument.
    pub fn encode_module_arg(&self) -> Bytes {
        let (type_id, config): (u128, Vec<u8>) = match self {
            Self::Block => (TRIGGER_TYPE_BLOCK, Vec::new()),
            Self::Cron(expression) => (TRIGGER_TYPE_CRON, expression.abi_encode()),
            // (uint128 start, uint128 interval); start 0 means "from now".
            Self::Time { interval_ms } => (
                TRIGGER_TYPE_TIME,
                (0u128, *interval_ms as u128).abi_encode_params(),
            ),
            // All resolved topics form one OR-filter on topic0.
            Self::Event {
                address,
                topics,
                confirmations,
            } => (
                TRIGGER_TYPE_EVENT,
                (
                    *address,
                    vec![topics.clone()],
                    U256::from(*confirmations),
                )
                    .abi_encode_params(),
            ),
        };
        Bytes::from((type_id, Bytes::from(config)).abi_encode_params())
    }
}

/// Topic hash of a named event, looked up in `<abi_dir>/<abi>.json`.
pub fn resolve_event_topic(abi_dir: &Path, abi_name: &str, event_name: &str) -> Result<B256> {
    let path = abi_dir.join(format!("{abi_name}.json"));
    let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::AbiLookup {
        abi: abi_name.to_string(),
        reason: format!("{}: {e}", path.display()),
    })?;
    let abi: JsonAbi = serde_json::from_str(&raw).map_err(|e| ConfigError::AbiLookup {
        abi: abi_name.to_string(),
        reason: format!("{}: {e}", path.display()),
    })?;
    let event = abi
        .events
        .get(event_name)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| ConfigError::EventLookup {
            abi: abi_name.to_string(),
            event: event_name.to_string(),
        })?;
    Ok(event.selector())
}

/// Map an abstract trigger to its vendor payload. Cron expressions and time
/// intervals pass through unvalidated; the vendor platform rejects bad ones.
pub fn translate(trigger: &Trigger, abi_dir: &Path) -> Result<TriggerModule> {
    match trigger {
        Trigger::Block => Ok(TriggerModule::Block),
        Trigger::Cron { expression } => Ok(TriggerModule::Cron(expression.clone())),
        Trigger::Time { interval_ms } => Ok(TriggerModule::Time {
            interval_ms: *interval_ms,
        }),
        Trigger::Event {
            address,
            filters,
            confirmations,
        } => {
            let mut topics = Vec::with_capacity(filters.len());
            for filter in filters {
                topics.push(resolve_event_topic(abi_dir, &filter.abi, &filter.event)?);
            }
            Ok(TriggerModule::Event {
                address: *address,
                topics,
                confirmations: *confirmations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_event_topic, translate, TriggerModule};
    use crate::config::deployment::{EventFilterRef, Trigger};
    use crate::error::{ConfigError, FleetError};
    use alloy::primitives::{address, keccak256};

    const ANSWER_FEED_ABI: &str = r#"[
        {
            "type": "event",
            "name": "AnswerUpdated",
            "inputs": [
                {"name": "current", "type": "int256", "indexed": true},
                {"name": "roundId", "type": "uint256", "indexed": true},
                {"name": "updatedAt", "type": "uint256", "indexed": false}
            ],
            "anonymous": false
        }
    ]"#;

    #[test]
    fn event_topic_matches_canonical_signature_hash() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("AnswerFeed.json"), ANSWER_FEED_ABI).expect("write abi");

        let topic = resolve_event_topic(tmp.path(), "AnswerFeed", "AnswerUpdated").expect("topic");
        assert_eq!(topic, keccak256("AnswerUpdated(int256,uint256,uint256)"));
    }

    #[test]
    fn missing_abi_file_is_a_lookup_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = resolve_event_topic(tmp.path(), "Nowhere", "AnswerUpdated")
            .expect_err("lookup should fail");
        assert!(matches!(
            err,
            FleetError::Config(ConfigError::AbiLookup { .. })
        ));
    }

    #[test]
    fn missing_event_name_is_a_lookup_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("AnswerFeed.json"), ANSWER_FEED_ABI).expect("write abi");

        let err = resolve_event_topic(tmp.path(), "AnswerFeed", "RoundClosed")
            .expect_err("lookup should fail");
        assert!(matches!(
            err,
            FleetError::Config(ConfigError::EventLookup { .. })
        ));
    }

    #[test]
    fn translate_resolves_event_filters_into_one_or_group() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("AnswerFeed.json"), ANSWER_FEED_ABI).expect("write abi");

        let trigger = Trigger::Event {
            address: address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"),
            filters: vec![EventFilterRef {
                abi: "AnswerFeed".to_string(),
                event: "AnswerUpdated".to_string(),
            }],
            confirmations: 2,
        };
        let module = translate(&trigger, tmp.path()).expect("translate");
        match module {
            TriggerModule::Event {
                topics,
                confirmations,
                ..
            } => {
                assert_eq!(topics.len(), 1);
                assert_eq!(confirmations, 2);
            }
            other => panic!("expected event module, got {other:?}"),
        }
    }

    #[test]
    fn zero_interval_passes_through_untouched() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let module = translate(&Trigger::Time { interval_ms: 0 }, tmp.path()).expect("translate");
        assert_eq!(module, TriggerModule::Time { interval_ms: 0 });
        assert!(!module.encode_module_arg().is_empty());
    }

    #[test]
    fn module_args_differ_by_trigger_kind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let block = translate(&Trigger::Block, tmp.path()).expect("block");
        let cron = translate(
            &Trigger::Cron {
                expression: "*/5 * * * *".to_string(),
            },
            tmp.path(),
        )
        .expect("cron");
        assert_ne!(block.encode_module_arg(), cron.encode_module_arg());
    }
}
