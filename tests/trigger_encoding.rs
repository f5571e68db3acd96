//! Trigger translation from config JSON through to encoded module args.

use keeper_fleet::config::deployment::Trigger;
use keeper_fleet::trigger::{self, TriggerModule};
use alloy::primitives::keccak256;
use std::path::Path;

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
    },
    {
        "type": "event",
        "name": "NewRound",
        "inputs": [
            {"name": "roundId", "type": "uint256", "indexed": true},
            {"name": "startedBy", "type": "address", "indexed": true}
        ],
        "anonymous": false
    }
]"#;

fn write_abi(dir: &Path) {
    std::fs::write(dir.join("AnswerFeed.json"), ANSWER_FEED_ABI).expect("write abi");
}

#[test]
fn event_trigger_from_config_json_resolves_canonical_topics() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_abi(tmp.path());

    let trigger: Trigger = serde_json::from_str(
        r#"{"type":"event","address":"0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419",
            "filters":[
                {"abi":"AnswerFeed","event":"AnswerUpdated"},
                {"abi":"AnswerFeed","event":"NewRound"}
            ],
            "confirmations":3}"#,
    )
    .expect("trigger json");

    let module = trigger::translate(&trigger, tmp.path()).expect("translate");
    let TriggerModule::Event {
        topics,
        confirmations,
        ..
    } = module
    else {
        panic!("expected event module");
    };
    assert_eq!(confirmations, 3);
    assert_eq!(
        topics,
        vec![
            keccak256("AnswerUpdated(int256,uint256,uint256)"),
            keccak256("NewRound(uint256,address)"),
        ]
    );
}

#[test]
fn every_trigger_kind_produces_a_distinct_module_arg() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_abi(tmp.path());

    let triggers: Vec<Trigger> = vec![
        serde_json::from_str(r#"{"type":"block"}"#).expect("block"),
        serde_json::from_str(r#"{"type":"cron","expression":"0 * * * *"}"#).expect("cron"),
        serde_json::from_str(r#"{"type":"time","interval_ms":60000}"#).expect("time"),
        serde_json::from_str(
            r#"{"type":"event","address":"0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419",
                "filters":[{"abi":"AnswerFeed","event":"AnswerUpdated"}],"confirmations":1}"#,
        )
        .expect("event"),
    ];

    let mut encoded = Vec::new();
    for t in &triggers {
        let module = trigger::translate(t, tmp.path()).expect("translate");
        encoded.push(module.encode_module_arg());
    }
    for (i, a) in encoded.iter().enumerate() {
        for b in encoded.iter().skip(i + 1) {
            assert_ne!(a, b, "module args must differ between trigger kinds");
        }
    }
}

#[test]
fn time_interval_is_coerced_into_the_encoded_payload() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let five_minutes = trigger::translate(
        &Trigger::Time {
            interval_ms: 300_000,
        },
        tmp.path(),
    )
    .expect("translate");
    let one_hour = trigger::translate(
        &Trigger::Time {
            interval_ms: 3_600_000,
        },
        tmp.path(),
    )
    .expect("translate");
    assert_ne!(
        five_minutes.encode_module_arg(),
        one_hour.encode_module_arg()
    );
}
