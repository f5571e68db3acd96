//! Single-shot keeper dry run.
//!
//! Runs one keeper's decision logic against live on-chain state and prints
//! the proposed calls without executing anything. Configuration is
//! env-driven: `KEEPER_NAME` selects the handler, `KEEPER_DOMAIN` the
//! network, and `KEEPER_ARGS_PATH` points at a JSON file holding the same
//! `args` object the deployment config would carry.

use keeper_fleet::config::domains::Domain;
use keeper_fleet::config::settings::Settings;
use keeper_fleet::keepers::{self, Decision};
use keeper_fleet::notify::Notifier;

fn required_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load()?;
    let name = required_env("KEEPER_NAME")?;
    let domain_raw = required_env("KEEPER_DOMAIN")?;
    let domain = Domain::parse(&domain_raw)
        .ok_or_else(|| anyhow::anyhow!("unsupported KEEPER_DOMAIN `{domain_raw}`"))?;
    let args_path = required_env("KEEPER_ARGS_PATH")?;
    let args: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&args_path)?)
        .map_err(|e| anyhow::anyhow!("args file `{args_path}` rejected: {e}"))?;

    let decision = keepers::run_keeper(&name, &settings, domain, &args).await?;
    match &decision {
        Decision::NoAction { reason } => {
            println!("[CHECK] {name} on {domain}: no action needed ({reason})");
        }
        Decision::Execute { calls, note } => {
            println!(
                "[CHECK] {name} on {domain}: {} proposed call(s)",
                calls.len()
            );
            for call in calls {
                println!(
                    "  target={:#x} gas_limit={} value={} calldata=0x{}",
                    call.target,
                    call.gas_limit,
                    call.value,
                    hex::encode(&call.call_data)
                );
            }
            if let Some(note) = note {
                let notifier = Notifier::new(settings.notify_webhook_url.clone());
                notifier.send_line(note).await;
            }
        }
    }
    Ok(())
}
