//! Deployment reconciliation binary.
//!
//! Reads every keeper deployment config under the config root, lists the
//! tasks currently active on the automation platform, and applies the
//! difference: unchanged tasks are kept, new or changed configs become
//! create-task transactions, and tasks with no matching config are
//! cancelled. Interactive unless `AUTO_APPROVE` is set.

use keeper_fleet::config::settings::Settings;
use keeper_fleet::notify::Notifier;
use keeper_fleet::platform::automate::AutomateClient;
use keeper_fleet::reconciler::{self, AutoConfirm, Confirmer, StdinConfirm};
use keeper_fleet::signer::resolve_signer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::var("RUST_LOG") {
        Ok(val) => println!("[STARTUP] RUST_LOG is set to: '{}'", val),
        Err(_) => println!("[STARTUP] RUST_LOG is unset."),
    }

    // Default to `info` when `RUST_LOG` is unset or invalid to avoid silent startup.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        println!("[STARTUP] RUST_LOG invalid or unset; defaulting to 'info'");
        tracing_subscriber::EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Settings and credential failures abort here, before any network call.
    let settings = Settings::load()?;
    let signer = resolve_signer(&settings)?;
    tracing::info!("[STARTUP] Signing as {:#x}.", signer.address());

    let platform = AutomateClient::new(&settings, signer)?;
    for (domain, head) in platform.probe_connectivity().await? {
        tracing::info!("[STARTUP] {} connectivity OK. Latest block: {}", domain, head);
    }

    let confirmer: Box<dyn Confirmer> = if settings.auto_approve {
        tracing::info!("[STARTUP] AUTO_APPROVE set; every action is pre-confirmed.");
        Box::new(AutoConfirm)
    } else {
        Box::new(StdinConfirm)
    };

    let summary = reconciler::reconcile(&settings, &platform, confirmer.as_ref()).await?;

    let notifier = Notifier::new(settings.notify_webhook_url.clone());
    notifier.send_line(&summary.line()).await;
    Ok(())
}
