use std::time::Duration;

const DEFAULT_NOTIFY_HTTP_TIMEOUT_MS: u64 = 2_000;

fn load_timeout_ms() -> u64 {
    std::env::var("NOTIFY_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(|v| v.clamp(250, 15_000))
        .unwrap_or(DEFAULT_NOTIFY_HTTP_TIMEOUT_MS)
}

/// Operational notification sink: pre-formatted one-line messages over a
/// webhook. Delivery is best-effort; failures are logged, never retried.
pub struct Notifier {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(load_timeout_ms()))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            webhook_url,
            client,
        }
    }

    pub fn enabled(&self) -> bool {
        self.webhook_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub async fn send_line(&self, line: &str) {
        let Some(url) = self.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            tracing::debug!("[NOTIFY] No webhook configured; dropping: {}", line);
            return;
        };
        let payload = serde_json::json!({ "content": line });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    "[NOTIFY] Webhook returned {} for: {}",
                    response.status(),
                    line
                );
            }
            Err(e) => {
                tracing::warn!("[NOTIFY] Webhook delivery failed: {}", e);
            }
        }
    }
}
