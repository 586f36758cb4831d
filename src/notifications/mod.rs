//! Best-effort webhook notifications for tracked-link opens.
//!
//! Visits are enqueued on a bounded channel and delivered by a detached
//! worker task, keeping the public tracking response independent of webhook
//! latency. Delivery is single-shot: failures are logged and dropped.

use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::WebhookConfig;

/// Payload describing one tracked-link open
#[derive(Debug, Clone)]
pub struct VisitNotification {
    pub codigo: String,
    pub asesor: String,
    pub timestamp: String,
}

impl VisitNotification {
    pub fn new(codigo: String, asesor: String) -> Self {
        Self {
            codigo,
            asesor,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// JSON body posted to the configured webhook
fn build_payload(notification: &VisitNotification) -> serde_json::Value {
    json!({
        "event": "cotizacion.visita",
        "codigo": notification.codigo,
        "asesor": notification.asesor,
        "timestamp": notification.timestamp,
    })
}

/// Spawn the worker that drains the notification queue. With no webhook URL
/// configured the worker still drains, so senders never back up.
pub fn spawn_webhook_worker(
    mut rx: mpsc::Receiver<VisitNotification>,
    config: WebhookConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("reqwest client");

        if config.url.is_some() {
            tracing::info!("Webhook notification worker started");
        }

        while let Some(notification) = rx.recv().await {
            let Some(url) = config.url.as_deref() else {
                tracing::debug!(codigo = %notification.codigo, "No webhook configured, dropping notification");
                continue;
            };

            match send_once(&client, url, &notification).await {
                Ok(status) => {
                    tracing::info!(
                        codigo = %notification.codigo,
                        status = status,
                        "Visit webhook delivered"
                    );
                }
                Err(e) => {
                    // Intentionally swallowed: webhook failures never reach clients
                    tracing::warn!(
                        codigo = %notification.codigo,
                        url = url,
                        error = %e,
                        "Visit webhook delivery failed"
                    );
                }
            }
        }
    })
}

async fn send_once(
    client: &reqwest::Client,
    url: &str,
    notification: &VisitNotification,
) -> anyhow::Result<u16> {
    let response = client
        .post(url)
        .json(&build_payload(notification))
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("webhook endpoint returned {status}");
    }
    Ok(status.as_u16())
}
