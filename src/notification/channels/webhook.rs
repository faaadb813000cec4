//! Discord 兼容 Webhook 客户端
//!
//! 429 / 5xx 时重试一次，遵守 `Retry-After`（最多等待 5 秒）。

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::notification::backend::{SendResult, WebhookBackend, WebhookOptions};
use crate::notification::kind::NotificationKind;

/// 重试前最长等待时间
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(5);

/// 未提供 `Retry-After` 时的等待时间
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Webhook 请求载荷
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    pub embeds: Vec<WebhookEmbed>,
}

#[derive(Debug, Serialize)]
pub struct WebhookEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Webhook 客户端
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
    url: String,
    username: Option<String>,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>, username: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            url: url.into(),
            username,
        })
    }

    /// 构造载荷
    pub fn build_payload(
        &self,
        kind: NotificationKind,
        message: &str,
        options: &WebhookOptions,
    ) -> WebhookPayload {
        let mut title = embed_title(kind).to_string();
        if options.count > 1 {
            title = format!("{} ({})", title, options.count);
        }
        WebhookPayload {
            username: self.username.clone(),
            content: if options.mention {
                "@everyone".to_string()
            } else {
                String::new()
            },
            embeds: vec![WebhookEmbed {
                title,
                description: message.to_string(),
                color: embed_color(kind),
                timestamp: Utc::now().to_rfc3339(),
                footer: options.session_id.as_ref().map(|id| EmbedFooter {
                    text: format!("Session: {}", id),
                }),
            }],
        }
    }

    async fn post(&self, payload: &WebhookPayload) -> reqwest::Result<reqwest::Response> {
        self.client.post(&self.url).json(payload).send().await
    }
}

fn embed_title(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Idle => "Task complete",
        NotificationKind::Permission => "Permission required",
        NotificationKind::Question => "Question waiting",
        NotificationKind::Error => "Agent error",
    }
}

fn embed_color(kind: NotificationKind) -> u32 {
    match kind {
        NotificationKind::Idle => 0x2ecc71,
        NotificationKind::Permission => 0xf1c40f,
        NotificationKind::Question => 0x3498db,
        NotificationKind::Error => 0xe74c3c,
    }
}

/// 是否值得重试
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 解析 `Retry-After`（秒，可为小数），结果不超过 [`MAX_RETRY_AFTER`]
pub fn retry_delay(header: Option<&str>) -> Duration {
    header
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs.min(MAX_RETRY_AFTER.as_secs_f64())))
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[async_trait]
impl WebhookBackend for DiscordWebhook {
    async fn notify(
        &self,
        kind: NotificationKind,
        message: &str,
        options: &WebhookOptions,
    ) -> SendResult {
        let payload = self.build_payload(kind, message, options);

        let mut retried = false;
        loop {
            let response = match self.post(&payload).await {
                Ok(response) => response,
                Err(e) => return SendResult::Failed(format!("HTTP request failed: {}", e)),
            };

            let status = response.status();
            if status.is_success() {
                debug!(kind = %kind, status = %status, "Webhook delivered");
                return SendResult::Sent;
            }

            if is_retryable(status) && !retried {
                let delay = retry_delay(
                    response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok()),
                );
                warn!(kind = %kind, status = %status, delay_ms = delay.as_millis() as u64, "Webhook throttled, retrying");
                tokio::time::sleep(delay).await;
                retried = true;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return SendResult::Failed(format!("Webhook error ({}): {}", status, body));
        }
    }
}
