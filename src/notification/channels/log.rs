//! 日志后端 - dry-run 模式及 Toast 输出
//!
//! 不产生任何外部副作用，只通过 tracing 记录本应发生的操作。

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::notification::backend::{
    DesktopNotifier, DesktopOptions, MessageGenerator, MessageRequest, SendResult, SoundBackend,
    SpeakOptions, SpeechBackend, SystemControl, ToastBackend, ToastVariant, WebhookBackend,
    WebhookOptions,
};
use crate::notification::kind::NotificationKind;

/// 只记录日志的后端
#[derive(Debug, Clone, Default)]
pub struct LogBackend;

impl LogBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechBackend for LogBackend {
    async fn speak(&self, text: &str, options: &SpeakOptions) -> bool {
        info!(text = %text, engine = ?options.engine, "[dry-run] speak");
        true
    }
}

#[async_trait]
impl SoundBackend for LogBackend {
    async fn play(&self, path: &Path, loops: u32) -> Result<()> {
        info!(path = %path.display(), loops, "[dry-run] play sound");
        Ok(())
    }
}

#[async_trait]
impl ToastBackend for LogBackend {
    async fn show(&self, message: &str, variant: ToastVariant, duration: Duration) -> Result<()> {
        info!(
            message = %message,
            variant = ?variant,
            duration_ms = duration.as_millis() as u64,
            "Toast"
        );
        Ok(())
    }
}

#[async_trait]
impl DesktopNotifier for LogBackend {
    async fn notify(&self, title: &str, message: &str, options: &DesktopOptions) -> SendResult {
        info!(title = %title, message = %message, urgent = options.urgent, "[dry-run] desktop notification");
        SendResult::Sent
    }
}

#[async_trait]
impl WebhookBackend for LogBackend {
    async fn notify(
        &self,
        kind: NotificationKind,
        message: &str,
        options: &WebhookOptions,
    ) -> SendResult {
        info!(kind = %kind, message = %message, count = options.count, "[dry-run] webhook");
        SendResult::Sent
    }
}

#[async_trait]
impl SystemControl for LogBackend {
    async fn wake_display(&self) -> Result<()> {
        info!("[dry-run] wake display");
        Ok(())
    }

    async fn ensure_volume(&self, threshold: u8) -> Result<()> {
        info!(threshold, "[dry-run] ensure volume");
        Ok(())
    }
}

#[async_trait]
impl MessageGenerator for LogBackend {
    async fn generate(&self, request: &MessageRequest) -> Result<String> {
        info!(kind = %request.kind, count = request.count, "[dry-run] generate AI message");
        Ok(format!("Dry run {} notification for {} item(s).", request.kind, request.count))
    }
}
