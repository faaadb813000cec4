//! 后端构建器 - 根据配置组装具体后端

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::backend::{Backends, MessageGenerator, WebhookBackend};
use super::channels::ai::DEFAULT_MODEL;
use super::channels::{
    AiConfig, CommandDesktop, CommandSound, CommandSpeech, CommandSystem, DiscordWebhook,
    LogBackend, OpenAiGenerator, ParentCache,
};
use crate::config::NotifyConfig;

/// 后端构建器
pub struct BackendsBuilder<'a> {
    config: &'a NotifyConfig,
    dry_run: bool,
}

impl<'a> BackendsBuilder<'a> {
    pub fn new(config: &'a NotifyConfig) -> Self {
        Self {
            config,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式（所有副作用只记录日志）
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<Backends> {
        let sessions = Arc::new(ParentCache::new());
        let log = Arc::new(LogBackend::new());

        if self.dry_run {
            info!("Dry-run mode, side effects are logged only");
            return Ok(Backends {
                speech: log.clone(),
                sound: log.clone(),
                toast: log.clone(),
                desktop: log.clone(),
                webhook: log.clone(),
                sessions,
                system: log.clone(),
                generator: self.config.enable_ai_messages.then(|| log as Arc<dyn MessageGenerator>),
            });
        }

        let sound = Arc::new(CommandSound::new());
        Ok(Backends {
            speech: Arc::new(CommandSpeech::new(sound.clone())),
            sound,
            toast: log.clone(),
            desktop: Arc::new(CommandDesktop::new()),
            webhook: self.webhook(log.clone())?,
            sessions,
            system: Arc::new(CommandSystem::new()),
            generator: self.generator()?,
        })
    }

    fn webhook(&self, fallback: Arc<LogBackend>) -> Result<Arc<dyn WebhookBackend>> {
        match (&self.config.webhook_url, self.config.enable_webhook) {
            (Some(url), true) => {
                info!(events = ?self.config.webhook_events, "Webhook enabled");
                let webhook = DiscordWebhook::new(
                    url.clone(),
                    self.config.webhook_username.clone(),
                    self.config.webhook_timeout(),
                )
                .context("Failed to create webhook client")?;
                Ok(Arc::new(webhook) as Arc<dyn WebhookBackend>)
            }
            // 未启用时不会被调用，webhook_accepts 已过滤
            _ => Ok(fallback as Arc<dyn WebhookBackend>),
        }
    }

    fn generator(&self) -> Result<Option<Arc<dyn MessageGenerator>>> {
        if !self.config.enable_ai_messages {
            return Ok(None);
        }
        let Some(endpoint) = self.config.ai_endpoint.clone() else {
            info!("AI messages enabled but no endpoint configured, using static messages");
            return Ok(None);
        };
        let generator = OpenAiGenerator::new(AiConfig {
            endpoint,
            model: self
                .config
                .ai_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: self.config.ai_api_key.clone(),
            timeout: self.config.ai_timeout(),
        })
        .context("Failed to create AI client")?;
        Ok(Some(Arc::new(generator) as Arc<dyn MessageGenerator>))
    }
}
