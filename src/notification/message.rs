//! 通知消息选择
//!
//! 优先尝试 AI 生成（独立超时 + 长度校验），失败或未启用时从静态消息池随机选择。
//! 多个请求时使用带 `{count}` 占位符的消息池；没有对应池时生成通用句子。

use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, warn};

use super::backend::{MessageGenerator, MessageRequest};
use super::kind::NotificationKind;
use crate::config::NotifyConfig;

/// AI 生成消息的最短长度（字符）
pub const MIN_AI_MESSAGE_CHARS: usize = 5;

/// AI 生成消息的最长长度（字符）
pub const MAX_AI_MESSAGE_CHARS: usize = 200;

/// 消息选择器
#[derive(Clone)]
pub struct MessageSelector {
    config: Arc<NotifyConfig>,
    generator: Option<Arc<dyn MessageGenerator>>,
}

impl MessageSelector {
    pub fn new(config: Arc<NotifyConfig>, generator: Option<Arc<dyn MessageGenerator>>) -> Self {
        Self { config, generator }
    }

    /// 选择消息（AI 优先，失败回退静态池）
    pub async fn select_message(
        &self,
        kind: NotificationKind,
        count: usize,
        is_reminder: bool,
    ) -> String {
        if let Some(message) = self.try_generate(kind, count, is_reminder).await {
            return message;
        }
        self.select_static(kind, count, is_reminder)
    }

    async fn try_generate(
        &self,
        kind: NotificationKind,
        count: usize,
        is_reminder: bool,
    ) -> Option<String> {
        if !self.config.enable_ai_messages {
            return None;
        }
        let generator = self.generator.as_ref()?;
        let request = MessageRequest {
            kind,
            count: count.max(1),
            is_reminder,
        };

        match tokio::time::timeout(self.config.ai_timeout(), generator.generate(&request)).await {
            Ok(Ok(text)) => {
                let text = clean_generated(&text);
                let chars = text.chars().count();
                if (MIN_AI_MESSAGE_CHARS..=MAX_AI_MESSAGE_CHARS).contains(&chars) {
                    debug!(kind = %kind, count, "Using AI generated message");
                    Some(text)
                } else {
                    warn!(kind = %kind, chars, "AI message length out of bounds, using static pool");
                    None
                }
            }
            Ok(Err(e)) => {
                warn!(kind = %kind, error = %e, "AI message generation failed, using static pool");
                None
            }
            Err(_) => {
                warn!(
                    kind = %kind,
                    timeout_ms = self.config.ai_timeout_ms,
                    "AI message generation timed out, using static pool"
                );
                None
            }
        }
    }

    /// 从静态消息池选择
    pub fn select_static(&self, kind: NotificationKind, count: usize, is_reminder: bool) -> String {
        let mut rng = rand::thread_rng();

        if count > 1 {
            return match self.config.multiple_messages(kind, is_reminder).choose(&mut rng) {
                Some(template) => template.replace("{count}", &count.to_string()),
                None => generic_multiple_message(kind, count, is_reminder),
            };
        }

        match self.config.single_messages(kind, is_reminder).choose(&mut rng) {
            Some(message) => message.clone(),
            None => generic_single_message(kind, is_reminder),
        }
    }
}

/// 去掉 AI 输出两端的空白和引号
fn clean_generated(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}

fn generic_single_message(kind: NotificationKind, is_reminder: bool) -> String {
    let base = match kind {
        NotificationKind::Idle => "Your task is complete and ready for review.",
        NotificationKind::Permission => "A permission request needs your approval.",
        NotificationKind::Question => "A question needs your answer.",
        NotificationKind::Error => "The agent ran into an error.",
    };
    if is_reminder {
        format!("Reminder: {}", base)
    } else {
        base.to_string()
    }
}

fn generic_multiple_message(kind: NotificationKind, count: usize, is_reminder: bool) -> String {
    let noun = match kind {
        NotificationKind::Idle => "tasks are complete",
        NotificationKind::Permission => "permission requests need your approval",
        NotificationKind::Question => "questions need your answers",
        NotificationKind::Error => "errors need your attention",
    };
    if is_reminder {
        format!("Reminder: {} {} and are still waiting.", count, noun)
    } else {
        format!("Attention! {} {}.", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedGenerator(anyhow::Result<String>);

    #[async_trait]
    impl MessageGenerator for FixedGenerator {
        async fn generate(&self, _request: &MessageRequest) -> anyhow::Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow!("{}", e)),
            }
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl MessageGenerator for SlowGenerator {
        async fn generate(&self, _request: &MessageRequest) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("This message arrived far too late.".to_string())
        }
    }

    fn selector_with(config: NotifyConfig, generator: Option<Arc<dyn MessageGenerator>>) -> MessageSelector {
        MessageSelector::new(Arc::new(config), generator)
    }

    #[test]
    fn test_single_message_from_pool() {
        let config = NotifyConfig {
            idle_tts_messages: vec!["only idle".to_string()],
            idle_reminder_messages: vec!["only reminder".to_string()],
            ..Default::default()
        };
        let selector = selector_with(config, None);
        assert_eq!(selector.select_static(NotificationKind::Idle, 1, false), "only idle");
        assert_eq!(selector.select_static(NotificationKind::Idle, 1, true), "only reminder");
    }

    #[test]
    fn test_multiple_substitutes_count() {
        let config = NotifyConfig {
            permission_multiple_messages: vec!["{count} permissions waiting".to_string()],
            ..Default::default()
        };
        let selector = selector_with(config, None);
        assert_eq!(
            selector.select_static(NotificationKind::Permission, 3, false),
            "3 permissions waiting"
        );
    }

    #[test]
    fn test_multiple_without_pool_uses_generic_sentence() {
        let selector = selector_with(NotifyConfig::default(), None);
        let message = selector.select_static(NotificationKind::Error, 4, false);
        assert!(message.contains('4'));
        assert!(message.contains("errors"));
    }

    #[test]
    fn test_empty_single_pool_uses_generic_sentence() {
        let config = NotifyConfig {
            question_tts_messages: Vec::new(),
            ..Default::default()
        };
        let selector = selector_with(config, None);
        assert_eq!(
            selector.select_static(NotificationKind::Question, 1, false),
            "A question needs your answer."
        );
    }

    #[tokio::test]
    async fn test_ai_message_used_when_enabled() {
        let config = NotifyConfig {
            enable_ai_messages: true,
            ..Default::default()
        };
        let generator: Arc<dyn MessageGenerator> =
            Arc::new(FixedGenerator(Ok("\"Your build is ready, come take a look!\"".to_string())));
        let selector = selector_with(config, Some(generator));
        assert_eq!(
            selector.select_message(NotificationKind::Idle, 1, false).await,
            "Your build is ready, come take a look!"
        );
    }

    #[tokio::test]
    async fn test_ai_ignored_when_disabled() {
        let config = NotifyConfig {
            idle_tts_messages: vec!["static".to_string()],
            ..Default::default()
        };
        let generator: Arc<dyn MessageGenerator> =
            Arc::new(FixedGenerator(Ok("A generated message".to_string())));
        let selector = selector_with(config, Some(generator));
        assert_eq!(selector.select_message(NotificationKind::Idle, 1, false).await, "static");
    }

    #[tokio::test]
    async fn test_ai_failure_and_bad_length_fall_back() {
        let config = NotifyConfig {
            enable_ai_messages: true,
            idle_tts_messages: vec!["static".to_string()],
            ..Default::default()
        };

        let failing: Arc<dyn MessageGenerator> =
            Arc::new(FixedGenerator(Err(anyhow!("quota exceeded"))));
        let selector = selector_with(config.clone(), Some(failing));
        assert_eq!(selector.select_message(NotificationKind::Idle, 1, false).await, "static");

        let too_short: Arc<dyn MessageGenerator> = Arc::new(FixedGenerator(Ok("ok".to_string())));
        let selector = selector_with(config.clone(), Some(too_short));
        assert_eq!(selector.select_message(NotificationKind::Idle, 1, false).await, "static");

        let too_long: Arc<dyn MessageGenerator> =
            Arc::new(FixedGenerator(Ok("x".repeat(MAX_AI_MESSAGE_CHARS + 1))));
        let selector = selector_with(config, Some(too_long));
        assert_eq!(selector.select_message(NotificationKind::Idle, 1, false).await, "static");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_timeout_falls_back() {
        let config = NotifyConfig {
            enable_ai_messages: true,
            ai_timeout_ms: 100,
            idle_tts_messages: vec!["static".to_string()],
            ..Default::default()
        };
        let selector = selector_with(config, Some(Arc::new(SlowGenerator)));
        assert_eq!(selector.select_message(NotificationKind::Idle, 1, false).await, "static");
    }
}
