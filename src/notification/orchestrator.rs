//! 通知编排 - 按顺序驱动提示音、提醒安排和立即语音
//!
//! 执行顺序：
//! 1. 派发 Toast / 桌面通知 / Webhook（独立 task，不等待、不影响后续步骤）
//! 2. 播放提示音（等待播放完成）
//! 3. 重新检查中止条件（idle：播放期间用户已活动；请求：已被回复；会话已重置）
//! 4. 安排语音提醒
//! 5. 立即语音播报（tts-first / both 模式），生成文本后再检查一次中止条件
//!
//! 任何步骤的失败都只记录日志，不会向调用方传播。

use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{Backends, DesktopOptions, SpeakOptions, ToastVariant, WebhookOptions};
use super::kind::{BatchKind, NotificationKind};
use super::message::MessageSelector;
use super::reminder::{ReminderMessage, ReminderScheduler};
use crate::config::NotifyConfig;
use crate::context::{lock_context, SharedContext};

/// 中止条件（提示音播放完成后检查）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCheck {
    /// 不检查
    Never,
    /// 提示音开始后出现用户活动
    UserActivity,
    /// 批次的活跃请求已被回复
    RequestResolved { batch: BatchKind, active_id: String },
}

/// 一次通知请求
#[derive(Debug, Clone)]
pub struct NotifyRequest {
    /// 立即播放的提示音
    pub immediate_sound: Option<PathBuf>,
    pub sound_loops: u32,
    /// 提醒消息，`None` 表示不安排提醒
    pub tts_message: Option<ReminderMessage>,
    /// 语音失败时的回退提示音
    pub fallback_sound: Option<PathBuf>,
    pub request_count: usize,
    pub abort: AbortCheck,
    /// 桌面通知标题
    pub title: String,
    /// Toast / 桌面通知 / Webhook 文本
    pub summary: String,
    pub session_id: Option<String>,
    /// 发起时的会话纪元，会话重置后流程中止
    pub epoch: Option<u64>,
}

impl NotifyRequest {
    /// 使用配置中该类型的提示音创建请求
    pub fn for_kind(config: &NotifyConfig, kind: NotificationKind, request_count: usize) -> Self {
        let sound = config.sound_for(kind).map(|p| p.to_path_buf());
        Self {
            immediate_sound: sound.clone(),
            sound_loops: config.sound_loops.max(1),
            tts_message: Some(ReminderMessage::Select),
            fallback_sound: sound,
            request_count: request_count.max(1),
            abort: AbortCheck::Never,
            title: default_title(kind).to_string(),
            summary: String::new(),
            session_id: None,
            epoch: None,
        }
    }

    pub fn with_abort(mut self, abort: AbortCheck) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn in_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }
}

fn default_title(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Idle => "Agent finished",
        NotificationKind::Permission => "Permission required",
        NotificationKind::Question => "Question waiting",
        NotificationKind::Error => "Agent error",
    }
}

/// 通知编排器
#[derive(Clone)]
pub struct NotificationOrchestrator {
    context: SharedContext,
    config: Arc<NotifyConfig>,
    backends: Backends,
    messages: MessageSelector,
    reminders: ReminderScheduler,
}

impl NotificationOrchestrator {
    pub fn new(
        context: SharedContext,
        config: Arc<NotifyConfig>,
        backends: Backends,
        messages: MessageSelector,
        reminders: ReminderScheduler,
    ) -> Self {
        Self {
            context,
            config,
            backends,
            messages,
            reminders,
        }
    }

    /// 执行一次完整的通知流程
    pub async fn notify(&self, kind: NotificationKind, request: NotifyRequest) {
        info!(
            kind = %kind,
            count = request.request_count,
            session_id = ?request.session_id,
            "Dispatching notification"
        );
        self.dispatch_side_channels(kind, &request);

        let started = Instant::now();
        self.play_immediate_sound(kind, &request).await;

        if self.should_abort(&request, started) {
            debug!(kind = %kind, "Request resolved during immediate sound, skipping reminder");
            return;
        }

        if self.config.reminders_enabled() {
            if let Some(message) = request.tts_message.clone() {
                self.reminders.schedule(kind, request.request_count, message);
            }
        }

        if self.config.immediate_speech_enabled() {
            let text = self
                .messages
                .select_message(kind, request.request_count, false)
                .await;
            if self.should_abort(&request, started) {
                debug!(kind = %kind, "Request resolved during message generation, skipping speech");
                return;
            }
            let options = SpeakOptions {
                engine: None,
                fallback_sound: request.fallback_sound.clone(),
            };
            if !self.backends.speech.speak(&text, &options).await {
                warn!(kind = %kind, "Immediate speech produced no output");
            }
        }
    }

    /// 提示音循环次数：按请求数量增加，不超过上限
    pub fn sound_loops_for(&self, request: &NotifyRequest) -> u32 {
        let cap = self.config.max_sound_loops.max(1);
        let by_count = u32::try_from(request.request_count).unwrap_or(u32::MAX);
        request.sound_loops.max(by_count).clamp(1, cap)
    }

    async fn play_immediate_sound(&self, kind: NotificationKind, request: &NotifyRequest) {
        if !self.config.immediate_sound_enabled() {
            return;
        }
        let Some(path) = request.immediate_sound.as_deref() else {
            return;
        };
        let loops = self.sound_loops_for(request);
        if let Err(e) = self.backends.sound.play(path, loops).await {
            warn!(kind = %kind, path = %path.display(), error = %e, "Failed to play sound");
        }
    }

    fn should_abort(&self, request: &NotifyRequest, started: Instant) -> bool {
        let ctx = lock_context(&self.context);
        if request.epoch.is_some_and(|epoch| epoch != ctx.epoch()) {
            return true;
        }
        match &request.abort {
            AbortCheck::Never => false,
            AbortCheck::UserActivity => ctx.activity.was_active_since(started),
            AbortCheck::RequestResolved { batch, active_id } => !ctx
                .batches
                .get(batch)
                .is_some_and(|state| state.is_active(active_id)),
        }
    }

    /// Toast / 桌面通知 / Webhook：fire-and-forget，结果只记录日志
    fn dispatch_side_channels(&self, kind: NotificationKind, request: &NotifyRequest) {
        let summary = if request.summary.is_empty() {
            self.messages
                .select_static(kind, request.request_count, false)
        } else {
            request.summary.clone()
        };

        if self.config.enable_toast {
            let toast = self.backends.toast.clone();
            let message = summary.clone();
            let duration = self.config.toast_duration();
            tokio::spawn(async move {
                if let Err(e) = toast.show(&message, ToastVariant::for_kind(kind), duration).await {
                    warn!(kind = %kind, error = %e, "Toast failed");
                }
            });
        }

        if self.config.enable_desktop_notification {
            let desktop = self.backends.desktop.clone();
            let title = request.title.clone();
            let message = summary.clone();
            let options = DesktopOptions {
                timeout: Some(std::time::Duration::from_secs(
                    self.config.desktop_notification_timeout_seconds,
                )),
                subtitle: request.session_id.clone(),
                urgent: kind != NotificationKind::Idle,
            };
            tokio::spawn(async move {
                let result = desktop.notify(&title, &message, &options).await;
                if !result.is_success() {
                    warn!(kind = %kind, result = ?result, "Desktop notification not delivered");
                }
            });
        }

        if self.config.webhook_accepts(kind) {
            let webhook = self.backends.webhook.clone();
            let message = summary;
            let options = WebhookOptions {
                session_id: request.session_id.clone(),
                count: request.request_count,
                mention: kind == NotificationKind::Permission
                    && self.config.webhook_mention_on_permission,
            };
            tokio::spawn(async move {
                let result = webhook.notify(kind, &message, &options).await;
                if !result.is_success() {
                    warn!(kind = %kind, result = ?result, "Webhook not delivered");
                }
            });
        }
    }
}
