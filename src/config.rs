//! 通知配置
//!
//! 配置文件位置：`~/.config/smart-voice-notify/config.json`（JSON，camelCase 字段）。
//! 文件不存在时使用默认值；文件存在但格式错误时返回错误。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::notification::kind::{BatchKind, NotificationKind};

/// 配置目录名（位于 `~/.config` 下）
pub const CONFIG_DIR: &str = "smart-voice-notify";

/// 配置文件名
pub const CONFIG_FILE: &str = "config.json";

/// 通知模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationMode {
    /// 先播放提示音，未响应时再语音提醒
    #[default]
    SoundFirst,
    /// 立即语音播报
    TtsFirst,
    /// 提示音 + 立即语音
    Both,
    /// 只播放提示音，不语音、不提醒
    SoundOnly,
}

impl NotificationMode {
    pub fn plays_sound(&self) -> bool {
        !matches!(self, NotificationMode::TtsFirst)
    }

    pub fn speaks_immediately(&self) -> bool {
        matches!(self, NotificationMode::TtsFirst | NotificationMode::Both)
    }

    pub fn allows_reminders(&self) -> bool {
        !matches!(self, NotificationMode::SoundOnly)
    }
}

/// 完整的通知配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotifyConfig {
    pub enabled: bool,
    pub notification_mode: NotificationMode,

    // 渠道开关
    pub enable_sound: bool,
    pub enable_tts: bool,
    pub enable_toast: bool,
    pub enable_desktop_notification: bool,
    pub enable_webhook: bool,

    // 提醒
    pub enable_tts_reminder: bool,
    pub tts_reminder_delay_seconds: f64,
    pub idle_reminder_delay_seconds: Option<f64>,
    pub permission_reminder_delay_seconds: Option<f64>,
    pub question_reminder_delay_seconds: Option<f64>,
    pub error_reminder_delay_seconds: Option<f64>,
    pub enable_follow_up_reminders: bool,
    pub max_follow_up_reminders: u32,
    pub reminder_backoff_multiplier: f64,

    // 合并与防抖窗口
    pub permission_batch_window_ms: u64,
    pub question_batch_window_ms: u64,
    pub idle_debounce_ms: u64,

    // 提示音
    pub idle_sound: Option<PathBuf>,
    pub permission_sound: Option<PathBuf>,
    pub question_sound: Option<PathBuf>,
    pub error_sound: Option<PathBuf>,
    pub sound_loops: u32,
    pub max_sound_loops: u32,

    // 系统控制
    pub wake_monitor: bool,
    pub force_volume: bool,
    pub volume_threshold: u8,

    // 消息池
    pub idle_tts_messages: Vec<String>,
    pub permission_tts_messages: Vec<String>,
    pub question_tts_messages: Vec<String>,
    pub error_tts_messages: Vec<String>,
    pub idle_reminder_messages: Vec<String>,
    pub permission_reminder_messages: Vec<String>,
    pub question_reminder_messages: Vec<String>,
    pub error_reminder_messages: Vec<String>,
    pub permission_multiple_messages: Vec<String>,
    pub question_multiple_messages: Vec<String>,
    pub permission_reminder_multiple_messages: Vec<String>,
    pub question_reminder_multiple_messages: Vec<String>,

    // AI 消息生成
    pub enable_ai_messages: bool,
    pub ai_endpoint: Option<String>,
    pub ai_model: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_timeout_ms: u64,

    // Webhook
    pub webhook_url: Option<String>,
    pub webhook_username: Option<String>,
    pub webhook_events: Vec<NotificationKind>,
    pub webhook_timeout_ms: u64,
    pub webhook_mention_on_permission: bool,

    // 桌面通知 / Toast
    pub desktop_notification_timeout_seconds: u64,
    pub toast_duration_ms: u64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            notification_mode: NotificationMode::SoundFirst,
            enable_sound: true,
            enable_tts: true,
            enable_toast: true,
            enable_desktop_notification: true,
            enable_webhook: false,
            enable_tts_reminder: true,
            tts_reminder_delay_seconds: 30.0,
            idle_reminder_delay_seconds: None,
            permission_reminder_delay_seconds: None,
            question_reminder_delay_seconds: None,
            error_reminder_delay_seconds: None,
            enable_follow_up_reminders: true,
            max_follow_up_reminders: 3,
            reminder_backoff_multiplier: 1.5,
            permission_batch_window_ms: 800,
            question_batch_window_ms: 800,
            idle_debounce_ms: 5000,
            idle_sound: None,
            permission_sound: None,
            question_sound: None,
            error_sound: None,
            sound_loops: 1,
            max_sound_loops: 3,
            wake_monitor: true,
            force_volume: false,
            volume_threshold: 50,
            idle_tts_messages: strings(&[
                "All done! Your task has been completed successfully.",
                "Hey there! I finished working on your request.",
                "Task complete! Ready for your review.",
                "Good news! Everything is done and ready for you.",
            ]),
            permission_tts_messages: strings(&[
                "Attention please! I need your permission to continue.",
                "Hey! Quick approval needed to proceed.",
                "Heads up! Waiting for your authorization.",
            ]),
            question_tts_messages: strings(&[
                "Hey! I have a question for you. Please check your screen.",
                "Attention! I need your input to continue.",
                "Quick question! Please take a look when you have a moment.",
            ]),
            error_tts_messages: strings(&[
                "Oops! Something went wrong. Please check for errors.",
                "Alert! The agent encountered an error and needs your attention.",
            ]),
            idle_reminder_messages: strings(&[
                "Hey, are you still there? Your task has been waiting for review.",
                "Just a gentle reminder - I finished your request a while ago!",
                "Still waiting for you! The work is done and ready for review.",
            ]),
            permission_reminder_messages: strings(&[
                "Hey! I still need your permission to continue.",
                "Reminder: there is a pending permission request waiting for you.",
                "Still waiting for your approval. Please check when you can.",
            ]),
            question_reminder_messages: strings(&[
                "Hey! I am still waiting for your answer.",
                "Reminder: there is a question waiting for your response.",
            ]),
            error_reminder_messages: strings(&[
                "Reminder: the agent hit an error and is still waiting for you.",
            ]),
            permission_multiple_messages: strings(&[
                "Attention please! There are {count} permission requests waiting for your approval.",
                "Hey! {count} permissions need your approval to continue.",
            ]),
            question_multiple_messages: strings(&[
                "Hey! I have {count} questions for you. Please check your screen.",
                "Attention! {count} questions need your input to continue.",
            ]),
            permission_reminder_multiple_messages: strings(&[
                "Hey! There are still {count} permission requests waiting for you.",
                "Reminder: {count} permissions are still waiting for your approval.",
            ]),
            question_reminder_multiple_messages: strings(&[
                "Hey! {count} questions are still waiting for your answers.",
                "Reminder: there are {count} questions waiting for your response.",
            ]),
            enable_ai_messages: false,
            ai_endpoint: None,
            ai_model: None,
            ai_api_key: None,
            ai_timeout_ms: 15_000,
            webhook_url: None,
            webhook_username: None,
            webhook_events: NotificationKind::ALL.to_vec(),
            webhook_timeout_ms: 10_000,
            webhook_mention_on_permission: false,
            desktop_notification_timeout_seconds: 5,
            toast_duration_ms: 5000,
        }
    }
}

impl NotifyConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// 从默认位置加载配置（不存在时使用默认值）
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                debug!("Home directory not found, using default config");
                Ok(Self::default())
            }
        }
    }

    /// 从指定文件加载配置
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: NotifyConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// 指定类型的提醒延迟（秒），未单独配置时回退到全局值
    pub fn reminder_delay_seconds(&self, kind: NotificationKind) -> f64 {
        let specific = match kind {
            NotificationKind::Idle => self.idle_reminder_delay_seconds,
            NotificationKind::Permission => self.permission_reminder_delay_seconds,
            NotificationKind::Question => self.question_reminder_delay_seconds,
            NotificationKind::Error => self.error_reminder_delay_seconds,
        };
        specific
            .unwrap_or(self.tts_reminder_delay_seconds)
            .max(0.0)
    }

    /// 批量合并窗口
    pub fn batch_window(&self, kind: BatchKind) -> Duration {
        match kind {
            BatchKind::Permission => Duration::from_millis(self.permission_batch_window_ms),
            BatchKind::Question => Duration::from_millis(self.question_batch_window_ms),
        }
    }

    /// idle 事件防抖窗口
    pub fn idle_debounce(&self) -> Duration {
        Duration::from_millis(self.idle_debounce_ms)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }

    /// 指定类型的提示音
    pub fn sound_for(&self, kind: NotificationKind) -> Option<&Path> {
        match kind {
            NotificationKind::Idle => self.idle_sound.as_deref(),
            NotificationKind::Permission => self.permission_sound.as_deref(),
            NotificationKind::Question => self.question_sound.as_deref(),
            NotificationKind::Error => self.error_sound.as_deref(),
        }
    }

    /// 立即提示音是否启用
    pub fn immediate_sound_enabled(&self) -> bool {
        self.enable_sound && self.notification_mode.plays_sound()
    }

    /// 立即语音是否启用
    pub fn immediate_speech_enabled(&self) -> bool {
        self.enable_tts && self.notification_mode.speaks_immediately()
    }

    /// 语音提醒是否启用
    pub fn reminders_enabled(&self) -> bool {
        self.enable_tts && self.enable_tts_reminder && self.notification_mode.allows_reminders()
    }

    /// 单条消息池
    pub fn single_messages(&self, kind: NotificationKind, is_reminder: bool) -> &[String] {
        match (kind, is_reminder) {
            (NotificationKind::Idle, false) => &self.idle_tts_messages,
            (NotificationKind::Idle, true) => &self.idle_reminder_messages,
            (NotificationKind::Permission, false) => &self.permission_tts_messages,
            (NotificationKind::Permission, true) => &self.permission_reminder_messages,
            (NotificationKind::Question, false) => &self.question_tts_messages,
            (NotificationKind::Question, true) => &self.question_reminder_messages,
            (NotificationKind::Error, false) => &self.error_tts_messages,
            (NotificationKind::Error, true) => &self.error_reminder_messages,
        }
    }

    /// 多条请求的消息池（仅权限和问题有）
    pub fn multiple_messages(&self, kind: NotificationKind, is_reminder: bool) -> &[String] {
        match (kind, is_reminder) {
            (NotificationKind::Permission, false) => &self.permission_multiple_messages,
            (NotificationKind::Permission, true) => &self.permission_reminder_multiple_messages,
            (NotificationKind::Question, false) => &self.question_multiple_messages,
            (NotificationKind::Question, true) => &self.question_reminder_multiple_messages,
            _ => &[],
        }
    }

    /// 该类型是否转发到 webhook
    pub fn webhook_accepts(&self, kind: NotificationKind) -> bool {
        self.enable_webhook && self.webhook_url.is_some() && self.webhook_events.contains(&kind)
    }
}
