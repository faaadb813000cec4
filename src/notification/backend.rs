//! 通知后端 trait 定义
//!
//! 核心状态机只通过这些 trait 触达外部：语音合成、提示音、Toast、桌面通知、
//! Webhook、会话查询、系统控制和 AI 消息生成。所有实现都必须自己处理超时，
//! 并且不应 panic；失败通过返回值表达。

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::kind::NotificationKind;

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 已排队（稍后投递）
    Queued,
    /// 跳过（不符合渠道过滤条件）
    Skipped(String),
    /// 发送失败
    Failed(String),
}

impl SendResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SendResult::Sent | SendResult::Queued)
    }
}

/// 语音合成选项
#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    /// 指定引擎（为空时按后端默认顺序尝试）
    pub engine: Option<String>,
    /// 所有引擎失败时播放的提示音
    pub fallback_sound: Option<PathBuf>,
}

/// Toast 样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Info,
    Success,
    Warning,
    Error,
}

impl ToastVariant {
    pub fn for_kind(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::Idle => ToastVariant::Success,
            NotificationKind::Permission | NotificationKind::Question => ToastVariant::Warning,
            NotificationKind::Error => ToastVariant::Error,
        }
    }
}

/// 桌面通知选项
#[derive(Debug, Clone, Default)]
pub struct DesktopOptions {
    pub timeout: Option<Duration>,
    pub subtitle: Option<String>,
    /// 需要用户处理的通知（权限、问题、错误）
    pub urgent: bool,
}

/// Webhook 选项
#[derive(Debug, Clone, Default)]
pub struct WebhookOptions {
    pub session_id: Option<String>,
    pub count: usize,
    /// 是否 @ 提醒
    pub mention: bool,
}

/// AI 消息生成请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRequest {
    pub kind: NotificationKind,
    pub count: usize,
    pub is_reminder: bool,
}

/// 语音合成后端（内部负责多引擎回退）
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// 播报文本，任何引擎成功即返回 `true`
    async fn speak(&self, text: &str, options: &SpeakOptions) -> bool;
}

/// 提示音播放后端
#[async_trait]
pub trait SoundBackend: Send + Sync {
    /// 播放 `loops` 次，播放完成后返回
    async fn play(&self, path: &Path, loops: u32) -> Result<()>;
}

/// Toast 后端
#[async_trait]
pub trait ToastBackend: Send + Sync {
    async fn show(&self, message: &str, variant: ToastVariant, duration: Duration) -> Result<()>;
}

/// 桌面通知后端
#[async_trait]
pub trait DesktopNotifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str, options: &DesktopOptions) -> SendResult;
}

/// Webhook 后端（内部处理重试和限流）
#[async_trait]
pub trait WebhookBackend: Send + Sync {
    async fn notify(
        &self,
        kind: NotificationKind,
        message: &str,
        options: &WebhookOptions,
    ) -> SendResult;
}

/// 会话关系查询
#[async_trait]
pub trait SessionQuery: Send + Sync {
    /// 返回父会话 ID（子会话有父会话）
    async fn parent_of(&self, session_id: &str) -> Result<Option<String>>;

    /// 宿主报告新会话时调用，供缓存型实现记录父子关系
    fn record_session(&self, _session_id: &str, _parent_id: Option<&str>) {}
}

/// 系统控制（唤醒屏幕、调整音量）
#[async_trait]
pub trait SystemControl: Send + Sync {
    async fn wake_display(&self) -> Result<()>;

    /// 音量低于阈值（0-100）时调到阈值
    async fn ensure_volume(&self, threshold: u8) -> Result<()>;
}

/// AI 消息生成
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, request: &MessageRequest) -> Result<String>;
}

/// 核心依赖的全部后端
#[derive(Clone)]
pub struct Backends {
    pub speech: Arc<dyn SpeechBackend>,
    pub sound: Arc<dyn SoundBackend>,
    pub toast: Arc<dyn ToastBackend>,
    pub desktop: Arc<dyn DesktopNotifier>,
    pub webhook: Arc<dyn WebhookBackend>,
    pub sessions: Arc<dyn SessionQuery>,
    pub system: Arc<dyn SystemControl>,
    pub generator: Option<Arc<dyn MessageGenerator>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("generator", &self.generator.is_some())
            .finish_non_exhaustive()
    }
}
