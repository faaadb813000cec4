//! 通知抽象层 - 提示音、语音提醒、批量合并与外部渠道
//!
//! # 组成
//! 1. 状态：`activity`（用户活动）、`debounce`（idle 防抖）、`batch`（请求合并）
//! 2. 调度：`timer`（可取消定时器）、`reminder`（指数退避提醒）
//! 3. 编排：`orchestrator` 按顺序驱动提示音、提醒和语音
//! 4. 后端：`backend` 定义 trait，`channels` 提供基于系统命令和 HTTP 的实现
//!
//! # 使用示例
//! ```ignore
//! use smart_voice_notify::notification::BackendsBuilder;
//! use smart_voice_notify::{EventRouter, NotifyConfig};
//!
//! let config = NotifyConfig::load()?;
//! let backends = BackendsBuilder::new(&config).dry_run(true).build()?;
//! let router = EventRouter::new(config, backends);
//! ```

pub mod activity;
pub mod backend;
pub mod batch;
pub mod builder;
pub mod channels;
pub mod debounce;
pub mod kind;
pub mod message;
pub mod orchestrator;
pub mod reminder;
pub mod timer;

#[cfg(test)]
pub(crate) mod test_support;

pub use activity::ActivityState;
pub use backend::{
    Backends, DesktopNotifier, DesktopOptions, MessageGenerator, MessageRequest, SendResult,
    SessionQuery, SoundBackend, SpeakOptions, SpeechBackend, SystemControl, ToastBackend,
    ToastVariant, WebhookBackend, WebhookOptions,
};
pub use batch::{BatchAggregator, BatchState};
pub use builder::BackendsBuilder;
pub use debounce::IdleDebouncer;
pub use kind::{BatchKind, NotificationKind};
pub use message::MessageSelector;
pub use orchestrator::{AbortCheck, NotificationOrchestrator, NotifyRequest};
pub use reminder::{ReminderMessage, ReminderScheduler};
pub use timer::CancelableTimer;
