//! 提醒调度器 - 未响应的通知按指数退避重复语音提醒
//!
//! 每种通知类型最多一个待触发提醒：Unarmed → Armed → (Firing → Armed | Cancelled | Exhausted)。
//!
//! 触发时先检查提醒是否仍有效、用户是否已活动；播报是独立 task，
//! 开始后不会被中止，播报结束后重新检查取消状态再决定是否安排下一次。
//! 生成文本、唤醒屏幕和调整音量都可能等待较久，每一步之后都会再次确认提醒未被取消。

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backend::{Backends, SpeakOptions};
use super::kind::NotificationKind;
use super::message::MessageSelector;
use super::timer::CancelableTimer;
use crate::config::NotifyConfig;
use crate::context::{lock_context, PendingReminder, SessionContext, SharedContext};

/// 提醒消息来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderMessage {
    /// 触发时选择（AI 优先，回退静态池）
    Select,
    /// 固定文本（仅用于首次触发，后续提醒重新选择）
    Text(String),
}

/// 单次提醒的安排参数
struct Arm {
    base_delay_seconds: f64,
    follow_up_count: u32,
    request_count: usize,
    message: ReminderMessage,
    wait: Duration,
}

/// 提醒调度器
#[derive(Clone)]
pub struct ReminderScheduler {
    context: SharedContext,
    config: Arc<NotifyConfig>,
    backends: Backends,
    messages: MessageSelector,
}

impl ReminderScheduler {
    pub fn new(
        context: SharedContext,
        config: Arc<NotifyConfig>,
        backends: Backends,
        messages: MessageSelector,
    ) -> Self {
        Self {
            context,
            config,
            backends,
            messages,
        }
    }

    /// 按配置的类型延迟安排提醒
    pub fn schedule(&self, kind: NotificationKind, request_count: usize, message: ReminderMessage) {
        let delay = self.config.reminder_delay_seconds(kind);
        self.schedule_with_delay(kind, delay, request_count, message);
    }

    /// 安排提醒，替换该类型已有的提醒
    pub fn schedule_with_delay(
        &self,
        kind: NotificationKind,
        delay_seconds: f64,
        request_count: usize,
        message: ReminderMessage,
    ) {
        let delay_seconds = delay_seconds.max(0.0);
        let wait = Duration::try_from_secs_f64(delay_seconds).unwrap_or(Duration::MAX);
        let mut ctx = lock_context(&self.context);
        ctx.cancel_reminder(kind);
        self.arm(
            &mut ctx,
            kind,
            Arm {
                base_delay_seconds: delay_seconds,
                follow_up_count: 0,
                request_count: request_count.max(1),
                message,
                wait,
            },
        );
        info!(kind = %kind, delay_seconds, request_count, "Reminder scheduled");
    }

    pub fn cancel(&self, kind: NotificationKind) -> bool {
        lock_context(&self.context).cancel_reminder(kind)
    }

    pub fn cancel_all(&self) -> usize {
        lock_context(&self.context).cancel_all_reminders()
    }

    pub fn is_armed(&self, kind: NotificationKind) -> bool {
        lock_context(&self.context).reminders.contains_key(&kind)
    }

    /// 第 `follow_up_count` 次后续提醒前的等待时间
    pub fn follow_up_delay(&self, base_delay_seconds: f64, follow_up_count: u32) -> Duration {
        let multiplier = self.config.reminder_backoff_multiplier.max(0.0);
        let exponent = i32::try_from(follow_up_count).unwrap_or(i32::MAX);
        let seconds = base_delay_seconds * multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    fn arm(&self, ctx: &mut SessionContext, kind: NotificationKind, arm: Arm) {
        let generation = ctx.next_generation();
        let scheduler = self.clone();
        let timer = CancelableTimer::start(arm.wait, async move {
            scheduler.fire(kind, generation).await;
        });

        ctx.reminders.insert(
            kind,
            PendingReminder {
                kind,
                generation,
                timer,
                scheduled_at: Instant::now(),
                base_delay_seconds: arm.base_delay_seconds,
                follow_up_count: arm.follow_up_count,
                request_count: arm.request_count,
                message: arm.message,
            },
        );
    }

    async fn fire(self, kind: NotificationKind, generation: u64) {
        let (scheduled_at, base_delay_seconds, follow_up_count, request_count, message) = {
            let mut ctx = lock_context(&self.context);
            let Some(reminder) = ctx.reminders.get_mut(&kind) else {
                return;
            };
            if reminder.generation != generation {
                return;
            }
            // 进入播报阶段后不再可被中止
            reminder.timer.detach();
            let snapshot = (
                reminder.scheduled_at,
                reminder.base_delay_seconds,
                reminder.follow_up_count,
                reminder.request_count,
                reminder.message.clone(),
            );

            if ctx.activity.was_active_since(snapshot.0) {
                ctx.reminders.remove(&kind);
                debug!(kind = %kind, "User active since reminder was scheduled, skipping");
                return;
            }
            snapshot
        };

        info!(kind = %kind, follow_up = follow_up_count, "Firing reminder");
        let playback = tokio::spawn(self.clone().play(kind, generation, request_count, message)).await;

        let mut ctx = lock_context(&self.context);
        let still_armed = ctx
            .reminders
            .get(&kind)
            .is_some_and(|reminder| reminder.generation == generation);
        if !still_armed {
            debug!(kind = %kind, "Reminder cancelled during playback");
            return;
        }

        if let Err(e) = playback {
            warn!(kind = %kind, error = %e, "Reminder playback failed, clearing reminder");
            ctx.reminders.remove(&kind);
            return;
        }

        if ctx.activity.was_active_since(scheduled_at) {
            ctx.reminders.remove(&kind);
            debug!(kind = %kind, "User became active during playback");
            return;
        }

        let next = follow_up_count + 1;
        if self.config.enable_follow_up_reminders && next < self.config.max_follow_up_reminders {
            let wait = self.follow_up_delay(base_delay_seconds, next);
            debug!(kind = %kind, follow_up = next, wait_ms = wait.as_millis() as u64, "Re-arming reminder");
            self.arm(
                &mut ctx,
                kind,
                Arm {
                    base_delay_seconds,
                    follow_up_count: next,
                    request_count,
                    message: ReminderMessage::Select,
                    wait,
                },
            );
        } else {
            ctx.reminders.remove(&kind);
            info!(kind = %kind, firings = next, "Reminders exhausted");
        }
    }

    fn is_current(&self, kind: NotificationKind, generation: u64) -> bool {
        lock_context(&self.context).reminder_is_current(kind, generation)
    }

    /// 唤醒屏幕、调整音量并播报提醒
    async fn play(
        self,
        kind: NotificationKind,
        generation: u64,
        request_count: usize,
        message: ReminderMessage,
    ) {
        let text = match message {
            ReminderMessage::Text(text) => text,
            ReminderMessage::Select => self.messages.select_message(kind, request_count, true).await,
        };
        if !self.is_current(kind, generation) {
            debug!(kind = %kind, "Reminder cancelled during message generation");
            return;
        }

        if self.config.wake_monitor {
            if let Err(e) = self.backends.system.wake_display().await {
                warn!(error = %e, "Failed to wake display");
            }
        }
        if self.config.force_volume {
            if let Err(e) = self.backends.system.ensure_volume(self.config.volume_threshold).await {
                warn!(error = %e, "Failed to adjust volume");
            }
        }
        if (self.config.wake_monitor || self.config.force_volume) && !self.is_current(kind, generation) {
            debug!(kind = %kind, "Reminder cancelled while preparing audio");
            return;
        }

        let options = SpeakOptions {
            engine: None,
            fallback_sound: self.config.sound_for(kind).map(|p| p.to_path_buf()),
        };
        if !self.backends.speech.speak(&text, &options).await {
            warn!(kind = %kind, "Reminder speech produced no output");
        }
    }
}
