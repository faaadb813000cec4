//! 会话上下文 - 进程内唯一的可变共享状态
//!
//! 持有用户活动状态、每种通知类型的待触发提醒、每种请求类型的合并状态和 idle 防抖记录。
//! 所有访问都在同步代码段内完成，锁永远不会跨越 await 持有。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::notification::activity::ActivityState;
use crate::notification::batch::BatchState;
use crate::notification::debounce::IdleDebouncer;
use crate::notification::kind::{BatchKind, NotificationKind};
use crate::notification::reminder::ReminderMessage;
use crate::notification::timer::CancelableTimer;

/// 共享的会话上下文
pub type SharedContext = Arc<Mutex<SessionContext>>;

/// 获取上下文锁（锁中毒时继续使用内部数据）
pub fn lock_context(context: &SharedContext) -> MutexGuard<'_, SessionContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 已安排的提醒
#[derive(Debug)]
pub struct PendingReminder {
    pub kind: NotificationKind,
    /// 安排序号，用于识别被替换的旧定时器
    pub generation: u64,
    pub timer: CancelableTimer,
    pub scheduled_at: Instant,
    /// 首次提醒延迟（秒），后续提醒按倍数递增
    pub base_delay_seconds: f64,
    pub follow_up_count: u32,
    /// 安排时的请求数量，后续提醒沿用
    pub request_count: usize,
    /// 下一次触发使用的消息
    pub message: ReminderMessage,
}

/// 会话上下文
#[derive(Debug, Default)]
pub struct SessionContext {
    pub activity: ActivityState,
    pub reminders: HashMap<NotificationKind, PendingReminder>,
    pub batches: HashMap<BatchKind, BatchState>,
    pub idle_debounce: IdleDebouncer,
    /// 问题请求 ID -> 子问题数量
    pub question_counts: HashMap<String, usize>,
    /// 单调递增，reset 时不清零
    next_generation: u64,
    /// 会话纪元，每次 reset 加一
    epoch: u64,
}

impl SessionContext {
    pub fn new(idle_debounce: Duration) -> Self {
        Self {
            idle_debounce: IdleDebouncer::with_window(idle_debounce),
            ..Default::default()
        }
    }

    pub fn shared(idle_debounce: Duration) -> SharedContext {
        Arc::new(Mutex::new(Self::new(idle_debounce)))
    }

    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// 当前会话纪元，重置前发起的流程据此识别自己已过期
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 提醒仍是同一次安排，且安排后用户没有活动
    pub fn reminder_is_current(&self, kind: NotificationKind, generation: u64) -> bool {
        self.reminders.get(&kind).is_some_and(|reminder| {
            reminder.generation == generation
                && !self.activity.was_active_since(reminder.scheduled_at)
        })
    }

    pub fn batch_mut(&mut self, kind: BatchKind) -> &mut BatchState {
        self.batches.entry(kind).or_default()
    }

    pub fn has_pending_reminders(&self) -> bool {
        !self.reminders.is_empty()
    }

    pub fn pending_reminder_kinds(&self) -> Vec<NotificationKind> {
        NotificationKind::ALL
            .into_iter()
            .filter(|kind| self.reminders.contains_key(kind))
            .collect()
    }

    /// 取消指定类型的提醒（幂等），返回是否存在
    pub fn cancel_reminder(&mut self, kind: NotificationKind) -> bool {
        match self.reminders.remove(&kind) {
            Some(mut reminder) => {
                reminder.timer.cancel();
                debug!(kind = %kind, "Reminder cancelled");
                true
            }
            None => false,
        }
    }

    /// 取消所有提醒，返回取消数量
    pub fn cancel_all_reminders(&mut self) -> usize {
        NotificationKind::ALL
            .into_iter()
            .filter(|kind| self.cancel_reminder(*kind))
            .count()
    }

    /// 记录用户活动并取消所有提醒
    pub fn register_user_activity(&mut self, now: Instant) -> usize {
        self.activity.record_activity(now);
        self.cancel_all_reminders()
    }

    /// 是否还有待触发的提醒或等待中的批次
    pub fn has_pending_work(&self) -> bool {
        self.has_pending_reminders() || self.batches.values().any(|batch| !batch.is_empty())
    }

    /// 新会话开始：清空全部状态
    pub fn reset(&mut self) {
        let cancelled = self.cancel_all_reminders();
        for batch in self.batches.values_mut() {
            batch.reset();
        }
        self.batches.clear();
        self.activity.reset();
        self.idle_debounce.clear();
        self.question_counts.clear();
        self.epoch += 1;
        debug!(cancelled_reminders = cancelled, epoch = self.epoch, "Session context reset");
    }
}
