//! 用户活动追踪
//!
//! 宿主会对同一条消息的每次修改（例如其他插件注入上下文）重复发送 message-updated 事件，
//! 因此只有首次出现、且创建时间晚于最近一次 idle 的消息才视为用户真实回复。

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::time::Instant;

/// 用户活动状态
#[derive(Debug, Default)]
pub struct ActivityState {
    /// 最近一次真实用户活动（单调时钟，只前进）
    last_activity: Option<Instant>,
    /// 最近一次 idle 转换（墙钟，与消息创建时间比较）
    last_idle: Option<DateTime<Utc>>,
    /// 已见过的消息 ID
    seen_message_ids: HashSet<String>,
}

impl ActivityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_idle_transition(&mut self, now: DateTime<Utc>) {
        self.last_idle = Some(now);
    }

    pub fn last_idle(&self) -> Option<DateTime<Utc>> {
        self.last_idle
    }

    /// 首次见到该消息 ID 时返回 `true`，之后同一 ID 永远返回 `false`
    pub fn is_new_user_message(&mut self, message_id: &str) -> bool {
        self.seen_message_ids.insert(message_id.to_string())
    }

    /// 记录用户活动时间（不会回退）
    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity = Some(match self.last_activity {
            Some(last) if last > now => last,
            _ => now,
        });
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// `timestamp` 之后是否有用户活动
    pub fn was_active_since(&self, timestamp: Instant) -> bool {
        self.last_activity.is_some_and(|last| last > timestamp)
    }

    /// 判断一条用户消息是否是真实活动
    ///
    /// 消息必须是新的；并且创建于最近一次 idle 之后，或者当前没有待触发的提醒。
    /// 缺少创建时间的消息按"刚刚创建"处理。
    pub fn classify_user_message(
        &mut self,
        message_id: &str,
        created_at: Option<DateTime<Utc>>,
        reminders_pending: bool,
    ) -> bool {
        if !self.is_new_user_message(message_id) {
            return false;
        }

        let after_idle = match (created_at, self.last_idle) {
            (Some(created), Some(idle)) => created > idle,
            _ => true,
        };

        after_idle || !reminders_pending
    }

    pub fn seen_message_count(&self) -> usize {
        self.seen_message_ids.len()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
