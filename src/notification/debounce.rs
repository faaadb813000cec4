//! idle 事件防抖 - 抑制短时间内重复触发的 idle 事件
//!
//! 部分宿主会在 ~100ms 内对同一会话发送两次 idle 事件，
//! 不做防抖会触发两轮完整的通知流程。

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// 默认防抖窗口
pub const DEFAULT_IDLE_DEBOUNCE: Duration = Duration::from_millis(5000);

/// idle 事件防抖器
#[derive(Debug)]
pub struct IdleDebouncer {
    /// 防抖窗口
    window: Duration,
    /// 每个会话最近一次被接受的 idle 时间
    last_accepted: HashMap<String, Instant>,
}

impl IdleDebouncer {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_IDLE_DEBOUNCE)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// 是否处理该 idle 事件
    ///
    /// 窗口内的重复事件返回 `false`（不刷新时间戳）；否则记录 `now` 并返回 `true`。
    pub fn should_process_idle(&mut self, session_id: &str, now: Instant) -> bool {
        if let Some(last) = self.last_accepted.get(session_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                debug!(
                    session_id = %session_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Idle event debounced"
                );
                return false;
            }
        }

        self.last_accepted.insert(session_id.to_string(), now);
        true
    }

    /// 清除指定会话的记录
    pub fn reset(&mut self, session_id: &str) {
        self.last_accepted.remove(session_id);
    }

    pub fn clear(&mut self) {
        self.last_accepted.clear();
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for IdleDebouncer {
    fn default() -> Self {
        Self::new()
    }
}
