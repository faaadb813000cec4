//! 请求合并 - 将短时间内到达的多个权限/问题请求合并为一条通知
//!
//! 每个新请求都会重启防抖定时器，请求风暴最终只产生一条带计数的通知。
//! 定时器触发前被全部回复的批次会被直接丢弃。

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::kind::BatchKind;
use super::timer::CancelableTimer;
use crate::context::{lock_context, SharedContext};

/// 单个请求类型的合并状态
#[derive(Debug, Default)]
pub struct BatchState {
    /// 等待合并的请求 ID（保持到达顺序，无重复）
    pending_ids: Vec<String>,
    /// 防抖定时器
    timer: CancelableTimer,
    /// 正在处理的批次代表 ID（用户回复后清空）
    active_id: Option<String>,
}

impl BatchState {
    /// 加入请求，已存在时返回 `false`
    pub fn add(&mut self, id: &str) -> bool {
        if self.pending_ids.iter().any(|existing| existing == id) {
            return false;
        }
        self.pending_ids.push(id.to_string());
        true
    }

    /// 移除请求，返回剩余数量；清空时取消防抖定时器
    pub fn remove(&mut self, id: &str) -> usize {
        self.pending_ids.retain(|existing| existing != id);
        if self.pending_ids.is_empty() {
            self.timer.cancel();
        }
        self.pending_ids.len()
    }

    pub fn pending_ids(&self) -> &[String] {
        &self.pending_ids
    }

    pub fn len(&self) -> usize {
        self.pending_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_ids.is_empty()
    }

    /// 防抖定时器是否在等待
    pub fn is_waiting(&self) -> bool {
        self.timer.is_pending()
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active_id.as_deref() == Some(id)
    }

    /// 若 `id` 是当前活跃请求则清空，返回是否清空
    pub fn clear_active_if(&mut self, id: &str) -> bool {
        if self.is_active(id) {
            self.active_id = None;
            true
        } else {
            false
        }
    }

    fn restart_timer<F>(&mut self, window: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // 旧定时器在赋值时被 drop 并中止
        self.timer = CancelableTimer::start(window, task);
    }

    /// 定时器触发：取出批次，第一个请求成为活跃 ID
    fn take_for_processing(&mut self) -> Vec<String> {
        self.timer.detach();
        let ids = std::mem::take(&mut self.pending_ids);
        if let Some(first) = ids.first() {
            self.active_id = Some(first.clone());
        }
        ids
    }

    pub fn reset(&mut self) {
        self.timer.cancel();
        self.pending_ids.clear();
        self.active_id = None;
    }
}

/// 请求合并器
#[derive(Clone)]
pub struct BatchAggregator {
    context: SharedContext,
}

impl BatchAggregator {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    /// 加入批次并重启防抖定时器，返回当前批次大小
    ///
    /// 定时器到期时以捕获的请求 ID 调用 `on_flush`。
    pub fn add_to_batch<F, Fut>(
        &self,
        kind: BatchKind,
        id: &str,
        window: Duration,
        on_flush: F,
    ) -> usize
    where
        F: FnOnce(Vec<String>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let context = self.context.clone();
        let flush = async move {
            let ids = {
                let mut ctx = lock_context(&context);
                ctx.batch_mut(kind).take_for_processing()
            };
            if ids.is_empty() {
                debug!(kind = %kind, "Batch resolved before flush, nothing to send");
                return;
            }
            debug!(kind = %kind, count = ids.len(), "Flushing batch");
            on_flush(ids).await;
        };

        let mut ctx = lock_context(&self.context);
        let batch = ctx.batch_mut(kind);
        if !batch.add(id) {
            debug!(kind = %kind, id = %id, "Duplicate request id ignored");
        }
        batch.restart_timer(window, flush);
        batch.len()
    }

    /// 从批次移除（用户在合并窗口内已回复），返回剩余数量
    pub fn remove_from_batch(&self, kind: BatchKind, id: &str) -> usize {
        let mut ctx = lock_context(&self.context);
        let batch = ctx.batch_mut(kind);
        let was_waiting = batch.is_waiting();
        let remaining = batch.remove(id);
        if was_waiting && remaining == 0 {
            debug!(kind = %kind, "Batch fully resolved, debounce timer cancelled");
        }
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use std::sync::{Arc, Mutex};

    fn shared() -> SharedContext {
        Arc::new(Mutex::new(SessionContext::default()))
    }

    type Flushed = Arc<Mutex<Vec<Vec<String>>>>;

    fn recorder(flushed: &Flushed) -> impl FnOnce(Vec<String>) -> std::future::Ready<()> + Send + 'static {
        let flushed = flushed.clone();
        move |ids| {
            flushed.lock().unwrap().push(ids);
            std::future::ready(())
        }
    }

    #[test]
    fn test_batch_state_no_duplicates() {
        let mut state = BatchState::default();
        assert!(state.add("p1"));
        assert!(!state.add("p1"));
        assert!(state.add("p2"));
        assert_eq!(state.pending_ids(), &["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn test_clear_active_if() {
        let mut state = BatchState::default();
        state.add("p1");
        state.add("p2");
        let ids = state.take_for_processing();
        assert_eq!(ids.len(), 2);
        assert_eq!(state.active_id(), Some("p1"));

        assert!(!state.clear_active_if("p2"));
        assert!(state.clear_active_if("p1"));
        assert!(state.active_id().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_within_window_coalesce() {
        let context = shared();
        let aggregator = BatchAggregator::new(context.clone());
        let flushed: Flushed = Arc::default();
        let window = Duration::from_millis(800);

        aggregator.add_to_batch(BatchKind::Permission, "p1", window, recorder(&flushed));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let size = aggregator.add_to_batch(BatchKind::Permission, "p2", window, recorder(&flushed));
        assert_eq!(size, 2);

        // 第二个请求重启窗口：第一个请求后 800ms 不应触发
        tokio::time::sleep(Duration::from_millis(760)).await;
        assert!(flushed.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let flushed = flushed.lock().unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0], vec!["p1".to_string(), "p2".to_string()]);

        let ctx = lock_context(&context);
        assert!(ctx.batches[&BatchKind::Permission].is_empty());
        assert_eq!(ctx.batches[&BatchKind::Permission].active_id(), Some("p1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_reduces_count() {
        let aggregator = BatchAggregator::new(shared());
        let flushed: Flushed = Arc::default();
        let window = Duration::from_millis(800);

        aggregator.add_to_batch(BatchKind::Permission, "p1", window, recorder(&flushed));
        tokio::time::sleep(Duration::from_millis(50)).await;
        aggregator.add_to_batch(BatchKind::Permission, "p2", window, recorder(&flushed));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(aggregator.remove_from_batch(BatchKind::Permission, "p1"), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let flushed = flushed.lock().unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0], vec!["p2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fully_resolved_batch_never_flushes() {
        let context = shared();
        let aggregator = BatchAggregator::new(context.clone());
        let flushed: Flushed = Arc::default();
        let window = Duration::from_millis(800);

        aggregator.add_to_batch(BatchKind::Question, "q1", window, recorder(&flushed));
        assert_eq!(aggregator.remove_from_batch(BatchKind::Question, "q1"), 0);
        assert!(!lock_context(&context).batches[&BatchKind::Question].is_waiting());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(flushed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_batch_independently() {
        let aggregator = BatchAggregator::new(shared());
        let flushed: Flushed = Arc::default();
        let window = Duration::from_millis(100);

        aggregator.add_to_batch(BatchKind::Permission, "p1", window, recorder(&flushed));
        aggregator.add_to_batch(BatchKind::Question, "q1", window, recorder(&flushed));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(flushed.lock().unwrap().len(), 2);
    }
}
