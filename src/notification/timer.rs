//! 可取消定时器 - 基于 tokio task 的延迟执行

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// 可取消定时器
///
/// 延迟 `delay` 后执行任务。`cancel()` 或 drop 会中止尚未开始的任务；
/// 任务开始执行后应调用 `detach()`，此后不再能被中止。
#[derive(Debug, Default)]
pub struct CancelableTimer {
    handle: Option<JoinHandle<()>>,
}

impl CancelableTimer {
    /// 启动定时器（必须在 tokio runtime 中调用）
    pub fn start<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self {
            handle: Some(handle),
        }
    }

    /// 取消定时器（幂等）
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// 是否仍在等待触发
    pub fn is_pending(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 放弃句柄，任务继续运行但不再可取消
    pub fn detach(&mut self) {
        self.handle.take();
    }
}

impl Drop for CancelableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let counter = Arc::new(AtomicUsize::new(0));
        let timer = CancelableTimer::start(Duration::from_millis(100), counting_task(&counter));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut timer = CancelableTimer::start(Duration::from_millis(100), counting_task(&counter));

        timer.cancel();
        timer.cancel(); // 幂等
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let _timer = CancelableTimer::start(Duration::from_millis(100), counting_task(&counter));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_timer_survives_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut timer =
                CancelableTimer::start(Duration::from_millis(100), counting_task(&counter));
            timer.detach();
            assert!(!timer.is_pending());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
