//! 事件路由 - 宿主事件的唯一入口
//!
//! 路由策略：
//! - 用户消息 → 活动分类，真实活动取消全部提醒
//! - 权限/问题请求 → 合并窗口，到期后统一通知
//! - 权限/问题回复 → 移出批次，清除活跃 ID，取消提醒
//! - idle → 子会话过滤 → 防抖 → 记录 idle 时间 → 通知
//! - error → 子会话过滤 → 通知
//! - 新会话 → 重置全部状态（子会话除外）
//!
//! `on_event` 只完成同步状态修改和后台任务派发，不等待提醒触发，也不返回错误。

use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::context::{lock_context, SessionContext, SharedContext};
use crate::event::{HostEvent, RouterEvent};
use crate::notification::backend::Backends;
use crate::notification::batch::BatchAggregator;
use crate::notification::kind::{BatchKind, NotificationKind};
use crate::notification::message::MessageSelector;
use crate::notification::orchestrator::{AbortCheck, NotificationOrchestrator, NotifyRequest};
use crate::notification::reminder::ReminderScheduler;

/// 进行中的通知流程计数（drop 时减一）
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 事件路由器
#[derive(Clone)]
pub struct EventRouter {
    context: SharedContext,
    config: Arc<NotifyConfig>,
    backends: Backends,
    batches: BatchAggregator,
    reminders: ReminderScheduler,
    orchestrator: NotificationOrchestrator,
    in_flight: Arc<AtomicUsize>,
}

impl EventRouter {
    pub fn new(config: NotifyConfig, backends: Backends) -> Self {
        let config = Arc::new(config);
        let context = SessionContext::shared(config.idle_debounce());
        let messages = MessageSelector::new(config.clone(), backends.generator.clone());
        let reminders = ReminderScheduler::new(
            context.clone(),
            config.clone(),
            backends.clone(),
            messages.clone(),
        );
        let orchestrator = NotificationOrchestrator::new(
            context.clone(),
            config.clone(),
            backends.clone(),
            messages,
            reminders.clone(),
        );

        Self {
            batches: BatchAggregator::new(context.clone()),
            context,
            config,
            backends,
            reminders,
            orchestrator,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// 处理一个宿主事件
    pub async fn on_event(&self, event: &HostEvent) {
        if !self.config.enabled {
            return;
        }
        match RouterEvent::normalize(event) {
            Some(normalized) => self.handle(normalized).await,
            None => debug!(event_type = %event.event_type, "Ignoring event"),
        }
    }

    /// 处理归一化后的事件
    pub async fn handle(&self, event: RouterEvent) {
        match event {
            RouterEvent::UserMessage {
                message_id,
                created_at,
            } => self.handle_user_message(&message_id, created_at),
            RouterEvent::Requested { kind, id, count } => self.handle_request(kind, id, count),
            RouterEvent::Replied { kind, id } => self.handle_reply(kind, &id),
            RouterEvent::SessionIdle { session_id } => self.handle_idle(session_id).await,
            RouterEvent::SessionError {
                session_id,
                message,
            } => self.handle_error(session_id, message).await,
            RouterEvent::SessionCreated {
                session_id,
                parent_id,
            } => self.handle_session_created(&session_id, parent_id.as_deref()),
        }
    }

    fn handle_user_message(&self, message_id: &str, created_at: Option<chrono::DateTime<Utc>>) {
        let mut ctx = lock_context(&self.context);
        let pending = ctx.has_pending_reminders();
        if !ctx
            .activity
            .classify_user_message(message_id, created_at, pending)
        {
            debug!(message_id = %message_id, "Message update is not new user activity");
            return;
        }
        let cancelled = ctx.register_user_activity(Instant::now());
        if cancelled > 0 {
            info!(message_id = %message_id, cancelled, "User replied, reminders cancelled");
        }
    }

    fn handle_request(&self, kind: BatchKind, id: String, count: usize) {
        if kind == BatchKind::Question {
            lock_context(&self.context)
                .question_counts
                .insert(id.clone(), count.max(1));
        }

        // 计数随定时器 future 存活，覆盖从取出批次到通知结束的整个区间
        let guard = InFlight::enter(&self.in_flight);
        let router = self.clone();
        let size = self.batches.add_to_batch(
            kind,
            &id,
            self.config.batch_window(kind),
            move |ids| async move {
                let _guard = guard;
                router.process_batch(kind, ids).await
            },
        );
        debug!(kind = %kind, id = %id, batch_size = size, "Request added to batch");
    }

    fn handle_reply(&self, kind: BatchKind, id: &str) {
        let remaining = self.batches.remove_from_batch(kind, id);
        let mut ctx = lock_context(&self.context);
        ctx.question_counts.remove(id);
        let was_active = ctx.batch_mut(kind).clear_active_if(id);
        ctx.register_user_activity(Instant::now());
        ctx.cancel_reminder(kind.notification_kind());
        info!(
            kind = %kind,
            id = %id,
            remaining,
            was_active,
            "Request replied"
        );
    }

    /// 子会话返回 `true`；查询失败时按根会话处理
    async fn is_sub_session(&self, session_id: &str) -> bool {
        match self.backends.sessions.parent_of(session_id).await {
            Ok(Some(parent)) => {
                debug!(session_id = %session_id, parent_id = %parent, "Ignoring sub-session");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Session lookup failed, treating as root");
                false
            }
        }
    }

    async fn handle_idle(&self, session_id: String) {
        if self.is_sub_session(&session_id).await {
            return;
        }

        let epoch = {
            let mut ctx = lock_context(&self.context);
            if !ctx.idle_debounce.should_process_idle(&session_id, Instant::now()) {
                return;
            }
            ctx.activity.record_idle_transition(Utc::now());
            ctx.epoch()
        };

        info!(session_id = %session_id, "Session idle");
        let request = NotifyRequest::for_kind(&self.config, NotificationKind::Idle, 1)
            .with_abort(AbortCheck::UserActivity)
            .with_session_id(Some(session_id))
            .in_epoch(epoch);
        self.spawn_notify(NotificationKind::Idle, request);
    }

    async fn handle_error(&self, session_id: String, message: Option<String>) {
        if self.is_sub_session(&session_id).await {
            return;
        }

        warn!(session_id = %session_id, error = ?message, "Session error");
        let epoch = lock_context(&self.context).epoch();
        let mut request = NotifyRequest::for_kind(&self.config, NotificationKind::Error, 1)
            .with_session_id(Some(session_id))
            .in_epoch(epoch);
        if let Some(message) = message {
            request = request.with_summary(message);
        }
        self.spawn_notify(NotificationKind::Error, request);
    }

    fn handle_session_created(&self, session_id: &str, parent_id: Option<&str>) {
        self.backends.sessions.record_session(session_id, parent_id);
        if parent_id.is_some() {
            debug!(session_id = %session_id, "Sub-session created, keeping state");
            return;
        }
        lock_context(&self.context).reset();
        info!(session_id = %session_id, "New session, state reset");
    }

    fn spawn_notify(&self, kind: NotificationKind, request: NotifyRequest) {
        let guard = InFlight::enter(&self.in_flight);
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            let _guard = guard;
            orchestrator.notify(kind, request).await;
        });
    }

    /// 合并窗口到期：计算总数并通知
    async fn process_batch(&self, kind: BatchKind, ids: Vec<String>) {
        let Some(active_id) = ids.first().cloned() else {
            return;
        };

        let (count, epoch) = {
            let mut ctx = lock_context(&self.context);
            let count = match kind {
                BatchKind::Permission => ids.len(),
                // 子问题数量读取后即移除
                BatchKind::Question => ids
                    .iter()
                    .map(|id| ctx.question_counts.remove(id).unwrap_or(1))
                    .sum(),
            };
            (count, ctx.epoch())
        };
        info!(kind = %kind, requests = ids.len(), count, "Processing batch");

        let notification = kind.notification_kind();
        let request = NotifyRequest::for_kind(&self.config, notification, count)
            .with_abort(AbortCheck::RequestResolved {
                batch: kind,
                active_id,
            })
            .in_epoch(epoch);
        self.orchestrator.notify(notification, request).await;
    }

    /// 是否还有待触发的提醒、等待中的批次或进行中的通知
    pub fn has_pending_work(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0 || lock_context(&self.context).has_pending_work()
    }

    pub fn pending_reminders(&self) -> Vec<NotificationKind> {
        lock_context(&self.context).pending_reminder_kinds()
    }

    pub fn is_reminder_armed(&self, kind: NotificationKind) -> bool {
        self.reminders.is_armed(kind)
    }

    /// 当前批次中等待合并的请求 ID
    pub fn pending_batch(&self, kind: BatchKind) -> Vec<String> {
        lock_context(&self.context)
            .batches
            .get(&kind)
            .map(|batch| batch.pending_ids().to_vec())
            .unwrap_or_default()
    }

    pub fn active_request(&self, kind: BatchKind) -> Option<String> {
        lock_context(&self.context)
            .batches
            .get(&kind)
            .and_then(|batch| batch.active_id().map(str::to_string))
    }

    /// 取消所有提醒（退出时使用）
    pub fn shutdown(&self) {
        let mut ctx = lock_context(&self.context);
        let cancelled = ctx.cancel_all_reminders();
        for batch in ctx.batches.values_mut() {
            batch.reset();
        }
        debug!(cancelled, "Router shut down");
    }
}
