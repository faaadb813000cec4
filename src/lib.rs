//! Smart Voice Notify - 编码代理生命周期事件的语音提醒与升级通知

pub mod config;
pub mod context;
pub mod event;
pub mod notification;
pub mod router;

pub use config::{NotificationMode, NotifyConfig};
pub use context::{SessionContext, SharedContext};
pub use event::{HostEvent, RouterEvent};
pub use notification::{Backends, BackendsBuilder, BatchKind, NotificationKind, SendResult};
pub use router::EventRouter;
