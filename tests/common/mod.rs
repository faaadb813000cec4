//! 集成测试共用的记录型后端

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use smart_voice_notify::notification::backend::*;
use smart_voice_notify::notification::NotificationKind;
use smart_voice_notify::{EventRouter, HostEvent, NotifyConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// 一次后端调用
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Speak(String),
    Sound { path: PathBuf, loops: u32 },
    Toast(String),
    Desktop(String),
    Webhook(NotificationKind),
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<(Instant, Call)>>,
    sound_duration: Mutex<Duration>,
    side_channels_fail: AtomicBool,
}

/// 记录所有后端调用（带时间戳）
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Inner>,
}

impl Recorder {
    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push((Instant::now(), call));
    }

    pub fn set_sound_duration(&self, duration: Duration) {
        *self.inner.sound_duration.lock().unwrap() = duration;
    }

    /// Toast / 桌面通知 / Webhook 全部返回失败（调用仍被记录）
    pub fn set_side_channels_fail(&self, fail: bool) {
        self.inner.side_channels_fail.store(fail, Ordering::SeqCst);
    }

    fn side_channels_fail(&self) -> bool {
        self.inner.side_channels_fail.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(Instant, Call)> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn speeches(&self) -> Vec<(Instant, String)> {
        self.calls()
            .into_iter()
            .filter_map(|(t, call)| match call {
                Call::Speak(text) => Some((t, text)),
                _ => None,
            })
            .collect()
    }

    pub fn sounds(&self) -> Vec<(Instant, PathBuf, u32)> {
        self.calls()
            .into_iter()
            .filter_map(|(t, call)| match call {
                Call::Sound { path, loops } => Some((t, path, loops)),
                _ => None,
            })
            .collect()
    }

    pub fn desktop_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|(_, call)| match call {
                Call::Desktop(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SpeechBackend for Recorder {
    async fn speak(&self, text: &str, _options: &SpeakOptions) -> bool {
        self.record(Call::Speak(text.to_string()));
        true
    }
}

#[async_trait]
impl SoundBackend for Recorder {
    async fn play(&self, path: &Path, loops: u32) -> Result<()> {
        self.record(Call::Sound {
            path: path.to_path_buf(),
            loops,
        });
        let duration = *self.inner.sound_duration.lock().unwrap();
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ToastBackend for Recorder {
    async fn show(&self, message: &str, _variant: ToastVariant, _duration: Duration) -> Result<()> {
        self.record(Call::Toast(message.to_string()));
        if self.side_channels_fail() {
            return Err(anyhow!("toast host unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl DesktopNotifier for Recorder {
    async fn notify(&self, _title: &str, message: &str, _options: &DesktopOptions) -> SendResult {
        self.record(Call::Desktop(message.to_string()));
        if self.side_channels_fail() {
            return SendResult::Failed("notification daemon not running".to_string());
        }
        SendResult::Sent
    }
}

#[async_trait]
impl WebhookBackend for Recorder {
    async fn notify(
        &self,
        kind: NotificationKind,
        _message: &str,
        _options: &WebhookOptions,
    ) -> SendResult {
        self.record(Call::Webhook(kind));
        if self.side_channels_fail() {
            return SendResult::Failed("HTTP 500".to_string());
        }
        SendResult::Sent
    }
}

#[async_trait]
impl SystemControl for Recorder {
    async fn wake_display(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_volume(&self, _threshold: u8) -> Result<()> {
        Ok(())
    }
}

/// 测试配置：每种类型都有提示音，关闭 Toast 和桌面通知
pub fn test_config() -> NotifyConfig {
    NotifyConfig {
        idle_sound: Some(PathBuf::from("/sounds/idle.wav")),
        permission_sound: Some(PathBuf::from("/sounds/permission.wav")),
        question_sound: Some(PathBuf::from("/sounds/question.wav")),
        error_sound: Some(PathBuf::from("/sounds/error.wav")),
        enable_toast: false,
        enable_desktop_notification: false,
        wake_monitor: false,
        ..Default::default()
    }
}

/// 会话关系使用真实的缓存实现，其余后端指向 Recorder
pub fn router_with(config: NotifyConfig) -> (EventRouter, Recorder) {
    let recorder = Recorder::default();
    let shared = Arc::new(recorder.clone());
    let backends = Backends {
        speech: shared.clone(),
        sound: shared.clone(),
        toast: shared.clone(),
        desktop: shared.clone(),
        webhook: shared.clone(),
        sessions: Arc::new(smart_voice_notify::notification::channels::ParentCache::new()),
        system: shared,
        generator: None,
    };
    (EventRouter::new(config, backends), recorder)
}

pub fn event(event_type: &str, properties: serde_json::Value) -> HostEvent {
    HostEvent::new(event_type, properties)
}

/// 相对 `start` 的毫秒数
pub fn millis_since(start: Instant, times: impl IntoIterator<Item = Instant>) -> Vec<u128> {
    times.into_iter().map(|t| (t - start).as_millis()).collect()
}
