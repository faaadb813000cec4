//! 测试用的记录型后端

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::backend::*;
use super::kind::NotificationKind;

#[derive(Default)]
struct Inner {
    spoken: Mutex<Vec<(Instant, String)>>,
    completed_speech: AtomicUsize,
    speech_duration: Mutex<Duration>,
    speech_panics: AtomicBool,
    sounds: Mutex<Vec<(Instant, PathBuf, u32)>>,
    sound_duration: Mutex<Duration>,
    system_delay: Mutex<Duration>,
    toasts: Mutex<Vec<String>>,
    desktop: Mutex<Vec<String>>,
    webhooks: Mutex<Vec<(NotificationKind, String)>>,
    parents: Mutex<HashMap<String, String>>,
}

/// 记录所有后端调用
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Arc<Inner>,
}

impl Recorder {
    pub fn set_speech_duration(&self, duration: Duration) {
        *self.inner.speech_duration.lock().unwrap() = duration;
    }

    pub fn set_speech_panics(&self, panics: bool) {
        self.inner.speech_panics.store(panics, Ordering::SeqCst);
    }

    pub fn set_sound_duration(&self, duration: Duration) {
        *self.inner.sound_duration.lock().unwrap() = duration;
    }

    /// 唤醒屏幕 / 调整音量的耗时
    pub fn set_system_delay(&self, delay: Duration) {
        *self.inner.system_delay.lock().unwrap() = delay;
    }

    async fn system_wait(&self) {
        let delay = *self.inner.system_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn set_parent(&self, session_id: &str, parent_id: &str) {
        self.inner
            .parents
            .lock()
            .unwrap()
            .insert(session_id.to_string(), parent_id.to_string());
    }

    pub fn speech_count(&self) -> usize {
        self.inner.spoken.lock().unwrap().len()
    }

    pub fn speech_times(&self) -> Vec<Instant> {
        self.inner.spoken.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.inner
            .spoken
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn completed_speech_count(&self) -> usize {
        self.inner.completed_speech.load(Ordering::SeqCst)
    }

    pub fn sound_count(&self) -> usize {
        self.inner.sounds.lock().unwrap().len()
    }

    pub fn sound_loops(&self) -> Vec<u32> {
        self.inner.sounds.lock().unwrap().iter().map(|(_, _, loops)| *loops).collect()
    }

    pub fn toast_count(&self) -> usize {
        self.inner.toasts.lock().unwrap().len()
    }

    pub fn desktop_count(&self) -> usize {
        self.inner.desktop.lock().unwrap().len()
    }

    pub fn webhook_kinds(&self) -> Vec<NotificationKind> {
        self.inner.webhooks.lock().unwrap().iter().map(|(kind, _)| *kind).collect()
    }
}

#[async_trait]
impl SpeechBackend for Recorder {
    async fn speak(&self, text: &str, _options: &SpeakOptions) -> bool {
        if self.inner.speech_panics.load(Ordering::SeqCst) {
            panic!("speech backend exploded");
        }
        self.inner
            .spoken
            .lock()
            .unwrap()
            .push((Instant::now(), text.to_string()));
        let duration = *self.inner.speech_duration.lock().unwrap();
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        self.inner.completed_speech.fetch_add(1, Ordering::SeqCst);
        true
    }
}

#[async_trait]
impl SoundBackend for Recorder {
    async fn play(&self, path: &Path, loops: u32) -> Result<()> {
        self.inner
            .sounds
            .lock()
            .unwrap()
            .push((Instant::now(), path.to_path_buf(), loops));
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
        self.inner.toasts.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

#[async_trait]
impl DesktopNotifier for Recorder {
    async fn notify(&self, _title: &str, message: &str, _options: &DesktopOptions) -> SendResult {
        self.inner.desktop.lock().unwrap().push(message.to_string());
        SendResult::Sent
    }
}

#[async_trait]
impl WebhookBackend for Recorder {
    async fn notify(
        &self,
        kind: NotificationKind,
        message: &str,
        _options: &WebhookOptions,
    ) -> SendResult {
        self.inner
            .webhooks
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
        SendResult::Sent
    }
}

#[async_trait]
impl SessionQuery for Recorder {
    async fn parent_of(&self, session_id: &str) -> Result<Option<String>> {
        Ok(self.inner.parents.lock().unwrap().get(session_id).cloned())
    }
}

#[async_trait]
impl SystemControl for Recorder {
    async fn wake_display(&self) -> Result<()> {
        self.system_wait().await;
        Ok(())
    }

    async fn ensure_volume(&self, _threshold: u8) -> Result<()> {
        self.system_wait().await;
        Ok(())
    }
}

/// 等待一段时间后返回固定文本的生成器
pub struct DelayedGenerator {
    pub delay: Duration,
    pub text: String,
}

impl DelayedGenerator {
    pub fn shared(delay: Duration, text: &str) -> Arc<dyn MessageGenerator> {
        Arc::new(Self {
            delay,
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl MessageGenerator for DelayedGenerator {
    async fn generate(&self, _request: &MessageRequest) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.text.clone())
    }
}

/// 全部后端指向同一个 Recorder
pub fn recording_backends() -> (Backends, Recorder) {
    let recorder = Recorder::default();
    let shared = Arc::new(recorder.clone());
    let backends = Backends {
        speech: shared.clone(),
        sound: shared.clone(),
        toast: shared.clone(),
        desktop: shared.clone(),
        webhook: shared.clone(),
        sessions: shared.clone(),
        system: shared,
        generator: None,
    };
    (backends, recorder)
}
