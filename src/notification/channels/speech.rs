//! 语音合成（say / espeak-ng / espeak / spd-say / PowerShell System.Speech）
//!
//! 按顺序尝试可用引擎，全部失败时播放回退提示音。

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::command::{escape_powershell, CommandSpec};
use crate::notification::backend::{SoundBackend, SpeakOptions, SpeechBackend};

/// 单次播报超时
const SPEAK_TIMEOUT: Duration = Duration::from_secs(60);

/// 基于系统命令的语音后端
#[derive(Clone)]
pub struct CommandSpeech {
    fallback: Arc<dyn SoundBackend>,
}

impl CommandSpeech {
    pub fn new(fallback: Arc<dyn SoundBackend>) -> Self {
        Self { fallback }
    }

    /// 当前平台的引擎列表（按优先级）
    ///
    /// 文本前加 `--`，以 `-` 开头的文本不会被当作选项。
    pub fn engines(text: &str) -> Vec<CommandSpec> {
        if cfg!(target_os = "macos") {
            vec![CommandSpec::new("say", &["--", text])]
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
                escape_powershell(text)
            );
            vec![CommandSpec::new("powershell", &["-NoProfile", "-Command", script.as_str()])]
        } else {
            vec![
                CommandSpec::new("espeak-ng", &["--", text]),
                CommandSpec::new("espeak", &["--", text]),
                CommandSpec::new("spd-say", &["--wait", "--", text]),
            ]
        }
    }

    /// 指定引擎时把它排到最前面
    fn ordered_engines(text: &str, preferred: Option<&str>) -> Vec<CommandSpec> {
        let mut engines = Self::engines(text);
        if let Some(name) = preferred {
            if let Some(pos) = engines.iter().position(|e| e.program == name) {
                let engine = engines.remove(pos);
                engines.insert(0, engine);
            }
        }
        engines
    }
}

#[async_trait]
impl SpeechBackend for CommandSpeech {
    async fn speak(&self, text: &str, options: &SpeakOptions) -> bool {
        for engine in Self::ordered_engines(text, options.engine.as_deref()) {
            if !engine.is_available() {
                continue;
            }
            match engine.run(SPEAK_TIMEOUT).await {
                Ok(()) => {
                    debug!(engine = %engine.program, "Speech played");
                    return true;
                }
                Err(e) => warn!(engine = %engine.program, error = %e, "Speech engine failed"),
            }
        }

        warn!("No speech engine succeeded");
        if let Some(sound) = options.fallback_sound.as_deref() {
            if let Err(e) = self.fallback.play(sound, 1).await {
                warn!(error = %e, "Fallback sound failed");
            }
        }
        false
    }
}
