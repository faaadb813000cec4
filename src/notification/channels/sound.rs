//! 提示音播放（afplay / paplay / aplay / PowerShell）

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::command::{escape_powershell, run_first_available, CommandSpec};
use crate::notification::backend::SoundBackend;

/// 单次播放超时
const PLAY_TIMEOUT: Duration = Duration::from_secs(30);

/// 基于系统播放器的提示音后端
#[derive(Debug, Clone, Default)]
pub struct CommandSound;

impl CommandSound {
    pub fn new() -> Self {
        Self
    }

    /// 当前平台的候选播放命令
    pub fn candidates(path: &Path) -> Vec<CommandSpec> {
        let file = path.to_string_lossy().to_string();
        if cfg!(target_os = "macos") {
            vec![CommandSpec::new("afplay", &[file.as_str()])]
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "(New-Object Media.SoundPlayer '{}').PlaySync()",
                escape_powershell(&file)
            );
            vec![CommandSpec::new("powershell", &["-NoProfile", "-Command", script.as_str()])]
        } else {
            vec![
                CommandSpec::new("paplay", &[file.as_str()]),
                CommandSpec::new("aplay", &["-q", file.as_str()]),
            ]
        }
    }
}

#[async_trait]
impl SoundBackend for CommandSound {
    async fn play(&self, path: &Path, loops: u32) -> Result<()> {
        if !path.exists() {
            bail!("Sound file not found: {}", path.display());
        }
        let candidates = Self::candidates(path);
        for _ in 0..loops.max(1) {
            let player = run_first_available(&candidates, PLAY_TIMEOUT).await?;
            debug!(player = %player, path = %path.display(), "Sound played");
        }
        Ok(())
    }
}
