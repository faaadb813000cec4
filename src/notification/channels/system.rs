//! 系统控制 - 唤醒屏幕、强制音量

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::command::{run_first_available, CommandSpec};
use crate::notification::backend::SystemControl;

const SYSTEM_TIMEOUT: Duration = Duration::from_secs(5);

/// 基于系统命令的控制后端
#[derive(Debug, Clone, Default)]
pub struct CommandSystem;

impl CommandSystem {
    pub fn new() -> Self {
        Self
    }

    fn wake_commands() -> Vec<CommandSpec> {
        if cfg!(target_os = "macos") {
            vec![CommandSpec::new("caffeinate", &["-u", "-t", "1"])]
        } else if cfg!(target_os = "windows") {
            Vec::new()
        } else {
            vec![CommandSpec::new("xset", &["dpms", "force", "on"])]
        }
    }

    async fn current_volume(&self) -> Result<u8> {
        let output = if cfg!(target_os = "macos") {
            CommandSpec::new("osascript", &["-e", "output volume of (get volume settings)"])
                .output(SYSTEM_TIMEOUT)
                .await?
        } else {
            CommandSpec::new("pactl", &["get-sink-volume", "@DEFAULT_SINK@"])
                .output(SYSTEM_TIMEOUT)
                .await?
        };
        parse_volume(&output).ok_or_else(|| anyhow!("Unrecognized volume output: {}", output.trim()))
    }

    async fn set_volume(&self, level: u8) -> Result<()> {
        let command = if cfg!(target_os = "macos") {
            let script = format!("set volume output volume {}", level);
            CommandSpec::new("osascript", &["-e", script.as_str()])
        } else {
            let percent = format!("{}%", level);
            CommandSpec::new("pactl", &["set-sink-volume", "@DEFAULT_SINK@", percent.as_str()])
        };
        command.run(SYSTEM_TIMEOUT).await
    }
}

/// 从 `osascript`（纯数字）或 `pactl`（`... 45% ...`）输出中解析音量
pub fn parse_volume(output: &str) -> Option<u8> {
    let trimmed = output.trim();
    if let Ok(level) = trimmed.parse::<u8>() {
        return Some(level);
    }
    trimmed
        .split_whitespace()
        .find_map(|token| token.strip_suffix('%'))
        .and_then(|n| n.parse::<u16>().ok())
        .map(|n| n.min(u16::from(u8::MAX)) as u8)
}

#[async_trait]
impl SystemControl for CommandSystem {
    async fn wake_display(&self) -> Result<()> {
        let commands = Self::wake_commands();
        if commands.is_empty() {
            return Ok(());
        }
        run_first_available(&commands, SYSTEM_TIMEOUT)
            .await
            .map(|_| ())
            .context("Failed to wake display")
    }

    async fn ensure_volume(&self, threshold: u8) -> Result<()> {
        if cfg!(target_os = "windows") {
            return Ok(());
        }
        let current = self.current_volume().await?;
        if current >= threshold {
            return Ok(());
        }
        debug!(current, threshold, "Raising output volume");
        self.set_volume(threshold).await
    }
}
