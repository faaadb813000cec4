//! 桌面通知（osascript / notify-send）

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::command::{escape_applescript, CommandSpec};
use crate::notification::backend::{DesktopNotifier, DesktopOptions, SendResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// 系统桌面通知
#[derive(Debug, Clone, Default)]
pub struct CommandDesktop;

impl CommandDesktop {
    pub fn new() -> Self {
        Self
    }

    pub fn command(title: &str, message: &str, options: &DesktopOptions) -> Option<CommandSpec> {
        if cfg!(target_os = "macos") {
            let mut script = format!(
                "display notification \"{}\" with title \"{}\"",
                escape_applescript(message),
                escape_applescript(title)
            );
            if let Some(subtitle) = &options.subtitle {
                script.push_str(&format!(" subtitle \"{}\"", escape_applescript(subtitle)));
            }
            Some(CommandSpec::new("osascript", &["-e", script.as_str()]))
        } else if cfg!(target_os = "windows") {
            None
        } else {
            let urgency = if options.urgent { "critical" } else { "normal" };
            let expire = options
                .timeout
                .unwrap_or(DEFAULT_TIMEOUT)
                .as_millis()
                .to_string();
            Some(CommandSpec::new(
                "notify-send",
                &["-u", urgency, "-t", expire.as_str(), title, message],
            ))
        }
    }
}

#[async_trait]
impl DesktopNotifier for CommandDesktop {
    async fn notify(&self, title: &str, message: &str, options: &DesktopOptions) -> SendResult {
        let Some(command) = Self::command(title, message, options) else {
            return SendResult::Skipped("desktop notifications unsupported on this platform".to_string());
        };
        if !command.is_available() {
            return SendResult::Skipped(format!("{} not found", command.program));
        }

        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        match command.run(timeout).await {
            Ok(()) => {
                debug!(title = %title, "Desktop notification sent");
                SendResult::Sent
            }
            Err(e) => SendResult::Failed(e.to_string()),
        }
    }
}
