//! 外部命令执行（带超时）

use anyhow::{anyhow, bail, Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// 一条待执行的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 程序是否在 PATH 中
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// 执行并等待退出，非零退出码视为失败
    pub async fn run(&self, timeout: Duration) -> Result<()> {
        self.output(timeout).await.map(|_| ())
    }

    /// 执行并返回 stdout
    pub async fn output(&self, timeout: Duration) -> Result<String> {
        debug!(program = %self.program, args = ?self.args, "Running command");
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("{} timed out after {}ms", self.program, timeout.as_millis()))?
            .with_context(|| format!("Failed to wait for {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}: {}", self.program, output.status, stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// 依次尝试候选命令，返回第一个成功的程序名
pub async fn run_first_available(candidates: &[CommandSpec], timeout: Duration) -> Result<String> {
    let mut last_error = None;
    for candidate in candidates.iter().filter(|c| c.is_available()) {
        match candidate.run(timeout).await {
            Ok(()) => return Ok(candidate.program.clone()),
            Err(e) => {
                debug!(program = %candidate.program, error = %e, "Command failed, trying next");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("No suitable command found in PATH")))
}

/// AppleScript 字符串转义
pub fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// PowerShell 单引号字符串转义
pub fn escape_powershell(text: &str) -> String {
    text.replace('\'', "''")
}
