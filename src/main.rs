//! Smart Voice Notify CLI
//!
//! 从 stdin 读取宿主事件（每行一个 JSON），驱动语音提醒状态机

use anyhow::{Context, Result};
use clap::Parser;
use smart_voice_notify::{BackendsBuilder, EventRouter, HostEvent, NotifyConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// 输入结束后检查待处理工作的间隔
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "voice-notify")]
#[command(about = "Smart Voice Notify - 编码代理事件的语音提醒与升级通知")]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 ~/.config/smart-voice-notify/config.json）
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// 输出调试日志
    #[arg(long)]
    debug: bool,
    /// 只记录日志，不播放声音、不发送通知
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug voice-notify < events.ndjson
    let default_filter = if cli.debug {
        "smart_voice_notify=debug,voice_notify=debug"
    } else {
        "smart_voice_notify=info,voice_notify=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let config = match &cli.config {
        Some(path) => NotifyConfig::from_path(path)?,
        None => NotifyConfig::load()?,
    };
    info!(
        mode = ?config.notification_mode,
        enabled = config.enabled,
        dry_run = cli.dry_run,
        "Starting voice-notify"
    );

    let backends = BackendsBuilder::new(&config)
        .dry_run(cli.dry_run)
        .build()
        .context("Failed to initialize notification backends")?;
    let router = EventRouter::new(config, backends);

    if read_events(&router).await? {
        drain(&router).await;
    }

    router.shutdown();
    info!("voice-notify stopped");
    Ok(())
}

/// 逐行读取事件，返回 `true` 表示输入正常结束（需要等待提醒）
async fn read_events(router: &EventRouter) -> Result<bool> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    debug!("Input closed");
                    return Ok(true);
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match HostEvent::from_json(line) {
                    Ok(event) => router.on_event(&event).await,
                    Err(e) => warn!(error = %e, "Skipping malformed event line"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(false);
            }
        }
    }
}

/// 等待所有提醒和批次处理完成（或 Ctrl+C）
async fn drain(router: &EventRouter) {
    if router.has_pending_work() {
        info!(reminders = ?router.pending_reminders(), "Waiting for pending reminders");
    }
    while router.has_pending_work() {
        tokio::select! {
            _ = tokio::time::sleep(DRAIN_POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted while waiting for reminders");
                return;
            }
        }
    }
}
