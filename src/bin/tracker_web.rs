//! 篮球投篮追踪器 - Web 仪表盘版
//!
//! 跟踪循环和 Web 服务各自运行在独立线程, 只共享 `TrackerContext`。
//! Ctrl+C 停止 Web 服务后, 主线程通知跟踪循环退出。

use anyhow::{bail, Context, Result};
use basketball_tracker::config::Args;
use basketball_tracker::input::build_source;
use basketball_tracker::pipeline::{TrackerContext, TrackingLoop};
use basketball_tracker::server::spawn_dashboard_server;
use basketball_tracker::telemetry::init_tracing;
use clap::Parser;
use std::time::Duration;
use tracing::info;

/// 主线程检查两个线程状态的间隔
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.load_config().context("配置无效")?;
    config.log_summary();

    let source = build_source(&config).context("无法创建视频源")?;
    let (ctx, commands) = TrackerContext::channel();
    let tracking = TrackingLoop::new(config.clone(), &ctx, commands)?;
    let handle = tracking.spawn(source).context("无法启动跟踪线程")?;

    let server = match spawn_dashboard_server(ctx.clone(), &config) {
        Ok(server) => server,
        Err(e) => {
            ctx.stop();
            let _ = handle.join();
            return Err(e).context("Web 服务启动失败");
        }
    };

    info!("{}", "=".repeat(50));
    info!("🏀 篮球投篮追踪器 Web 仪表盘");
    info!("🌐 http://localhost:{}/api/stream", config.port);
    info!("⌨️  按 Ctrl+C 停止");
    info!("{}", "=".repeat(50));

    // 任一方先停, 另一方随之停止
    while ctx.is_running() && !handle.is_finished() && !server.is_finished() {
        std::thread::sleep(SUPERVISE_INTERVAL);
    }
    ctx.stop();
    server.stop();

    match handle.join() {
        Ok(Ok(summary)) => {
            info!("👋 退出 ({:?}, {} 帧)", summary.reason, summary.frames);
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("跟踪循环启动失败"),
        Err(_) => bail!("跟踪线程异常退出"),
    }
}
