//! 篮球投篮追踪器 - 本地窗口版
//!
//! 跟踪循环在后台线程运行, macroquad 窗口在主线程显示画面并接收按键:
//! H 标定篮筐, R 重置轨迹, Q/Esc 退出; 标定时鼠标左键选点, C 确认。

use anyhow::{bail, Context, Result};
use basketball_tracker::config::Args;
use basketball_tracker::input::build_source;
use basketball_tracker::pipeline::{TrackerCommand, TrackerContext, TrackingLoop};
use basketball_tracker::renderer::Renderer;
use basketball_tracker::telemetry::init_tracing;
use clap::Parser;
use macroquad::prelude::*;
use tracing::{error, info};

fn window_conf() -> Conf {
    Conf {
        window_title: "Basketball Tracker".to_owned(),
        window_width: 640,
        window_height: 480,
        high_dpi: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.load_config().context("配置无效")?;
    config.log_summary();

    let source = build_source(&config).context("无法创建视频源")?;
    let (ctx, commands) = TrackerContext::channel();
    // 窗口来不及显示时丢帧
    let (display_tx, display_rx) = crossbeam_channel::bounded(2);

    let tracking = TrackingLoop::new(config, &ctx, commands)?.with_display(display_tx);
    let handle = tracking.spawn(source).context("无法启动跟踪线程")?;

    info!("⌨️  H: 标定篮筐 | R: 重置轨迹 | Q: 退出");
    prevent_quit();
    let mut renderer = Renderer::new(display_rx, ctx.clone());
    while renderer.update() {
        renderer.draw();
        next_frame().await;
    }

    ctx.send(TrackerCommand::Quit);
    ctx.stop();

    match handle.join() {
        Ok(Ok(summary)) => {
            info!("👋 退出 ({:?}, {} 帧)", summary.reason, summary.frames);
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("跟踪循环启动失败"),
        Err(_) => bail!("跟踪线程异常退出"),
    }
}
