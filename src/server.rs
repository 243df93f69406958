//! Web 仪表盘服务 (Dashboard Server)
//!
//! 独立线程运行 actix 运行时, 通过 SSE 推送指标快照, 通过 POST 接收命令。
//! 与跟踪循环只共享 `TrackerContext`。

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::pipeline::{MetricsSnapshot, TrackerCommand, TrackerContext};
use crate::tracking::{check_point, scale_from_measurement};
use actix_web::{
    http::header,
    web::{self, Bytes},
    App, HttpResponse, HttpServer,
};
use async_stream::stream;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info};

/// SSE 推送间隔下限
const MIN_STREAM_INTERVAL: Duration = Duration::from_millis(10);

const INDEX_TEXT: &str = "篮球投篮追踪器\n\n\
GET  /api/snapshot          最新指标快照 (JSON)\n\
GET  /api/stream            指标推送 (Server-Sent Events, event: update)\n\
POST /api/calibrate_hoop    {\"x\": 320, \"y\": 60}\n\
POST /api/calibrate_scale   {\"known_distance_m\": 2.0, \"measured_pixels\": 100}\n\
POST /api/reset_trajectory\n";

/// HTTP 处理器共享状态
pub struct ServerState {
    pub ctx: TrackerContext,
    pub stream_interval: Duration,
}

#[derive(Debug, Deserialize)]
pub struct HoopRequest {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Deserialize)]
pub struct ScaleRequest {
    pub known_distance_m: f64,
    pub measured_pixels: f64,
}

/// 服务线程句柄
pub struct DashboardServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DashboardServer {
    /// 服务线程是否已退出 (例如收到 Ctrl+C)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// 通知服务停止并等待线程退出
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("🌐 Web 服务已停止");
    }
}

/// 注册路由 (服务与测试共用)
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_route))
        .route("/api/snapshot", web::get().to(snapshot_handler))
        .route("/api/stream", web::get().to(stream_handler))
        .route("/api/calibrate_hoop", web::post().to(calibrate_hoop_handler))
        .route("/api/calibrate_scale", web::post().to(calibrate_scale_handler))
        .route("/api/reset_trajectory", web::post().to(reset_trajectory_handler));
}

/// 启动服务线程, 监听成功后返回
pub fn spawn_dashboard_server(ctx: TrackerContext, config: &TrackerConfig) -> Result<DashboardServer> {
    let addr = (config.bind.clone(), config.port);
    let state = web::Data::new(ServerState {
        ctx,
        stream_interval: Duration::from_millis(config.stream_interval_ms).max(MIN_STREAM_INTERVAL),
    });
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<std::result::Result<(), String>>(1);
    let bind_desc = format!("{}:{}", addr.0, addr.1);

    let handle = std::thread::Builder::new()
        .name("dashboard-server".into())
        .spawn(move || {
            let result = actix_web::rt::System::new().block_on(async move {
                let server = match HttpServer::new(move || {
                    App::new().app_data(state.clone()).configure(routes)
                })
                .workers(2)
                .shutdown_timeout(1)
                .bind(addr)
                {
                    Ok(server) => server,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return Ok(());
                    }
                };
                for local in server.addrs() {
                    info!("🌐 仪表盘地址: http://{}", local);
                }
                let _ = ready_tx.send(Ok(()));

                let server = server.run();
                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            });
            if let Err(err) = result {
                error!("❌ Web 服务错误: {err}");
            }
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(DashboardServer {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }),
        Ok(Err(reason)) => {
            let _ = handle.join();
            Err(TrackerError::Server(format!("无法监听 {}: {}", bind_desc, reason)))
        }
        Err(_) => {
            let _ = handle.join();
            Err(TrackerError::Server("Web 服务线程意外退出".into()))
        }
    }
}

/// 命令入队; 跟踪循环已停止时返回 503
fn dispatch(ctx: &TrackerContext, command: TrackerCommand) -> HttpResponse {
    if ctx.is_running() && ctx.send(command) {
        HttpResponse::Accepted().json(json!({ "status": "accepted" }))
    } else {
        HttpResponse::ServiceUnavailable().json(json!({ "error": "追踪已停止" }))
    }
}

/// 一条 SSE 事件
fn sse_event(snapshot: &MetricsSnapshot) -> String {
    match serde_json::to_string(snapshot) {
        Ok(json) => format!("event: update\nid: {}\ndata: {}\n\n", snapshot.frame_count, json),
        Err(err) => format!("event: error\ndata: {}\n\n", err),
    }
}

async fn index_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(INDEX_TEXT)
}

/// 最新快照; 还没有快照时返回 204
async fn snapshot_handler(state: web::Data<ServerState>) -> HttpResponse {
    match state.ctx.latest() {
        Some(snapshot) => HttpResponse::Ok().json(snapshot.as_ref()),
        None => HttpResponse::NoContent().finish(),
    }
}

/// 按固定间隔推送新快照, 没有新数据时发送注释保活
async fn stream_handler(state: web::Data<ServerState>) -> HttpResponse {
    let state = state.into_inner();
    let stream = stream! {
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 1000\n\n"));
        let mut interval = actix_web::rt::time::interval(state.stream_interval);
        let mut last_sent: Option<Arc<MetricsSnapshot>> = None;
        loop {
            interval.tick().await;
            let running = state.ctx.is_running();
            match state.ctx.latest() {
                Some(snapshot) if !last_sent.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &snapshot)) => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(sse_event(&snapshot)));
                    last_sent = Some(snapshot);
                }
                _ => {
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
                }
            }
            // 追踪停止后发完最后一帧就结束
            if !running {
                break;
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "text/event-stream"))
        .streaming(stream)
}

async fn calibrate_hoop_handler(
    state: web::Data<ServerState>,
    body: web::Json<HoopRequest>,
) -> HttpResponse {
    let (x, y) = match check_point(body.x, body.y) {
        Ok(point) => point,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    };
    info!("🎯 Web 标定篮筐: ({}, {})", x, y);
    dispatch(&state.ctx, TrackerCommand::SetHoop { x, y })
}

async fn calibrate_scale_handler(
    state: web::Data<ServerState>,
    body: web::Json<ScaleRequest>,
) -> HttpResponse {
    let ppm = match scale_from_measurement(body.known_distance_m, body.measured_pixels) {
        Ok(ppm) => ppm,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    };
    let command = TrackerCommand::SetScale {
        known_distance_m: body.known_distance_m,
        measured_pixels: body.measured_pixels,
    };
    if !(state.ctx.is_running() && state.ctx.send(command)) {
        return HttpResponse::ServiceUnavailable().json(json!({ "error": "追踪已停止" }));
    }
    HttpResponse::Accepted().json(json!({ "status": "accepted", "pixels_per_meter": ppm }))
}

async fn reset_trajectory_handler(state: web::Data<ServerState>) -> HttpResponse {
    dispatch(&state.ctx, TrackerCommand::ResetTrajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::metrics::{FrameTimer, ShotCounters, SnapshotInputs};
    use crate::pipeline::TrackerState;
    use crate::tracking::{Calibration, SpeedTracker, Trajectory};
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn snapshot(frame_count: u64) -> MetricsSnapshot {
        MetricsSnapshot::build(&SnapshotInputs {
            timer: &FrameTimer::new(30),
            detection_time: Duration::ZERO,
            draw_time: Duration::ZERO,
            distance: None,
            trajectory: &Trajectory::new(5),
            calibration: &Calibration::new(),
            speed: &SpeedTracker::new(),
            shots: &ShotCounters::default(),
            frame_count,
            state: TrackerState::Running,
        })
    }

    fn app_state(ctx: &TrackerContext) -> web::Data<ServerState> {
        web::Data::new(ServerState {
            ctx: ctx.clone(),
            stream_interval: Duration::from_millis(10),
        })
    }

    #[actix_web::test]
    async fn test_snapshot_empty_then_json() {
        let (ctx, _rx) = TrackerContext::channel();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::get().uri("/api/snapshot").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        ctx.snapshots().publish(snapshot(42));
        let req = test::TestRequest::get().uri("/api/snapshot").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["frame_count"], 42);
        assert_eq!(body["state"], "running");
    }

    #[actix_web::test]
    async fn test_calibrate_hoop_enqueues_command() {
        let (ctx, rx) = TrackerContext::channel();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/calibrate_hoop")
            .set_json(json!({ "x": 320, "y": 55 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(rx.try_recv().unwrap(), TrackerCommand::SetHoop { x: 320, y: 55 });
    }

    #[actix_web::test]
    async fn test_out_of_range_hoop_is_bad_request() {
        let (ctx, rx) = TrackerContext::channel();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/calibrate_hoop")
            .set_json(json!({ "x": i32::MIN, "y": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    #[actix_web::test]
    async fn test_reset_trajectory_enqueues_command() {
        let (ctx, rx) = TrackerContext::channel();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/reset_trajectory").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(rx.try_recv().unwrap(), TrackerCommand::ResetTrajectory);
    }

    #[actix_web::test]
    async fn test_zero_known_distance_is_bad_request() {
        let (ctx, rx) = TrackerContext::channel();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/calibrate_scale")
            .set_json(json!({ "known_distance_m": 0.0, "measured_pixels": 100.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());

        let req = test::TestRequest::post()
            .uri("/api/calibrate_scale")
            .set_json(json!({ "known_distance_m": 2.0, "measured_pixels": 100.0 }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["pixels_per_meter"], 50.0);
    }

    #[actix_web::test]
    async fn test_commands_rejected_after_stop() {
        let (ctx, _rx) = TrackerContext::channel();
        ctx.stop();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::post().uri("/api/reset_trajectory").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_stream_sends_update_events() {
        let (ctx, _rx) = TrackerContext::channel();
        ctx.snapshots().publish(snapshot(7));
        // 停止后流在发出最后一帧后结束, 方便读取完整响应
        ctx.stop();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::get().uri("/api/stream").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/event-stream"
        );

        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("retry: 1000"));
        assert!(text.contains("event: update\nid: 7\ndata: {"));
    }

    #[actix_web::test]
    async fn test_index_lists_endpoints() {
        let (ctx, _rx) = TrackerContext::channel();
        let app = test::init_service(App::new().app_data(app_state(&ctx)).configure(routes)).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("/api/stream"));
        assert!(text.contains("/api/calibrate_hoop"));
    }
}
