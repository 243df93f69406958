/// 跟踪循环 (Tracking Loop)
/// 职责: 采集 → 检测 → 轨迹 → 距离/速度 → 定期发布快照
///
/// 状态: Initializing → Running ⇄ Calibrating, 终态 Stopped。
/// 命令只在两个周期之间处理, 不会打断正在进行的一帧。
use super::messages::{DisplayFrame, TrackerCommand, TrackerState};
use super::metrics::{FrameTimer, MetricsSnapshot, ShotCounters, SnapshotCell, SnapshotInputs};
use crate::config::TrackerConfig;
use crate::detection::{BallDetector, Detection};
use crate::error::Result;
use crate::input::{FrameSource, SourceGuard};
use crate::overlay;
use crate::tracking::{check_point, Calibration, PixelPoint, SpeedTracker, Trajectory};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 标定模式下等待命令的间隔 (同时检查运行标志)
const CALIBRATION_POLL: Duration = Duration::from_millis(50);

/// 共享上下文: 命令入口 + 最新快照 + 运行标志
///
/// 进程启动时创建一次, 克隆给每个需要它的处理器。
#[derive(Clone)]
pub struct TrackerContext {
    commands: Sender<TrackerCommand>,
    snapshots: SnapshotCell,
    running: Arc<AtomicBool>,
}

impl TrackerContext {
    /// 返回上下文和跟踪循环使用的命令接收端
    pub fn channel() -> (Self, Receiver<TrackerCommand>) {
        let (tx, rx) = unbounded();
        let ctx = Self {
            commands: tx,
            snapshots: SnapshotCell::new(),
            running: Arc::new(AtomicBool::new(true)),
        };
        (ctx, rx)
    }

    /// 发送命令; 跟踪循环已退出时返回 false
    pub fn send(&self, command: TrackerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshots(&self) -> &SnapshotCell {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<Arc<MetricsSnapshot>> {
        self.snapshots.latest()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 请求停止 (在下一个周期开始时生效)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// 停止原因
#[derive(Clone, Debug, PartialEq)]
pub enum StopReason {
    /// 用户退出或运行标志被清除
    Requested,
    /// 视频源没有更多帧
    SourceExhausted,
    /// 连续采集失败超过重试次数
    CaptureFailed(String),
}

/// 退出汇总
#[derive(Clone, Debug, PartialEq)]
pub struct LoopSummary {
    pub frames: u64,
    pub avg_fps: f64,
    pub avg_latency_ms: f64,
    pub max_speed: f64,
    pub reason: StopReason,
}

/// 离开 `run` 时清除运行标志, 包括线程 panic 的情况
struct ClearOnExit(Arc<AtomicBool>);

impl Drop for ClearOnExit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum CycleOutcome {
    Continue,
    Exhausted,
}

pub struct TrackingLoop {
    config: TrackerConfig,
    detector: BallDetector,
    trajectory: Trajectory,
    calibration: Calibration,
    speed: SpeedTracker,
    timer: FrameTimer,
    shots: ShotCounters,

    commands: Receiver<TrackerCommand>,
    snapshots: SnapshotCell,
    running: Arc<AtomicBool>,
    display: Option<Sender<DisplayFrame>>,

    state: TrackerState,
    frame_count: u64,
    capture_failures: u32,
    distance: Option<f64>,
    detection_time: Duration,
    draw_time: Duration,
    pending_hoop: Option<PixelPoint>,
    last_frame: Option<RgbImage>,
}

impl TrackingLoop {
    pub fn new(
        config: TrackerConfig,
        ctx: &TrackerContext,
        commands: Receiver<TrackerCommand>,
    ) -> Result<Self> {
        config.validate()?;

        let mut calibration = Calibration::new();
        if let Some(ppm) = config.pixels_per_meter {
            calibration.set_pixels_per_meter(ppm)?;
        }
        if let Some((x, y)) = config.hoop {
            calibration.set_hoop(x, y);
        }

        Ok(Self {
            detector: BallDetector::from_config(&config),
            trajectory: Trajectory::new(config.trajectory_capacity),
            timer: FrameTimer::new(config.fps_window),
            config,
            calibration,
            speed: SpeedTracker::new(),
            shots: ShotCounters::default(),
            commands,
            snapshots: ctx.snapshots.clone(),
            running: ctx.running.clone(),
            display: None,
            state: TrackerState::Initializing,
            frame_count: 0,
            capture_failures: 0,
            distance: None,
            detection_time: Duration::ZERO,
            draw_time: Duration::ZERO,
            pending_hoop: None,
            last_frame: None,
        })
    }

    /// 本地显示: 每帧绘制标注并发送到窗口
    pub fn with_display(mut self, display: Sender<DisplayFrame>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// 在独立线程上运行
    pub fn spawn<S>(self, source: S) -> Result<JoinHandle<Result<LoopSummary>>>
    where
        S: FrameSource + 'static,
    {
        let handle = std::thread::Builder::new()
            .name("tracking-loop".into())
            .spawn(move || {
                let mut tracking = self;
                tracking.run(source)
            })?;
        Ok(handle)
    }

    /// 运行到停止; 视频源在任何退出路径上只释放一次
    pub fn run<S: FrameSource>(&mut self, source: S) -> Result<LoopSummary> {
        info!("🏀 篮球投篮追踪器启动");
        let _clear_on_exit = ClearOnExit(self.running.clone());
        self.state = TrackerState::Initializing;
        self.publish();

        let mut guard = match SourceGuard::open(source) {
            Ok(guard) => guard,
            Err(e) => {
                error!("❌ 视频源打开失败: {}", e);
                self.finish();
                return Err(e);
            }
        };

        self.state = TrackerState::Running;
        self.timer.resume();
        self.publish();

        let reason = loop {
            if !self.running.load(Ordering::SeqCst) {
                break StopReason::Requested;
            }

            if self.state == TrackerState::Calibrating {
                match self.commands.recv_timeout(CALIBRATION_POLL) {
                    Ok(command) => {
                        if let Some(reason) = self.handle_command(command) {
                            break reason;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        warn!("⚠️ 命令通道已关闭, 取消标定");
                        self.handle_command(TrackerCommand::CancelCalibration);
                    }
                }
                continue;
            }

            if let Some(reason) = self.drain_commands() {
                break reason;
            }
            if self.state != TrackerState::Running {
                continue;
            }

            match self.cycle(&mut guard) {
                Ok(CycleOutcome::Continue) => {}
                Ok(CycleOutcome::Exhausted) => {
                    info!("📼 视频源已播放完毕");
                    break StopReason::SourceExhausted;
                }
                Err(e) => {
                    error!("❌ 采集失败, 停止追踪: {}", e);
                    break StopReason::CaptureFailed(e.to_string());
                }
            }
        };

        guard.release();
        Ok(self.summarize(reason))
    }

    /// 处理队列中所有待处理命令
    fn drain_commands(&mut self) -> Option<StopReason> {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if let Some(reason) = self.handle_command(command) {
                        return Some(reason);
                    }
                    // 进入标定模式后剩余命令由标定等待处理
                    if self.state == TrackerState::Calibrating {
                        return None;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// 处理单个命令, 返回 `Some` 表示需要停止
    pub fn handle_command(&mut self, command: TrackerCommand) -> Option<StopReason> {
        debug!("📨 收到命令: {:?}", command);
        match command {
            TrackerCommand::Quit => return Some(StopReason::Requested),
            TrackerCommand::StartCalibration => {
                if self.state == TrackerState::Running {
                    self.state = TrackerState::Calibrating;
                    self.pending_hoop = self.calibration.hoop();
                    info!("🎯 标定篮筐: 点击篮筐中心, 按 C 确认");
                }
            }
            TrackerCommand::SetHoop { x, y } => {
                if let Err(e) = check_point(x, y) {
                    warn!("⚠️ {}", e);
                } else if self.state == TrackerState::Calibrating {
                    self.pending_hoop = Some((x, y));
                    info!("📍 篮筐位置: ({}, {}), 按 C 确认", x, y);
                } else {
                    self.calibration.set_hoop(x, y);
                    info!("✅ 篮筐位置已设置: ({}, {})", x, y);
                }
            }
            TrackerCommand::ConfirmCalibration => {
                if self.state == TrackerState::Calibrating {
                    match self.pending_hoop.take() {
                        Some((x, y)) => {
                            self.calibration.set_hoop(x, y);
                            self.resume_running();
                            info!("✅ 篮筐已标定: ({}, {})", x, y);
                        }
                        None => warn!("⚠️ 尚未选择篮筐位置"),
                    }
                }
            }
            TrackerCommand::CancelCalibration => {
                if self.state == TrackerState::Calibrating {
                    self.pending_hoop = None;
                    self.resume_running();
                    info!("↩️  取消标定");
                }
            }
            TrackerCommand::ResetTrajectory => {
                self.trajectory.clear();
                info!("🔄 轨迹已重置");
            }
            TrackerCommand::SetScale {
                known_distance_m,
                measured_pixels,
            } => match self.calibration.set_scale(known_distance_m, measured_pixels) {
                Ok(ppm) => info!("📏 像素/米比例: {:.2}", ppm),
                Err(e) => warn!("⚠️ {}", e),
            },
        }

        self.publish();
        if self.state == TrackerState::Calibrating {
            self.send_calibration_frame();
        }
        None
    }

    fn resume_running(&mut self) {
        self.state = TrackerState::Running;
        self.timer.resume();
    }

    /// 单个周期
    fn cycle<S: FrameSource>(&mut self, guard: &mut SourceGuard<S>) -> Result<CycleOutcome> {
        let frame = match guard.read() {
            Ok(Some(frame)) => {
                self.capture_failures = 0;
                frame
            }
            Ok(None) => return Ok(CycleOutcome::Exhausted),
            Err(e) => {
                self.capture_failures += 1;
                if self.capture_failures > self.config.max_capture_retries {
                    return Err(e);
                }
                warn!(
                    "⚠️ 采集帧失败 ({}/{}): {}",
                    self.capture_failures, self.config.max_capture_retries, e
                );
                return Ok(CycleOutcome::Continue);
            }
        };

        let latency = self.timer.tick();
        self.frame_count += 1;

        // 跳帧: FPS 仍然每帧统计
        if self.frame_count % self.config.frame_skip as u64 != 0 {
            return Ok(CycleOutcome::Continue);
        }

        let detect_start = Instant::now();
        let detection = self.detector.detect(&frame);
        self.detection_time = detect_start.elapsed();

        let position = detection.map(|d| d.center());
        self.trajectory.push(position);

        if let Some(pos) = position {
            if let Some(distance) = self.calibration.distance(pos) {
                self.distance = Some(distance);
            }
        }
        if self.calibration.is_complete() {
            if let Some(ppm) = self.calibration.pixels_per_meter() {
                self.speed.update(&self.trajectory, ppm, latency);
            }
        }

        if self.display.is_some() {
            self.render(frame, detection.as_ref());
        }

        if self.frame_count % self.config.publish_interval == 0 {
            self.publish();
        }

        if self.frame_count % self.config.log_interval == 0 {
            info!(
                "📊 帧 {}: FPS={:.1}, 检测={:.1}ms, 绘制={:.1}ms",
                self.frame_count,
                self.timer.fps(),
                self.detection_time.as_secs_f64() * 1000.0,
                self.draw_time.as_secs_f64() * 1000.0
            );
        }

        Ok(CycleOutcome::Continue)
    }

    /// 绘制标注并发送到窗口; 窗口来不及显示时丢帧
    fn render(&mut self, frame: RgbImage, detection: Option<&Detection>) {
        let draw_start = Instant::now();
        let mut annotated = frame.clone();
        overlay::draw_overlay(
            &mut annotated,
            &self.trajectory,
            detection,
            self.calibration.hoop(),
        );
        self.draw_time = draw_start.elapsed();
        self.last_frame = Some(frame);
        self.send_display(annotated, None);
    }

    /// 标定模式: 重发最后一帧并标出待确认位置
    fn send_calibration_frame(&mut self) {
        let Some(frame) = self.last_frame.as_ref() else {
            return;
        };
        let mut image = frame.clone();
        if let Some(pending) = self.pending_hoop {
            overlay::draw_pending_hoop(&mut image, pending);
        }
        self.send_display(image, self.pending_hoop);
    }

    fn send_display(&mut self, image: RgbImage, pending_hoop: Option<PixelPoint>) {
        let Some(display) = self.display.as_ref() else {
            return;
        };
        let frame = DisplayFrame {
            image,
            snapshot: self.snapshot(),
            pending_hoop,
        };
        match display.try_send(frame) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                debug!("窗口已关闭, 不再发送画面");
                self.display = None;
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::build(&SnapshotInputs {
            timer: &self.timer,
            detection_time: self.detection_time,
            draw_time: self.draw_time,
            distance: self.distance,
            trajectory: &self.trajectory,
            calibration: &self.calibration,
            speed: &self.speed,
            shots: &self.shots,
            frame_count: self.frame_count,
            state: self.state,
        })
    }

    fn publish(&self) {
        self.snapshots.publish(self.snapshot());
    }

    /// 进入终态, 通知其他线程
    fn finish(&mut self) {
        self.state = TrackerState::Stopped;
        // 先发布终态快照, 读者看到停止标志时已能拿到它
        self.publish();
        self.running.store(false, Ordering::SeqCst);
    }

    fn summarize(&mut self, reason: StopReason) -> LoopSummary {
        self.finish();
        let (avg_fps, avg_latency_ms) = self.timer.session_average();
        info!("🛑 追踪停止: {:?}", reason);
        info!(
            "📊 共 {} 帧, 平均FPS: {:.1}, 平均延迟: {:.1}ms",
            self.frame_count, avg_fps, avg_latency_ms
        );
        LoopSummary {
            frames: self.frame_count,
            avg_fps,
            avg_latency_ms,
            max_speed: self.speed.max(),
            reason,
        }
    }
}
