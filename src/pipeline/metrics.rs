//! 性能统计与指标快照 (Metrics)
//!
//! 快照是不可变的, 每次发布整体替换; 读者拿到的是 `Arc`, 不会看到写了一半的数据。

use super::messages::TrackerState;
use crate::tracking::{Calibration, PixelPoint, SpeedTracker, Trajectory};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// 轨迹点 (JSON 中为 `{"x":..,"y":..}`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TrajectoryPoint {
    pub x: i32,
    pub y: i32,
}

/// 投篮计数, 目前没有判定逻辑, 始终为 0
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShotCounters {
    pub total: u32,
    pub made: u32,
    pub missed: u32,
}

impl ShotCounters {
    /// 命中率 (百分比), 没有投篮时为 0
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round_to(self.made as f64 / self.total as f64 * 100.0, 1)
    }
}

/// 指标快照
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub fps: f64,
    pub frame_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub detection_time_ms: f64,
    pub draw_time_ms: f64,
    pub distance: Option<f64>,
    pub trajectory: Vec<TrajectoryPoint>,
    pub hoop_position: Option<PixelPoint>,
    pub total_shots: u32,
    pub made_shots: u32,
    pub missed_shots: u32,
    pub accuracy: f64,
    pub current_speed: f64,
    pub max_speed: f64,
    pub positions_tracked: usize,
    pub trajectory_length: usize,
    pub frame_count: u64,
    pub state: TrackerState,
    pub timestamp_ms: i64,
}

/// 构建快照所需的当前状态
pub struct SnapshotInputs<'a> {
    pub timer: &'a FrameTimer,
    pub detection_time: Duration,
    pub draw_time: Duration,
    pub distance: Option<f64>,
    pub trajectory: &'a Trajectory,
    pub calibration: &'a Calibration,
    pub speed: &'a SpeedTracker,
    pub shots: &'a ShotCounters,
    pub frame_count: u64,
    pub state: TrackerState,
}

impl MetricsSnapshot {
    pub fn build(inputs: &SnapshotInputs) -> Self {
        let trajectory = inputs
            .trajectory
            .valid_points()
            .into_iter()
            .map(|(x, y)| TrajectoryPoint { x, y })
            .collect::<Vec<_>>();

        Self {
            fps: round_to(inputs.timer.fps(), 1),
            frame_latency_ms: round_to(inputs.timer.last_latency_secs() * 1000.0, 1),
            avg_latency_ms: round_to(inputs.timer.avg_latency_secs() * 1000.0, 1),
            detection_time_ms: round_to(inputs.detection_time.as_secs_f64() * 1000.0, 1),
            draw_time_ms: round_to(inputs.draw_time.as_secs_f64() * 1000.0, 1),
            distance: inputs.distance.map(|d| round_to(d, 2)),
            positions_tracked: trajectory.len(),
            trajectory,
            hoop_position: inputs.calibration.hoop(),
            total_shots: inputs.shots.total,
            made_shots: inputs.shots.made,
            missed_shots: inputs.shots.missed,
            accuracy: inputs.shots.accuracy(),
            current_speed: round_to(inputs.speed.current(), 2),
            max_speed: round_to(inputs.speed.max(), 2),
            trajectory_length: inputs.trajectory.len(),
            frame_count: inputs.frame_count,
            state: inputs.state,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// 四舍五入到指定小数位
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// 帧间隔计时: 最近一帧延迟 + 滑动窗口平均 → FPS
#[derive(Clone, Debug)]
pub struct FrameTimer {
    window: VecDeque<f64>,
    window_size: usize,
    last_tick: Instant,
    last_latency: f64,
    // 整个会话的累计值, 用于退出时的汇总
    total_latency: f64,
    total_frames: u64,
}

impl FrameTimer {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            last_tick: Instant::now(),
            last_latency: 0.0,
            total_latency: 0.0,
            total_frames: 0,
        }
    }

    /// 记录一帧, 返回距上一帧的秒数
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let latency = now.duration_since(self.last_tick);
        self.last_tick = now;
        self.record(latency)
    }

    /// 从暂停中恢复, 暂停期间不计入延迟
    pub fn resume(&mut self) {
        self.last_tick = Instant::now();
    }

    pub fn record(&mut self, latency: Duration) -> f64 {
        let secs = latency.as_secs_f64();
        self.last_latency = secs;
        self.window.push_back(secs);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
        self.total_latency += secs;
        self.total_frames += 1;
        secs
    }

    pub fn last_latency_secs(&self) -> f64 {
        self.last_latency
    }

    /// 窗口内平均延迟 (秒)
    pub fn avg_latency_secs(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    pub fn fps(&self) -> f64 {
        let avg = self.avg_latency_secs();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// 会话平均 (FPS, 延迟毫秒)
    pub fn session_average(&self) -> (f64, f64) {
        if self.total_frames == 0 || self.total_latency <= 0.0 {
            return (0.0, 0.0);
        }
        let avg = self.total_latency / self.total_frames as f64;
        (1.0 / avg, avg * 1000.0)
    }
}

/// 最新快照 (单写多读)
#[derive(Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<RwLock<Option<Arc<MetricsSnapshot>>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换当前快照
    pub fn publish(&self, snapshot: MetricsSnapshot) -> Arc<MetricsSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(snapshot.clone());
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<MetricsSnapshot>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(trajectory: &Trajectory, calibration: &Calibration) -> MetricsSnapshot {
        let mut timer = FrameTimer::new(30);
        timer.record(Duration::from_millis(40));
        MetricsSnapshot::build(&SnapshotInputs {
            timer: &timer,
            detection_time: Duration::from_micros(5_340),
            draw_time: Duration::from_micros(1_260),
            distance: Some(2.345_6),
            trajectory,
            calibration,
            speed: &SpeedTracker::new(),
            shots: &ShotCounters::default(),
            frame_count: 10,
            state: TrackerState::Running,
        })
    }

    #[test]
    fn test_fps_over_window() {
        let mut timer = FrameTimer::new(3);
        for ms in [100, 100, 50, 50] {
            timer.record(Duration::from_millis(ms));
        }
        // 窗口只保留最后 3 帧: 100, 50, 50
        assert!((timer.avg_latency_secs() - 0.2 / 3.0).abs() < 1e-9);
        assert!((timer.fps() - 15.0).abs() < 1e-6);
        assert!((timer.last_latency_secs() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_empty_timer_reports_zero() {
        let timer = FrameTimer::new(30);
        assert_eq!(timer.fps(), 0.0);
        assert_eq!(timer.session_average(), (0.0, 0.0));
    }

    #[test]
    fn test_session_average() {
        let mut timer = FrameTimer::new(2);
        for _ in 0..4 {
            timer.record(Duration::from_millis(50));
        }
        let (fps, latency_ms) = timer.session_average();
        assert!((fps - 20.0).abs() < 1e-6);
        assert!((latency_ms - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_snapshot_rounding_and_counts() {
        let mut trajectory = Trajectory::new(10);
        trajectory.push(Some((1, 2)));
        trajectory.push(None);
        trajectory.push(Some((3, 4)));
        let mut calibration = Calibration::new();
        calibration.set_hoop(320, 40);

        let snap = snapshot_with(&trajectory, &calibration);
        assert_eq!(snap.fps, 25.0);
        assert_eq!(snap.frame_latency_ms, 40.0);
        assert_eq!(snap.detection_time_ms, 5.3);
        assert_eq!(snap.draw_time_ms, 1.3);
        assert_eq!(snap.distance, Some(2.35));
        assert_eq!(snap.positions_tracked, 2);
        assert_eq!(snap.trajectory_length, 3);
        assert_eq!(snap.trajectory, vec![TrajectoryPoint { x: 1, y: 2 }, TrajectoryPoint { x: 3, y: 4 }]);
        assert_eq!(snap.hoop_position, Some((320, 40)));
        assert_eq!((snap.total_shots, snap.made_shots, snap.missed_shots), (0, 0, 0));
        assert_eq!(snap.accuracy, 0.0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snap = snapshot_with(&Trajectory::new(5), &Calibration::new());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["state"], "running");
        assert!(json["hoop_position"].is_null());
        assert!(json["trajectory"].as_array().unwrap().is_empty());
        assert_eq!(json["total_shots"], 0);
    }

    #[test]
    fn test_accuracy() {
        let shots = ShotCounters {
            total: 3,
            made: 2,
            missed: 1,
        };
        assert_eq!(shots.accuracy(), 66.7);
    }

    #[test]
    fn test_cell_replaces_whole_snapshot() {
        let cell = SnapshotCell::new();
        assert!(cell.latest().is_none());

        let first = cell.publish(snapshot_with(&Trajectory::new(5), &Calibration::new()));
        let held = cell.latest().unwrap();
        assert!(Arc::ptr_eq(&first, &held));

        let mut second = (*held).clone();
        second.frame_count = 99;
        cell.publish(second);
        assert_eq!(held.frame_count, 10);
        assert_eq!(cell.latest().unwrap().frame_count, 99);
    }
}
