//! 速度估计 (Speed Estimator)
//!
//! 取最近 5 个槽位中最新的两个有效位置, 位移 / 像素比例 / 最近一帧的耗时。
//! 中间存在缺口时, 两个样本之间实际间隔不止一帧, 结果会偏大。

use super::trajectory::Trajectory;

/// 参与计算的最近槽位数 (含缺口)
pub const SPEED_WINDOW: usize = 5;

/// 估算当前速度 (米/秒)
///
/// 有效位置不足两个或 `elapsed_secs <= 0` 时返回 0。
pub fn estimate_speed(trajectory: &Trajectory, pixels_per_meter: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 || pixels_per_meter <= 0.0 {
        return 0.0;
    }

    let mut recent = trajectory.iter().rev().take(SPEED_WINDOW).flatten();
    let (Some(&latest), Some(&previous)) = (recent.next(), recent.next()) else {
        return 0.0;
    };

    let dx = (latest.0 - previous.0) as f64;
    let dy = (latest.1 - previous.1) as f64;
    let meters = (dx * dx + dy * dy).sqrt() / pixels_per_meter;
    meters / elapsed_secs
}

/// 当前速度与会话内最大速度
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpeedTracker {
    current: f64,
    max: f64,
}

impl SpeedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新当前速度, 返回新值; 最大值只增不减
    pub fn update(&mut self, trajectory: &Trajectory, pixels_per_meter: f64, elapsed_secs: f64) -> f64 {
        self.current = estimate_speed(trajectory, pixels_per_meter, elapsed_secs);
        if self.current > self.max {
            self.max = self.current;
        }
        self.current
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
