//! 线程间消息 (Messages between threads)

use super::metrics::MetricsSnapshot;
use crate::tracking::PixelPoint;
use image::RgbImage;
use serde::Serialize;

/// 外部命令 (键盘 / HTTP → 跟踪循环), 在两个周期之间处理
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerCommand {
    /// 进入标定模式
    StartCalibration,
    /// 设置篮筐位置; 标定模式下为待确认位置
    SetHoop { x: i32, y: i32 },
    ConfirmCalibration,
    CancelCalibration,
    ResetTrajectory,
    /// 已知距离标定像素比例
    SetScale {
        known_distance_m: f64,
        measured_pixels: f64,
    },
    Quit,
}

/// 跟踪循环状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerState {
    Initializing,
    Running,
    Calibrating,
    Stopped,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Initializing => "initializing",
            TrackerState::Running => "running",
            TrackerState::Calibrating => "calibrating",
            TrackerState::Stopped => "stopped",
        }
    }
}

/// 显示帧 (跟踪循环 → 本地窗口)
#[derive(Clone, Debug)]
pub struct DisplayFrame {
    /// 已叠加标注的画面
    pub image: RgbImage,
    pub snapshot: MetricsSnapshot,
    /// 标定模式下尚未确认的篮筐位置
    pub pending_hoop: Option<PixelPoint>,
}
