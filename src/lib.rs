// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 配置参数与命令行
pub mod detection; // 彩色小球检测
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod overlay; // 画面标注
pub mod pipeline; // 跟踪循环与指标
pub mod renderer; // macroquad 本地窗口
pub mod server; // Web 仪表盘
pub mod telemetry; // 日志
pub mod tracking; // 轨迹、标定、速度

pub use crate::config::{Args, TrackerConfig};
pub use crate::detection::{detect, BallDetector, Detection};
pub use crate::error::{Result, TrackerError};
pub use crate::pipeline::{
    MetricsSnapshot, TrackerCommand, TrackerContext, TrackerState, TrackingLoop,
};
pub use crate::tracking::{Calibration, Trajectory};
