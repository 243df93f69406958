/// 追踪流水线 (Tracking Pipeline)
///
/// 跟踪循环运行在独立线程, 与显示/网络层只通过两样东西交互:
/// - 命令队列: 键盘 / HTTP → 跟踪循环, 在两个周期之间处理
/// - 快照单元: 跟踪循环整体替换, 其他线程只读
pub mod messages;
pub mod metrics;
pub mod tracking_loop;

pub use messages::{DisplayFrame, TrackerCommand, TrackerState};
pub use metrics::{FrameTimer, MetricsSnapshot, ShotCounters, SnapshotCell, TrajectoryPoint};
pub use tracking_loop::{LoopSummary, StopReason, TrackerContext, TrackingLoop};
