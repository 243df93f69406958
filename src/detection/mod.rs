/// 检测系统 (Detection System)
///
/// - color:    RGB → HSV 与阈值掩码
/// - geometry: 轮廓面积与最小外接圆
/// - detector: 彩色小球检测
pub mod color;
pub mod detector;
pub mod geometry;

pub use color::{hsv_mask, rgb_to_hsv, HsvRange};
pub use detector::{detect, BallDetector, Detection};
pub use geometry::{min_enclosing_circle, polygon_area, Circle};
