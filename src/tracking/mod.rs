//! 轨迹、标定与运动估计

pub mod calibration;
pub mod motion;
pub mod trajectory;

pub use calibration::{check_point, scale_from_measurement, Calibration, MAX_COORDINATE};
pub use motion::{estimate_speed, SpeedTracker, SPEED_WINDOW};
pub use trajectory::{PixelPoint, Trajectory, DEFAULT_TRAJECTORY_CAPACITY};
