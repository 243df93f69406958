//! 篮筐标定 (Hoop Calibration)
//!
//! 篮筐像素位置 + 像素/米比例。两者都设置后才能计算距离和速度。

use super::trajectory::PixelPoint;
use crate::error::{Result, TrackerError};
use serde::Serialize;

/// 篮筐坐标允许的最大绝对值 (远大于任何画面尺寸)
pub const MAX_COORDINATE: i32 = 1 << 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Calibration {
    hoop: Option<PixelPoint>,
    pixels_per_meter: Option<f64>,
}

impl Calibration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_hoop(&mut self, x: i32, y: i32) {
        self.hoop = Some((x, y));
    }

    pub fn hoop(&self) -> Option<PixelPoint> {
        self.hoop
    }

    pub fn pixels_per_meter(&self) -> Option<f64> {
        self.pixels_per_meter
    }

    /// 用已知距离标定比例: `pixels_per_meter = measured_pixels / known_distance_m`
    pub fn set_scale(&mut self, known_distance_m: f64, measured_pixels: f64) -> Result<f64> {
        let ppm = scale_from_measurement(known_distance_m, measured_pixels)?;
        self.pixels_per_meter = Some(ppm);
        Ok(ppm)
    }

    /// 直接设置比例 (命令行/配置文件)
    pub fn set_pixels_per_meter(&mut self, ppm: f64) -> Result<()> {
        if !ppm.is_finite() || ppm <= 0.0 {
            return Err(TrackerError::InvalidCalibration(format!(
                "像素/米比例必须为正数, 当前为 {}",
                ppm
            )));
        }
        self.pixels_per_meter = Some(ppm);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.hoop.is_some() && self.pixels_per_meter.is_some()
    }

    /// 球到篮筐的距离 (米); 未完成标定返回 `None`
    pub fn distance(&self, ball: PixelPoint) -> Option<f64> {
        let (hx, hy) = self.hoop?;
        let ppm = self.pixels_per_meter?;
        let dx = ball.0 as f64 - hx as f64;
        let dy = ball.1 as f64 - hy as f64;
        Some((dx * dx + dy * dy).sqrt() / ppm)
    }
}

/// 检查篮筐坐标是否在合理范围内
pub fn check_point(x: i32, y: i32) -> Result<PixelPoint> {
    if x.unsigned_abs() > MAX_COORDINATE as u32 || y.unsigned_abs() > MAX_COORDINATE as u32 {
        return Err(TrackerError::InvalidCalibration(format!(
            "篮筐坐标 ({}, {}) 超出范围 ±{}",
            x, y, MAX_COORDINATE
        )));
    }
    Ok((x, y))
}

/// 校验并计算比例, 不修改任何状态
pub fn scale_from_measurement(known_distance_m: f64, measured_pixels: f64) -> Result<f64> {
    if !known_distance_m.is_finite() || known_distance_m <= 0.0 {
        return Err(TrackerError::InvalidCalibration(format!(
            "已知距离必须大于 0, 当前为 {}",
            known_distance_m
        )));
    }
    if !measured_pixels.is_finite() || measured_pixels <= 0.0 {
        return Err(TrackerError::InvalidCalibration(format!(
            "测量像素必须大于 0, 当前为 {}",
            measured_pixels
        )));
    }
    Ok(measured_pixels / known_distance_m)
}
