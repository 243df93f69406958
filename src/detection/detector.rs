/// 彩色小球检测器 (Ball Detector)
/// 职责: 单帧 → HSV掩码 → 形态学去噪 → 最大外轮廓 → 最小外接圆 → 半径过滤
use super::color::{hsv_mask, HsvRange};
use super::geometry::{min_enclosing_circle, polygon_area};
use crate::config::TrackerConfig;
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use serde::Serialize;

/// 5×5 方形结构元素 (L∞ 半径 2)
const KERNEL_RADIUS: u8 = 2;

/// 腐蚀/膨胀各执行的次数
const MORPH_ITERATIONS: usize = 2;

/// 单帧检测结果 (像素坐标, 截断为整数)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub radius: i32,
}

impl Detection {
    pub fn center(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// 检测器 (阈值与半径范围在构造时固定)
#[derive(Clone, Debug)]
pub struct BallDetector {
    range: HsvRange,
    min_radius: f64,
    max_radius: f64,
}

impl BallDetector {
    pub fn new(range: HsvRange, min_radius: f64, max_radius: f64) -> Self {
        Self {
            range,
            min_radius,
            max_radius,
        }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(
            HsvRange::new(config.hsv_lower, config.hsv_upper),
            config.min_ball_radius,
            config.max_ball_radius,
        )
    }

    pub fn range(&self) -> &HsvRange {
        &self.range
    }

    pub fn detect(&self, frame: &RgbImage) -> Option<Detection> {
        detect(
            frame,
            self.range.lower,
            self.range.upper,
            self.min_radius,
            self.max_radius,
        )
    }
}

/// 检测单帧中的彩色小球
///
/// 找不到轮廓或半径不在 `(radius_min, radius_max)` 开区间内时返回 `None`。
/// 面积相同的轮廓取先找到的一个。
pub fn detect(
    frame: &RgbImage,
    hsv_lower: [u8; 3],
    hsv_upper: [u8; 3],
    radius_min: f64,
    radius_max: f64,
) -> Option<Detection> {
    let mask = hsv_mask(frame, &HsvRange::new(hsv_lower, hsv_upper));
    let mask = clean_mask(&mask);

    let contours = find_contours::<i32>(&mask);
    let largest = largest_external_contour(&contours)?;

    let circle = min_enclosing_circle(&largest.points)?;
    if radius_min < circle.radius && circle.radius < radius_max {
        Some(Detection {
            x: circle.cx as i32,
            y: circle.cy as i32,
            radius: circle.radius as i32,
        })
    } else {
        None
    }
}

/// 先腐蚀后膨胀, 去掉孤立噪点并保留主体
fn clean_mask(mask: &GrayImage) -> GrayImage {
    let mut cleaned = mask.clone();
    for _ in 0..MORPH_ITERATIONS {
        cleaned = erode(&cleaned, Norm::LInf, KERNEL_RADIUS);
    }
    for _ in 0..MORPH_ITERATIONS {
        cleaned = dilate(&cleaned, Norm::LInf, KERNEL_RADIUS);
    }
    cleaned
}

/// 最外层轮廓中面积最大的一个
fn largest_external_contour(contours: &[Contour<i32>]) -> Option<&Contour<i32>> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
    {
        let area = polygon_area(&contour.points);
        match best {
            Some((_, best_area)) if best_area >= area => {}
            _ => best = Some((contour, area)),
        }
    }
    best.map(|(contour, _)| contour)
}
