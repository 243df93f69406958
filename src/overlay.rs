//! 画面标注: 篮筐、小球、轨迹

use crate::detection::Detection;
use crate::tracking::{PixelPoint, Trajectory};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

pub const HOOP_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BALL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const TRAJECTORY_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// 标定模式下待确认的篮筐位置
pub const PENDING_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const HOOP_RADIUS: i32 = 10;
const CENTER_DOT_RADIUS: i32 = 3;
const PENDING_DOT_RADIUS: i32 = 5;

/// 2 像素宽的空心圆
fn draw_ring(image: &mut RgbImage, center: PixelPoint, radius: i32, color: Rgb<u8>) {
    draw_hollow_circle_mut(image, center, radius, color);
    if radius > 1 {
        draw_hollow_circle_mut(image, center, radius - 1, color);
    }
}

/// 2 像素宽的线段
fn draw_thick_line(image: &mut RgbImage, a: PixelPoint, b: PixelPoint, color: Rgb<u8>) {
    let (ax, ay) = (a.0 as f32, a.1 as f32);
    let (bx, by) = (b.0 as f32, b.1 as f32);
    draw_line_segment_mut(image, (ax, ay), (bx, by), color);
    // 沿主方向的垂直方向偏移一个像素
    if (bx - ax).abs() >= (by - ay).abs() {
        draw_line_segment_mut(image, (ax, ay + 1.0), (bx, by + 1.0), color);
    } else {
        draw_line_segment_mut(image, (ax + 1.0, ay), (bx + 1.0, by), color);
    }
}

/// 在帧上绘制篮筐、当前小球和轨迹 (跳过缺口)
pub fn draw_overlay(
    image: &mut RgbImage,
    trajectory: &Trajectory,
    detection: Option<&Detection>,
    hoop: Option<PixelPoint>,
) {
    if let Some(hoop) = hoop {
        draw_ring(image, hoop, HOOP_RADIUS, HOOP_COLOR);
    }

    if let Some(det) = detection {
        draw_ring(image, det.center(), det.radius, BALL_COLOR);
        draw_filled_circle_mut(image, det.center(), CENTER_DOT_RADIUS, BALL_COLOR);
    }

    for (a, b) in trajectory.segments() {
        draw_thick_line(image, a, b, TRAJECTORY_COLOR);
    }
}

/// 标定模式: 标出待确认的篮筐位置
pub fn draw_pending_hoop(image: &mut RgbImage, pending: PixelPoint) {
    draw_filled_circle_mut(image, pending, PENDING_DOT_RADIUS, PENDING_COLOR);
}
