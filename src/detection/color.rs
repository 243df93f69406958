//! 颜色空间转换与阈值掩码
//!
//! HSV 采用 8 位图像惯例: H ∈ [0, 180], S ∈ [0, 255], V ∈ [0, 255]

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// 掩码前景值
pub const MASK_ON: u8 = 255;

/// HSV 阈值区间 (逐通道闭区间)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }
}

/// RGB → HSV (单像素)
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta <= 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        max as u8,
    ]
}

/// 生成二值掩码: 区间内像素为 255, 其余为 0
pub fn hsv_mask(frame: &RgbImage, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(frame.width(), frame.height());
    for (src, dst) in frame.pixels().zip(mask.pixels_mut()) {
        let [r, g, b] = src.0;
        dst.0[0] = if range.contains(rgb_to_hsv(r, g, b)) {
            MASK_ON
        } else {
            0
        };
    }
    mask
}
