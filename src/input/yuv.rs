//! YUV420P → RGB 转换 (BT.601, 定点系数 ×128)

use image::RgbImage;

/// 平面数据与步长
pub struct Yuv420Planes<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_stride: usize,
    pub uv_stride: usize,
}

impl Yuv420Planes<'_> {
    /// 平面长度是否足够容纳 `width × height` 的图像
    pub fn fits(&self, width: usize, height: usize) -> bool {
        if width == 0 || height == 0 || self.y_stride < width || self.uv_stride < width.div_ceil(2) {
            return false;
        }
        let chroma_rows = height.div_ceil(2);
        self.y.len() >= self.y_stride * (height - 1) + width
            && self.u.len() >= self.uv_stride * (chroma_rows - 1) + width.div_ceil(2)
            && self.v.len() >= self.uv_stride * (chroma_rows - 1) + width.div_ceil(2)
    }
}

/// 单像素转换
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    [
        (y + ((v * 179) >> 7)).clamp(0, 255) as u8,
        (y - ((u * 44) >> 7) - ((v * 91) >> 7)).clamp(0, 255) as u8,
        (y + ((u * 227) >> 7)).clamp(0, 255) as u8,
    ]
}

/// 整帧转换; 平面尺寸不足时返回 `None`
pub fn yuv420p_to_rgb(planes: &Yuv420Planes, width: u32, height: u32) -> Option<RgbImage> {
    let (w, h) = (width as usize, height as usize);
    if !planes.fits(w, h) {
        return None;
    }

    let mut buffer = vec![0u8; w * h * 3];
    for (row, out_row) in buffer.chunks_exact_mut(w * 3).enumerate() {
        let y_row = &planes.y[row * planes.y_stride..];
        let uv_offset = (row >> 1) * planes.uv_stride;
        let u_row = &planes.u[uv_offset..];
        let v_row = &planes.v[uv_offset..];

        for (x, px) in out_row.chunks_exact_mut(3).enumerate() {
            px.copy_from_slice(&yuv_to_rgb(y_row[x], u_row[x >> 1], v_row[x >> 1]));
        }
    }
    RgbImage::from_raw(width, height, buffer)
}
