/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
///
/// 摄像头帧 (YUV420P) → RgbImage → 有界通道
use super::yuv::{yuv420p_to_rgb, Yuv420Planes};
use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 最大允许分辨率
const MAX_DIMENSION: u32 = 4096;

#[derive(Clone)]
pub struct DecodeFilter {
    sender: Sender<RgbImage>,
    stop: Arc<AtomicBool>,
    count: usize,
    last: Instant,
    dropped_frames: usize, // 丢弃的帧数 (损坏或来不及处理)
    total_frames: usize,
}

impl DecodeFilter {
    pub fn new(sender: Sender<RgbImage>, stop: Arc<AtomicBool>) -> Self {
        Self {
            sender,
            stop,
            count: 0,
            last: Instant::now(),
            dropped_frames: 0,
            total_frames: 0,
        }
    }

    fn drop_frame(&mut self, reason: &str) {
        self.dropped_frames += 1;
        if self.total_frames <= 10 {
            warn!("⚠️ 丢弃帧 #{}: {}", self.total_frames, reason);
        }
    }

    fn report_fps(&mut self) {
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed < 1.0 {
            return;
        }
        let drop_rate = self.dropped_frames as f64 / self.total_frames.max(1) as f64 * 100.0;
        debug!(
            "📺 采集统计: {:.1}fps | 总帧{} | 丢弃{} ({:.1}%)",
            self.count as f64 / elapsed,
            self.total_frames,
            self.dropped_frames,
            drop_rate
        );
        self.last = Instant::now();
        self.count = 0;
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 采集线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("camera released".to_string());
        }
        self.total_frames += 1;

        if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
            self.drop_frame("空帧/损坏帧");
            return Ok(None);
        }

        // SAFETY: 指针已判空, 平面长度按 FFmpeg 的步长和高度计算
        let rgb = unsafe {
            let raw = &*frame.as_ptr();
            let w = raw.width as u32;
            let h = raw.height as u32;
            if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                self.drop_frame("非法分辨率");
                return Ok(None);
            }

            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            if raw.data[0].is_null() || raw.data[1].is_null() || raw.data[2].is_null() {
                self.drop_frame("YUV指针为空");
                return Ok(None);
            }

            let chroma_rows = (h as usize).div_ceil(2);
            let planes = Yuv420Planes {
                y: std::slice::from_raw_parts(raw.data[0], y_stride * h as usize),
                u: std::slice::from_raw_parts(raw.data[1], uv_stride * chroma_rows),
                v: std::slice::from_raw_parts(raw.data[2], uv_stride * chroma_rows),
                y_stride,
                uv_stride,
            };
            yuv420p_to_rgb(&planes, w, h)
        };

        let Some(rgb) = rgb else {
            self.drop_frame("步长异常");
            return Ok(None);
        };

        self.count += 1;
        self.report_fps();

        match self.sender.try_send(rgb) {
            Ok(()) => {}
            // 跟踪循环来不及处理, 丢弃最新帧
            Err(TrySendError::Full(_)) => self.dropped_frames += 1,
            Err(TrySendError::Disconnected(_)) => return Err("receiver dropped".to_string()),
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ 采集线程退出");
    }
}
