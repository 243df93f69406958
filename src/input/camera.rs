//! 摄像头输入模块
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use super::decode_filter::DecodeFilter;
use super::FrameSource;
use crate::config::CameraConfig;
use crate::error::{Result, TrackerError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

/// 等待摄像头启动的时间
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// 单帧等待时间, 超时视为采集失败
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// 通道容量, 满了就丢帧
const FRAME_QUEUE: usize = 2;

#[cfg(target_os = "windows")]
const CAPTURE_FORMAT: &str = "dshow"; // DirectShow
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation"; // AVFoundation
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CAPTURE_FORMAT: &str = "v4l2"; // Video4Linux2

pub struct CameraSource {
    config: CameraConfig,
    receiver: Option<Receiver<RgbImage>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            receiver: None,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// 根据平台格式化摄像头地址
    fn device_url(&self) -> String {
        #[cfg(target_os = "windows")]
        {
            let devices = get_camera_devices();
            match devices.into_iter().find(|(i, _)| *i == self.config.index as usize) {
                Some((_, name)) => format!("video={}", name),
                None => format!("video={}", self.config.index),
            }
        }
        #[cfg(target_os = "macos")]
        {
            format!("{}", self.config.index)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            format!("/dev/video{}", self.config.index)
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<()> {
        let url = self.device_url();
        let (frame_tx, frame_rx) = bounded::<RgbImage>(FRAME_QUEUE);
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), String>>(1);

        self.stop.store(false, Ordering::SeqCst);
        let filter = DecodeFilter::new(frame_tx, self.stop.clone());
        let video_size = format!("{}x{}", self.config.width, self.config.height);
        let framerate = self.config.fps.to_string();
        let thread_url = url.clone();

        info!("🔍 使用格式: {}, 输入: {}", CAPTURE_FORMAT, url);

        let worker = std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("decode", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let input = Input::new(thread_url.as_str())
                    .set_format(CAPTURE_FORMAT)
                    .set_input_opts(
                        [
                            ("framerate", framerate.as_str()),
                            ("video_size", video_size.as_str()),
                        ]
                        .into(),
                    );

                let ctx = match FfmpegContext::builder()
                    .input(input)
                    .filter_desc("format=yuv420p")
                    .output(out)
                    .build()
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                let sch = match ctx.start() {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                if let Err(e) = sch.wait() {
                    warn!("📹 摄像头采集结束: {}", e);
                }
            })?;

        let open_err = |reason: String| TrackerError::SourceOpen {
            name: url.clone(),
            reason,
        };
        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {
                info!("✅ 摄像头连接成功,开始采集!");
                self.receiver = Some(frame_rx);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(reason)) => {
                error!("❌ 摄像头打开失败: {}", reason);
                Err(open_err(reason))
            }
            Err(_) => {
                self.stop.store(true, Ordering::SeqCst);
                Err(open_err("等待摄像头启动超时".into()))
            }
        }
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        let receiver = self
            .receiver
            .as_ref()
            .ok_or_else(|| TrackerError::Capture("摄像头未打开".into()))?;
        match receiver.recv_timeout(READ_TIMEOUT) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => {
                Err(TrackerError::Capture("等待摄像头帧超时".into()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(TrackerError::Capture("摄像头采集线程已退出".into()))
            }
        }
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.receiver = None;
        // 采集线程在下一帧到达时退出, 不在这里阻塞等待
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "摄像头 #{} ({}x{} @ {}fps)",
            self.config.index, self.config.width, self.config.height, self.config.fps
        )
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}
