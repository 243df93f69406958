//! 图片序列视频源 - 按文件名顺序回放目录中的图片

use super::FrameSource;
use crate::error::{Result, TrackerError};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 支持的图片扩展名
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "ppm"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    frame_interval: Option<Duration>,
    last_read: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: Vec::new(),
            cursor: 0,
            looping: false,
            frame_interval: None,
            last_read: None,
        }
    }

    /// 播放完后从头开始
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// 按摄像头帧率节流; 0 表示不节流
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_interval = (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64));
        self
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn throttle(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_read) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<()> {
        let open_err = |reason: String| TrackerError::SourceOpen {
            name: self.dir.display().to_string(),
            reason,
        };

        let entries = fs::read_dir(&self.dir).map_err(|e| open_err(e.to_string()))?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(open_err("目录中没有图片".into()));
        }

        info!("🖼️  找到 {} 张图片: {}", files.len(), self.dir.display());
        self.files = files;
        self.cursor = 0;
        self.last_read = None;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.cursor >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Ok(None);
            }
            debug!("🔁 图片序列从头开始");
            self.cursor = 0;
        }

        self.throttle();
        let path = &self.files[self.cursor];
        self.cursor += 1;

        let frame = image::open(path)
            .map_err(|e| TrackerError::Capture(format!("{}: {}", path.display(), e)))?;
        Ok(Some(frame.to_rgb8()))
    }

    fn release(&mut self) {
        self.files.clear();
        self.cursor = 0;
    }

    fn describe(&self) -> String {
        format!("图片序列 {}", self.dir.display())
    }
}
