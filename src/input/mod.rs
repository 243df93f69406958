/// 视频输入系统 (Video Input System)
///
/// 跟踪循环通过 `FrameSource` 取帧, 不关心帧来自哪里
/// - CameraSource: 本地摄像头 (DirectShow/AVFoundation/V4L2, 需要 `camera` 特性)
/// - ImageSequenceSource: 图片目录回放 (离线调试)
pub mod sequence;
pub mod yuv;

#[cfg(feature = "camera")]
pub mod camera;
#[cfg(feature = "camera")]
pub mod decode_filter;

#[cfg(feature = "camera")]
pub use camera::{get_camera_devices, CameraSource};
pub use sequence::ImageSequenceSource;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use image::RgbImage;
use tracing::info;

/// 帧来源
///
/// `read` 返回 `Ok(None)` 表示来源已耗尽 (例如图片序列播放完毕),
/// 返回错误表示本次采集失败, 由调用方决定是否重试。
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<()>;
    fn read(&mut self) -> Result<Option<RgbImage>>;
    fn release(&mut self);
    fn describe(&self) -> String;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// 独占持有已打开的来源, 在任何退出路径上只释放一次
pub struct SourceGuard<S: FrameSource> {
    source: S,
    released: bool,
}

impl<S: FrameSource> SourceGuard<S> {
    /// 打开来源; 失败时不需要释放
    pub fn open(mut source: S) -> Result<Self> {
        source.open()?;
        info!("📹 视频源已打开: {}", source.describe());
        Ok(Self {
            source,
            released: false,
        })
    }

    pub fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.released {
            return Err(TrackerError::Capture("视频源已释放".into()));
        }
        self.source.read()
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.release();
        info!("🔌 视频源已释放: {}", self.source.describe());
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// 根据配置创建视频源
pub fn build_source(config: &TrackerConfig) -> Result<Box<dyn FrameSource>> {
    if config.uses_camera() {
        return camera_source(config);
    }

    let source = ImageSequenceSource::new(&config.source)
        .looping(config.loop_source)
        .with_frame_rate(config.camera.fps);
    Ok(Box::new(source))
}

#[cfg(feature = "camera")]
fn camera_source(config: &TrackerConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(CameraSource::new(config.camera.clone())))
}

#[cfg(not(feature = "camera"))]
fn camera_source(_config: &TrackerConfig) -> Result<Box<dyn FrameSource>> {
    tracing::warn!("⚠️ 未启用 camera 特性, 无法使用摄像头");
    Err(TrackerError::SourceOpen {
        name: crate::config::CAMERA_SOURCE.to_string(),
        reason: "编译时未启用 `camera` 特性, 请使用 --features camera 或指定图片目录".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        releases: Arc<AtomicUsize>,
        fail_open: bool,
    }

    impl FrameSource for CountingSource {
        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(TrackerError::SourceOpen {
                    name: "counting".into(),
                    reason: "busy".into(),
                });
            }
            Ok(())
        }

        fn read(&mut self) -> Result<Option<RgbImage>> {
            Ok(Some(RgbImage::new(2, 2)))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    #[test]
    fn test_guard_releases_once() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = SourceGuard::open(CountingSource {
                releases: releases.clone(),
                fail_open: false,
            })
            .unwrap();
            assert!(guard.read().unwrap().is_some());
            guard.release();
            guard.release();
            assert!(guard.read().is_err());
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        let guard = SourceGuard::open(Box::new(CountingSource {
            releases: releases.clone(),
            fail_open: false,
        }) as Box<dyn FrameSource>)
        .unwrap();
        drop(guard);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_open_is_not_released() {
        let releases = Arc::new(AtomicUsize::new(0));
        let result = SourceGuard::open(CountingSource {
            releases: releases.clone(),
            fail_open: true,
        });
        assert!(matches!(result, Err(TrackerError::SourceOpen { .. })));
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_build_source_for_directory() {
        let mut config = TrackerConfig::default();
        config.source = "frames".into();
        let source = build_source(&config).unwrap();
        assert!(source.describe().contains("frames"));
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_camera_requires_feature() {
        let config = TrackerConfig::default();
        assert!(matches!(
            build_source(&config),
            Err(TrackerError::SourceOpen { .. })
        ));
    }
}
