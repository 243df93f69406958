//! 跟踪器配置 - 通过JSON文件调整参数, 命令行参数覆盖

use crate::error::{Result, TrackerError};
use crate::tracking::calibration::{check_point, scale_from_measurement};
use crate::tracking::PixelPoint;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "tracker_config.json";

/// 使用摄像头作为视频源的关键字
pub const CAMERA_SOURCE: &str = "camera";

/// 摄像头采集参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,  // 设备序号
    pub width: u32,  // 请求分辨率
    pub height: u32,
    pub fps: u32,    // 请求帧率 (尽力而为)
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// 跟踪器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // === 检测参数 ===
    pub hsv_lower: [u8; 3],   // HSV下限 (H 0-180)
    pub hsv_upper: [u8; 3],   // HSV上限
    pub min_ball_radius: f64, // 最小半径 (不含)
    pub max_ball_radius: f64, // 最大半径 (不含)

    // === 轨迹与统计 ===
    pub trajectory_capacity: usize, // 轨迹长度
    pub fps_window: usize,          // FPS滑动窗口 (帧)
    pub frame_skip: u32,            // 每n帧处理一次

    // === 发布与日志 ===
    pub publish_interval: u64,   // 每n帧发布一次快照
    pub log_interval: u64,       // 每n帧打印一次耗时
    pub max_capture_retries: u32, // 连续采集失败容忍次数

    // === 标定 (可选, 运行时也可设置) ===
    pub pixels_per_meter: Option<f64>,
    pub hoop: Option<PixelPoint>,

    // === 视频源 ===
    pub source: String, // "camera" 或图片目录
    pub loop_source: bool,
    pub camera: CameraConfig,

    // === Web 仪表盘 ===
    pub bind: String,
    pub port: u16,
    pub stream_interval_ms: u64, // SSE推送间隔
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            // 检测参数 (绿色小球)
            hsv_lower: [35, 100, 100],
            hsv_upper: [75, 255, 255],
            min_ball_radius: 5.0,
            max_ball_radius: 150.0,

            trajectory_capacity: 50,
            fps_window: 30,
            frame_skip: 1,

            publish_interval: 5,
            log_interval: 60,
            max_capture_retries: 3,

            pixels_per_meter: None,
            hoop: None,

            source: CAMERA_SOURCE.to_string(),
            loop_source: false,
            camera: CameraConfig::default(),

            bind: "0.0.0.0".to_string(),
            port: 5000,
            stream_interval_ms: 200,
        }
    }
}

impl TrackerConfig {
    /// 从JSON文件加载配置; 文件不存在时写回默认配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn uses_camera(&self) -> bool {
        self.source.eq_ignore_ascii_case(CAMERA_SOURCE)
    }

    /// 检查参数是否自洽
    pub fn validate(&self) -> Result<()> {
        for i in 0..3 {
            if self.hsv_lower[i] > self.hsv_upper[i] {
                return Err(TrackerError::Config(format!(
                    "HSV下限 {:?} 大于上限 {:?}",
                    self.hsv_lower, self.hsv_upper
                )));
            }
        }
        if self.hsv_upper[0] > 180 {
            return Err(TrackerError::Config(format!(
                "色相上限 {} 超出 0-180",
                self.hsv_upper[0]
            )));
        }
        if !(self.min_ball_radius >= 0.0 && self.min_ball_radius < self.max_ball_radius) {
            return Err(TrackerError::Config(format!(
                "半径范围无效: ({}, {})",
                self.min_ball_radius, self.max_ball_radius
            )));
        }
        if self.trajectory_capacity == 0 || self.fps_window == 0 {
            return Err(TrackerError::Config("轨迹容量和FPS窗口必须大于 0".into()));
        }
        if self.frame_skip == 0 || self.publish_interval == 0 || self.log_interval == 0 {
            return Err(TrackerError::Config("帧间隔参数必须大于 0".into()));
        }
        if let Some(ppm) = self.pixels_per_meter {
            if !ppm.is_finite() || ppm <= 0.0 {
                return Err(TrackerError::Config(format!("像素/米比例无效: {}", ppm)));
            }
        }
        if let Some((x, y)) = self.hoop {
            check_point(x, y).map_err(|e| TrackerError::Config(e.to_string()))?;
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(TrackerError::Config("摄像头分辨率必须大于 0".into()));
        }
        if self.source.trim().is_empty() {
            return Err(TrackerError::Config("视频源不能为空".into()));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️  当前跟踪器配置:");
        info!("  HSV范围: {:?} - {:?}", self.hsv_lower, self.hsv_upper);
        info!(
            "  半径范围: ({:.0}, {:.0})",
            self.min_ball_radius, self.max_ball_radius
        );
        info!(
            "  轨迹长度: {}, FPS窗口: {}, 跳帧: {}",
            self.trajectory_capacity, self.fps_window, self.frame_skip
        );
        info!("  视频源: {}", self.source);
        match self.pixels_per_meter {
            Some(ppm) => info!("  像素/米: {:.2}", ppm),
            None => info!("  像素/米: 未标定"),
        }
        if let Some((x, y)) = self.hoop {
            info!("  篮筐位置: ({}, {})", x, y);
        }
    }
}

/// 命令行参数 (两个程序共用)
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "篮球投篮追踪器", long_about = None)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// 视频源: camera 或图片目录
    #[arg(short, long)]
    pub source: Option<String>,

    /// 摄像头序号
    #[arg(long)]
    pub camera_index: Option<u32>,

    /// 像素/米比例
    #[arg(long)]
    pub pixels_per_meter: Option<f64>,

    /// 已知距离 (米), 与 --measured-pixels 一起使用
    #[arg(long, requires = "measured_pixels")]
    pub known_distance: Option<f64>,

    /// 已知距离对应的像素长度
    #[arg(long, requires = "known_distance")]
    pub measured_pixels: Option<f64>,

    /// 篮筐像素位置, 格式 X,Y
    #[arg(long, value_parser = parse_point)]
    pub hoop: Option<PixelPoint>,

    /// Web 监听地址
    #[arg(long)]
    pub bind: Option<String>,

    /// Web 端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 图片序列播放完后从头循环
    #[arg(long)]
    pub loop_source: bool,
}

impl Args {
    /// 加载配置文件并应用命令行覆盖
    pub fn load_config(&self) -> Result<TrackerConfig> {
        let mut config = TrackerConfig::load(&self.config);
        self.apply(&mut config)?;
        Ok(config)
    }

    /// 命令行参数覆盖配置, 最后做一次校验
    pub fn apply(&self, config: &mut TrackerConfig) -> Result<()> {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(index) = self.camera_index {
            config.camera.index = index;
        }
        if let Some(ppm) = self.pixels_per_meter {
            config.pixels_per_meter = Some(ppm);
        }
        if let (Some(known), Some(measured)) = (self.known_distance, self.measured_pixels) {
            config.pixels_per_meter = Some(scale_from_measurement(known, measured)?);
        }
        if let Some(hoop) = self.hoop {
            config.hoop = Some(hoop);
        }
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.loop_source {
            config.loop_source = true;
        }
        config.validate()
    }
}

/// 解析 "X,Y"
pub fn parse_point(s: &str) -> std::result::Result<PixelPoint, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("期望格式 X,Y, 实际为 '{}'", s))?;
    let x = x.trim().parse::<i32>().map_err(|e| format!("X 无效: {}", e))?;
    let y = y.trim().parse::<i32>().map_err(|e| format!("Y 无效: {}", e))?;
    Ok((x, y))
}
