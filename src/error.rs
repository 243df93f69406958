//! 错误类型 (Error types)

use thiserror::Error;

/// 追踪器错误
#[derive(Debug, Error)]
pub enum TrackerError {
    /// 视频源无法打开 (致命)
    #[error("无法打开视频源 {name}: {reason}")]
    SourceOpen { name: String, reason: String },

    /// 采集帧失败
    #[error("采集帧失败: {0}")]
    Capture(String),

    /// 标定参数无效 (例如已知距离为 0)
    #[error("标定参数无效: {0}")]
    InvalidCalibration(String),

    /// 配置参数无效
    #[error("配置无效: {0}")]
    Config(String),

    /// Web 服务启动失败
    #[error("Web 服务错误: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
