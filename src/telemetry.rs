//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 默认日志级别, 可用 `RUST_LOG` 覆盖
pub const DEFAULT_FILTER: &str = "basketball_tracker=info,tracker=info,tracker_web=info,actix_web=warn";

/// 初始化 tracing 输出; 重复调用无副作用
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("telemetry ready");
    }
}
