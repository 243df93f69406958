// 构建脚本: 启用摄像头时链接FFmpeg依赖库
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // 仅在Windows MSVC环境下, 且启用 camera 特性时添加FFmpeg相关库
    let camera = std::env::var_os("CARGO_FEATURE_CAMERA").is_some();
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();

    if camera && target_os == "windows" && target_env == "msvc" {
        // OLE 自动化和VFW (DirectShow 采集)
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");

        // Secure Channel (TLS/SSL)
        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
