//! 日志初始化模块
//!
//! 优先使用环境变量 `RUST_LOG`，未设置时退回调用方提供的默认级别。

use tracing_subscriber::{EnvFilter, fmt};

/// 初始化日志系统
///
/// 进程内只能调用一次；重复初始化会 panic，需要容错时使用
/// [`try_init_tracing`]。
pub fn init_tracing(default_level: &str) {
    fmt::Subscriber::builder()
        .with_env_filter(env_filter(default_level))
        .init();
}

/// 初始化日志系统，已初始化时静默返回
///
/// 适合测试等无法保证只初始化一次的场景。
pub fn try_init_tracing(default_level: &str) {
    let _ = fmt::Subscriber::builder()
        .with_env_filter(env_filter(default_level))
        .try_init();
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
