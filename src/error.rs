//! 错误类型定义
//!
//! - 启动阶段错误（配置解析、绑定解析、端口绑定）是致命的，直接向调用方传播
//! - 停机阶段错误只记录日志，不跨越生命周期管理器边界传播

use std::net::SocketAddr;

use thiserror::Error;

use crate::server::LifecycleState;

/// gRPC 服务器宿主错误
#[derive(Debug, Error)]
pub enum GrpcServerError {
    /// 服务绑定解析失败：服务实现的具体类型与绑定函数声明的类型不一致
    #[error(
        "failed to bind service for `{locator}`: the binder accepts `{expected}` \
         but the descriptor provides `{provided}`. Please make sure the service \
         instance passed to `ServiceDescriptor::new` matches the implementation \
         type declared by `ServiceBinder::for_server`."
    )]
    Configuration {
        /// 绑定定位类型（protoc 生成的服务包装类型）的完整名称
        locator: String,
        /// 绑定函数声明的服务实现类型
        expected: String,
        /// 描述符实际携带的服务实现类型
        provided: String,
    },

    /// 监听地址格式非法
    #[error("invalid gRPC listen address `{address}`")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// 端口绑定失败（如端口已被占用）
    #[error("failed to bind gRPC server on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("failed to parse gRPC server configuration")]
    Config(#[from] toml::de::Error),

    /// 配置文件读取失败
    #[error("failed to read gRPC server configuration from `{path}`")]
    ConfigIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 生命周期状态机不允许该操作（如重复 start）
    #[error("`{operation}` is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },
}

pub type Result<T> = std::result::Result<T, GrpcServerError>;
