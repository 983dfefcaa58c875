//! gRPC 服务器配置模块
//!
//! 配置加载顺序：TOML 配置文件（候选路径逐个尝试）→ 默认值，
//! 最后用环境变量 `GRPC_ADDRESS` / `GRPC_PORT` 覆盖。
//! 配置在启动时读取一次，启动后不再变更。

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{GrpcServerError, Result};

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 50051;

/// 默认监听地址
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// gRPC 服务器配置
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GrpcServerConfig {
    /// 监听地址
    #[serde(default = "default_address")]
    pub address: String,
    /// 监听端口（0 表示由操作系统分配）
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

/// 配置文件结构，gRPC 配置位于 `[server]` 段
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: Option<GrpcServerConfig>,
}

impl GrpcServerConfig {
    /// 加载配置
    ///
    /// 按候选路径逐个尝试；全部失败时告警并使用默认配置。
    /// 环境变量覆盖始终在最后应用。
    pub fn load(path: Option<&str>) -> Self {
        let candidates: Vec<PathBuf> = match path {
            Some(p) => vec![PathBuf::from(p)],
            None => vec![PathBuf::from("config/grpc.toml"), PathBuf::from("grpc.toml")],
        };

        let mut config = Self::load_with_fallback(&candidates);
        config.apply_env_overrides();
        config
    }

    fn load_with_fallback(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            match Self::load_from(path) {
                Ok(config) => return config,
                Err(err) => {
                    warn!("failed to load config from {}: {err}", path.display());
                }
            }
        }

        warn!("no configuration source succeeded, falling back to defaults");
        Self::default()
    }

    /// 从指定 TOML 文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| GrpcServerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// 从 TOML 文本解析，缺失的段和字段使用默认值
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)?;
        Ok(file.server.unwrap_or_default())
    }

    /// 应用环境变量覆盖
    ///
    /// `GRPC_ADDRESS` 覆盖监听地址，`GRPC_PORT` 覆盖监听端口。
    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = env::var("GRPC_ADDRESS") {
            info!("使用环境变量 GRPC_ADDRESS={}", address);
            self.address = address;
        }

        if let Ok(raw_port) = env::var("GRPC_PORT") {
            match raw_port.parse::<u16>() {
                Ok(port) => {
                    info!("使用环境变量 GRPC_PORT={}", port);
                    self.port = port;
                }
                Err(_) => {
                    warn!("环境变量 GRPC_PORT={} 不是合法端口，忽略", raw_port);
                }
            }
        }
    }

    /// 组装监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let address = format!("{}:{}", self.address, self.port);
        address
            .parse()
            .map_err(|source| GrpcServerError::Address { address, source })
    }
}
