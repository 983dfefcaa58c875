//! 服务器生命周期管理模块
//!
//! 负责内嵌 gRPC 服务器的启动和优雅停机，状态机只支持一次正向流转：
//! `Idle → Starting → Running → ShuttingDown → Stopped`，停止后不支持重启。
//!
//! 启动顺序保证：所有服务注册先完成并挂载到路由上，监听套接字才打开，
//! 监听开始后不再追加服务。

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::service::Routes;
use tonic::transport::Server;
use tracing::{debug, error, info, warn};

use crate::config::GrpcServerConfig;
use crate::error::{GrpcServerError, Result};
use crate::registry::{self, ServiceDescriptor};

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// gRPC 服务器生命周期管理器
///
/// 独占持有运行中的服务器任务句柄和停止信号发送端。宿主在进程启动时调用
/// 一次 [`start`](GrpcServerManager::start)（或 [`run`](GrpcServerManager::run)），
/// 在进程退出时调用一次 [`stop`](GrpcServerManager::stop)。
pub struct GrpcServerManager {
    /// 服务器配置（启动时读取一次）
    config: GrpcServerConfig,
    /// 当前生命周期状态
    state: LifecycleState,
    /// 实际绑定的监听地址（启动成功后可用）
    local_addr: Option<SocketAddr>,
    /// 已注册的服务数量
    service_count: usize,
    /// 停止信号发送端
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// gRPC 服务器任务句柄
    server_handle: Option<JoinHandle<std::result::Result<(), tonic::transport::Error>>>,
}

impl GrpcServerManager {
    /// 创建生命周期管理器
    pub fn new(config: GrpcServerConfig) -> Self {
        Self {
            config,
            state: LifecycleState::Idle,
            local_addr: None,
            service_count: 0,
            shutdown_tx: None,
            server_handle: None,
        }
    }

    /// 当前生命周期状态
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// 实际绑定的监听地址（配置端口为 0 时为系统分配的端口）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 已注册的服务数量
    pub fn registered_services(&self) -> usize {
        self.service_count
    }

    /// 启动 gRPC 服务器
    ///
    /// 只允许从 `Idle` 状态调用。先解析所有服务描述符，任何一个解析失败都会
    /// 中止启动并恢复 `Idle` 状态，此时监听套接字从未打开过。解析全部成功后
    /// 绑定监听端口、启动服务器任务，返回时服务器已在监听。
    pub async fn start(&mut self, descriptors: Vec<ServiceDescriptor>) -> Result<()> {
        if self.state != LifecycleState::Idle {
            return Err(GrpcServerError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        self.state = LifecycleState::Starting;
        info!("正在启动 gRPC 服务器...");

        // 先解析再建服务器：解析失败时不能留下半开的监听套接字
        let registrations = match registry::resolve(descriptors) {
            Ok(registrations) => registrations,
            Err(err) => {
                error!(error = %err, "服务绑定解析失败，启动中止");
                self.state = LifecycleState::Idle;
                return Err(err);
            }
        };
        self.service_count = registrations.len();

        let mut routes = Routes::default();
        for registration in registrations {
            routes = registration.mount(routes);
        }

        let addr = match self.config.socket_addr() {
            Ok(addr) => addr,
            Err(err) => {
                self.state = LifecycleState::Idle;
                return Err(err);
            }
        };

        // 自行绑定监听器：返回前即可确认端口占用等错误，且拿得到实际端口
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                error!(error = %source, "gRPC 服务器端口绑定失败: {}", addr);
                self.state = LifecycleState::Idle;
                return Err(GrpcServerError::Bind { addr, source });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(source) => {
                self.state = LifecycleState::Idle;
                return Err(GrpcServerError::Bind { addr, source });
            }
        };
        self.local_addr = Some(local_addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let incoming = TcpListenerStream::new(listener);
        let server_handle = tokio::spawn(async move {
            let result = Server::builder()
                .add_routes(routes)
                .serve_with_incoming_shutdown(incoming, async {
                    shutdown_rx.await.ok();
                    info!("收到停止信号，正在停止 gRPC 服务器...");
                })
                .await;

            match result {
                Ok(()) => {
                    info!("gRPC 服务器已退出");
                    Ok(())
                }
                Err(err) => {
                    error!(error = %err, "gRPC 服务器异常退出");
                    Err(err)
                }
            }
        });
        self.server_handle = Some(server_handle);

        self.state = LifecycleState::Running;
        info!(
            "✅ gRPC 服务器已启动: {} ({} 个服务)",
            local_addr, self.service_count
        );

        Ok(())
    }

    /// 启动服务器并阻塞到收到 Ctrl+C，再执行优雅停机
    ///
    /// 服务器任务句柄由管理器持有，进程在 `stop` 完成前不会退出。
    pub async fn run(&mut self, descriptors: Vec<ServiceDescriptor>) -> Result<()> {
        self.start(descriptors).await?;
        self.wait_for_shutdown().await;
        Ok(())
    }

    async fn wait_for_shutdown(&mut self) {
        info!("服务器运行中，按 Ctrl+C 停止...");
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "监听 Ctrl+C 信号失败");
        }
        self.stop().await;
    }

    /// 优雅停机
    ///
    /// 非 `Running` 状态下是受保护的空操作：`start` 从未执行、重复 `stop`
    /// 都不会报错。在途请求的排空由 gRPC 框架自身完成，这里只发出停止请求，
    /// 不额外实现宽限期定时器。停机过程中的任何错误只记录日志，不向外传播。
    pub async fn stop(&mut self) {
        if self.state != LifecycleState::Running {
            debug!("stop 被忽略，当前状态: {:?}", self.state);
            return;
        }

        self.state = LifecycleState::ShuttingDown;
        info!("正在停止 gRPC 服务器...");

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            if shutdown_tx.send(()).is_err() {
                warn!("停止信号发送失败（gRPC 服务器可能已停止）");
            }
        }

        if let Some(server_handle) = self.server_handle.take() {
            match server_handle.await {
                Ok(Ok(())) => {
                    info!("gRPC 服务器已停止");
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "gRPC 服务器停止时出错");
                }
                Err(err) if err.is_cancelled() => {
                    info!("gRPC 服务器等待任务已取消");
                }
                Err(err) => {
                    warn!(error = %err, "等待 gRPC 服务器停止失败");
                }
            }
        }

        self.state = LifecycleState::Stopped;
        info!("✅ gRPC 服务器已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_on_port(port: u16) -> GrpcServerManager {
        GrpcServerManager::new(GrpcServerConfig {
            address: "127.0.0.1".to_string(),
            port,
        })
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let mut manager = manager_on_port(0);
        manager.stop().await;
        assert_eq!(manager.state(), LifecycleState::Idle);
        assert_eq!(manager.local_addr(), None);
    }

    #[tokio::test]
    async fn test_start_with_empty_descriptor_set() {
        let mut manager = manager_on_port(0);
        manager.start(Vec::new()).await.expect("start should succeed");

        assert_eq!(manager.state(), LifecycleState::Running);
        assert_eq!(manager.registered_services(), 0);
        let addr = manager.local_addr().expect("server should be bound");
        assert_ne!(addr.port(), 0);

        manager.stop().await;
        assert_eq!(manager.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_start_rejects_bad_address() {
        let mut manager = GrpcServerManager::new(GrpcServerConfig {
            address: "not an address".to_string(),
            port: 0,
        });
        let err = manager.start(Vec::new()).await.expect_err("start should fail");
        assert!(matches!(err, GrpcServerError::Address { .. }));
        assert_eq!(manager.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut manager = manager_on_port(0);
        manager.start(Vec::new()).await.expect("start should succeed");

        let err = manager.start(Vec::new()).await.expect_err("second start should fail");
        assert!(matches!(
            err,
            GrpcServerError::InvalidState {
                operation: "start",
                state: LifecycleState::Running,
            }
        ));

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_no_restart_after_stop() {
        let mut manager = manager_on_port(0);
        manager.start(Vec::new()).await.expect("start should succeed");
        manager.stop().await;

        let err = manager.start(Vec::new()).await.expect_err("restart should fail");
        assert!(matches!(
            err,
            GrpcServerError::InvalidState {
                state: LifecycleState::Stopped,
                ..
            }
        ));
    }
}
