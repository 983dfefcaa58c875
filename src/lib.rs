//! Flare gRPC Host 公共库
//!
//! 在宿主进程内托管一个内嵌 gRPC 服务器：
//! - 把宿主注册的服务实现通过强类型绑定函数解析为框架原生的注册句柄
//! - 统一管理服务器的启动、存活等待和优雅停机
//!
//! # 示例
//! ```rust,ignore
//! use flare_grpc_host::{
//!     GrpcServerConfig, GrpcServerManager, ServiceBinder, ServiceDescriptor,
//!     ServiceRegistration,
//! };
//!
//! let binder = ServiceBinder::for_server::<GreeterServer<MyGreeter>, MyGreeter, _>(
//!     |svc| ServiceRegistration::new(GreeterServer::new(svc)),
//! );
//! let descriptors = vec![ServiceDescriptor::new(MyGreeter::default(), binder)];
//!
//! let mut manager = GrpcServerManager::new(GrpcServerConfig::load(None));
//! manager.run(descriptors).await?;
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod tracing;

pub use config::GrpcServerConfig;
pub use error::{GrpcServerError, Result};
pub use registry::{ServiceBinder, ServiceDescriptor, ServiceRegistration, resolve};
pub use server::{GrpcServerManager, LifecycleState};
pub use crate::tracing::{init_tracing, try_init_tracing};
