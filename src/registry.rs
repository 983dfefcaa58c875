//! 服务绑定注册模块
//!
//! 宿主应用把每个 gRPC 服务实现和它的绑定函数打包成 [`ServiceDescriptor`]，
//! 由 [`resolve`] 统一解析为可挂载到服务器上的 [`ServiceRegistration`]。
//! 绑定函数在注册时就是强类型的闭包，解析阶段只校验描述符携带的实现类型
//! 与绑定函数声明的类型是否一致，校验失败立即中止启动。

use std::any::{Any, TypeId};
use std::convert::Infallible;

use tonic::body::Body;
use tonic::server::NamedService;
use tonic::service::Routes;
use tower::Service;
use tracing::info;

use crate::error::{GrpcServerError, Result};

type ErasedService = Box<dyn Any + Send>;
type BindFn = Box<dyn FnOnce(ErasedService) -> std::result::Result<ServiceRegistration, ErasedService> + Send>;

/// 框架原生的服务注册句柄
///
/// 持有服务名（仅用于日志）和一个把服务挂载到 [`Routes`] 上的闭包。
/// 每个服务创建一次，交给服务器构建流程后由运行中的服务器独占持有。
pub struct ServiceRegistration {
    name: &'static str,
    mount: Box<dyn FnOnce(Routes) -> Routes + Send>,
}

impl ServiceRegistration {
    /// 从 protoc 生成的服务包装实例创建注册句柄
    pub fn new<S>(service: S) -> Self
    where
        S: Service<http::Request<Body>, Response = http::Response<Body>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Self {
            name: S::NAME,
            mount: Box::new(move |routes| routes.add_service(service)),
        }
    }

    /// gRPC 服务名（如 `helloworld.Greeter`）
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn mount(self, routes: Routes) -> Routes {
        (self.mount)(routes)
    }
}

impl std::fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// 强类型的服务绑定函数
///
/// `Locator` 是 protoc 生成的服务包装类型（如 `GreeterServer<MyGreeter>`），
/// 只用于诊断信息；绑定闭包固定形如 `FnOnce(Impl) -> ServiceRegistration`。
pub struct ServiceBinder {
    locator: &'static str,
    expected: &'static str,
    accepts: TypeId,
    bind: BindFn,
}

impl ServiceBinder {
    /// 为服务包装类型 `Locator` 创建绑定函数，接受具体实现类型 `T`
    ///
    /// # 示例
    /// ```rust,ignore
    /// let binder = ServiceBinder::for_server::<GreeterServer<MyGreeter>, MyGreeter, _>(
    ///     |svc| ServiceRegistration::new(GreeterServer::new(svc)),
    /// );
    /// ```
    pub fn for_server<L, T, F>(bind: F) -> Self
    where
        L: 'static,
        T: Send + 'static,
        F: FnOnce(T) -> ServiceRegistration + Send + 'static,
    {
        Self {
            locator: std::any::type_name::<L>(),
            expected: std::any::type_name::<T>(),
            accepts: TypeId::of::<T>(),
            bind: Box::new(move |service| service.downcast::<T>().map(|svc| bind(*svc))),
        }
    }

    /// 绑定定位类型的完整名称
    pub fn locator(&self) -> &'static str {
        self.locator
    }

    /// 绑定函数接受的实现类型
    pub fn accepts(&self) -> TypeId {
        self.accepts
    }
}

impl std::fmt::Debug for ServiceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBinder")
            .field("locator", &self.locator)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

/// 服务描述符：一个服务实现实例配一个绑定函数
pub struct ServiceDescriptor {
    service: ErasedService,
    provided: &'static str,
    binder: ServiceBinder,
}

impl ServiceDescriptor {
    pub fn new<T: Send + 'static>(service: T, binder: ServiceBinder) -> Self {
        Self {
            service: Box::new(service),
            provided: std::any::type_name::<T>(),
            binder,
        }
    }

    /// 描述符携带的服务实现类型名称
    pub fn provided(&self) -> &'static str {
        self.provided
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("provided", &self.provided)
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

/// 解析描述符集合，按输入顺序产出注册句柄
///
/// 遇到第一个无法解析的描述符立即失败；返回的错误信息包含绑定定位类型、
/// 期望的实现类型和实际提供的实现类型，运维无需翻源码即可定位配置问题。
pub fn resolve(descriptors: Vec<ServiceDescriptor>) -> Result<Vec<ServiceRegistration>> {
    let mut registrations = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        let ServiceDescriptor {
            service,
            provided,
            binder,
        } = descriptor;
        let ServiceBinder {
            locator,
            expected,
            bind,
            ..
        } = binder;

        match bind(service) {
            Ok(registration) => {
                info!("✅ '{}' 服务已注册", registration.name());
                registrations.push(registration);
            }
            Err(_) => {
                return Err(GrpcServerError::Configuration {
                    locator: locator.to_string(),
                    expected: expected.to_string(),
                    provided: provided.to_string(),
                });
            }
        }
    }

    Ok(registrations)
}
