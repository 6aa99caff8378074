//! 代理工厂与代理
//!
//! 代理实现与目标相同的能力接口，从不直接暴露目标；
//! 每次调用都经由通知链路由到目标

use crate::capability::{ArgValue, CapabilityDescriptor, CapabilityTarget};
use crate::chain::{AdviceChain, Completion};
use crate::error::{FailureOrigin, InvocationError, NoSuchMethodError, WeaveError, WeaveResult};
use crate::joinpoint::JoinPoint;
use crate::registry::AspectRegistry;
use std::fmt;
use std::sync::Arc;

/// 代理工厂
///
/// 持有显式传入的注册表；为实现了能力接口的目标构建代理
pub struct ProxyFactory {
    registry: Arc<AspectRegistry>,
}

impl ProxyFactory {
    /// 创建新的代理工厂
    pub fn new(registry: Arc<AspectRegistry>) -> Self {
        Self { registry }
    }

    /// 关联的注册表
    pub fn registry(&self) -> &Arc<AspectRegistry> {
        &self.registry
    }

    /// 为目标构建能力接口代理
    ///
    /// 要求目标提供能力接口声明的全部方法（按名称、返回类型与参数类型
    /// 核对），否则返回 [`WeaveError::CapabilityMismatch`]。
    /// 首次为某类型构建代理时会计算并缓存其绑定集
    pub fn create_proxy(
        &self,
        target: Arc<dyn CapabilityTarget>,
        capability: Arc<CapabilityDescriptor>,
    ) -> WeaveResult<Proxy> {
        let declared = target.declared_methods();
        let mut missing = Vec::new();
        for required in capability.methods() {
            let satisfied = declared.iter().any(|provided| {
                provided.name == required.name
                    && provided.return_type == required.return_type
                    && provided.parameter_types == required.parameter_types
            });
            if !satisfied {
                missing.push(required.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(WeaveError::CapabilityMismatch {
                target_type: target.type_name().to_string(),
                capability: capability.name().to_string(),
                missing,
            });
        }

        self.registry.bindings_for(target.type_name(), &capability);
        tracing::debug!(
            "Created proxy for '{}' over capability '{}'",
            target.type_name(),
            capability.name()
        );

        Ok(Proxy {
            target,
            capability,
            registry: self.registry.clone(),
        })
    }
}

/// 能力接口代理
///
/// 与目标实现同一能力接口的包装器；所有调用进入通知链，
/// 调用方看到的结果/错误契约与直接调用目标完全一致
pub struct Proxy {
    target: Arc<dyn CapabilityTarget>,
    capability: Arc<CapabilityDescriptor>,
    registry: Arc<AspectRegistry>,
}

impl Proxy {
    /// 代理实现的能力接口
    pub fn capability(&self) -> &CapabilityDescriptor {
        &self.capability
    }

    /// 目标的具体类型名称
    pub fn target_type(&self) -> &str {
        self.target.type_name()
    }

    /// 调用能力接口上的方法
    ///
    /// 构造新的连接点，查找（目标类型, 方法）的绑定集，
    /// 交由通知链执行；首次调用使注册表进入运行阶段
    pub fn call(
        &self,
        method: &str,
        args: Vec<ArgValue>,
    ) -> Result<Completion, InvocationError> {
        self.registry.mark_activated();

        let Some(signature) = self.capability.find_method(method) else {
            return Err(InvocationError::new(
                FailureOrigin::NoSuchMethod,
                Box::new(NoSuchMethodError {
                    capability: self.capability.name().to_string(),
                    method: method.to_string(),
                }),
            ));
        };

        let bindings = self
            .registry
            .bindings_for(self.target.type_name(), &self.capability);
        let set = bindings
            .method(method)
            .unwrap_or_else(|| Arc::new(Default::default()));

        let join_point = JoinPoint::new(self.target.type_name(), signature.clone(), args);
        let target = self.target.as_ref();
        let mut call_target = || target.invoke(method, join_point.args());

        AdviceChain::new(&set, &join_point).execute(&mut call_target)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("target_type", &self.target.type_name())
            .field("capability", &self.capability.name())
            .finish()
    }
}
