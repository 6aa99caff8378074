//! Tapestry AOP - 运行时切面织入引擎
//!
//! 在不修改被调用代码的前提下，把声明式的横切行为（日志、计时、校验）
//! 按确定的顺序织入到方法调用周围。支持：
//! - 文本切点表达式，注册期一次性编译（语法错误绝不推迟到调用期）
//! - 五种通知类型（Before、AfterReturning、AfterThrowing、After、Around）
//! - 基于能力接口的代理拦截，无需反射
//! - 跨切面按注册序、切面内按声明序的确定执行顺序
//! - 明确定义的失败传播：原始结果永不被后续通知的失败覆盖
//!
//! 引擎本身完全同步、无内部线程：它在调用方的线程上执行，
//! setup 阶段结束后注册表与绑定集只读，可被任意多的并发调用共享

pub mod advice;
pub mod aspect;
pub mod capability;
pub mod chain;
pub mod error;
pub mod error_info;
pub mod joinpoint;
pub mod pointcut;
pub mod proxy;
pub mod registry;

// 重新导出核心类型
pub use advice::{AdviceHandler, AdviceKind, AdviceResult};
pub use aspect::{error_logging_aspect, logging_aspect, timing_aspect, Aspect};
pub use capability::{
    erased, ArgValue, CapabilityDescriptor, CapabilityTarget, MethodSignature, ReturnValue,
    TargetError, TargetResult,
};
pub use chain::Completion;
pub use error::{
    AdviceFailure, AdvicePhase, FailureOrigin, InvocationError, NoSuchMethodError, WeaveError,
    WeaveResult,
};
pub use error_info::ErrorInfo;
pub use joinpoint::{JoinPoint, ProceedingJoinPoint};
pub use pointcut::{Pointcut, PointcutExpression, PointcutSource};
pub use proxy::{Proxy, ProxyFactory};
pub use registry::{AspectHandle, AspectRegistry, CompiledBindingSet};

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{AdviceKind, AdviceResult};
    pub use crate::aspect::Aspect;
    pub use crate::capability::{
        erased, ArgValue, CapabilityDescriptor, CapabilityTarget, MethodSignature, ReturnValue,
        TargetError, TargetResult,
    };
    pub use crate::chain::Completion;
    pub use crate::error::{
        AdviceFailure, FailureOrigin, InvocationError, WeaveError, WeaveResult,
    };
    pub use crate::error_info::ErrorInfo;
    pub use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
    pub use crate::pointcut::{Pointcut, PointcutExpression};
    pub use crate::proxy::{Proxy, ProxyFactory};
    pub use crate::registry::{AspectHandle, AspectRegistry};
}
