//! 切面（Aspect）定义与构建
//!
//! 切面是横切关注点的模块化：一个命名的、有序的通知绑定序列。
//! 声明顺序在执行与嵌套中均有意义，构建后交给注册表编译

use crate::advice::{
    AdviceHandler, AdviceResult, AfterFn, AfterReturningFn, AfterThrowingFn, AroundFn, BeforeFn,
};
use crate::capability::{ReturnValue, TargetResult};
use crate::error_info::ErrorInfo;
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use crate::pointcut::PointcutSource;
use std::sync::Arc;
use std::time::Instant;

/// 切面中的一条通知声明（切点在注册时编译）
pub(crate) struct AdviceDef {
    pub(crate) source: PointcutSource,
    pub(crate) handler: AdviceHandler,
}

/// 切面：有序的通知绑定集合
///
/// 使用构建器按声明顺序挂接通知：
///
/// ```ignore
/// let aspect = Aspect::new("audit")
///     .before("execution(* billing..*(..))", |jp| {
///         tracing::info!("→ {}", jp);
///         Ok(())
///     })
///     .around("execution(* billing..*(..))", |pjp| pjp.proceed());
/// registry.register_aspect(aspect)?;
/// ```
pub struct Aspect {
    name: String,
    bindings: Vec<AdviceDef>,
}

impl Aspect {
    /// 创建新的切面
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    /// 切面名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 挂接前置通知
    pub fn before<P, F>(mut self, pointcut: P, handler: F) -> Self
    where
        P: Into<PointcutSource>,
        F: Fn(&JoinPoint) -> AdviceResult + Send + Sync + 'static,
    {
        self.bindings.push(AdviceDef {
            source: pointcut.into(),
            handler: AdviceHandler::Before(Arc::new(handler) as Arc<BeforeFn>),
        });
        self
    }

    /// 挂接返回后通知（只读观察返回值）
    pub fn after_returning<P, F>(mut self, pointcut: P, handler: F) -> Self
    where
        P: Into<PointcutSource>,
        F: Fn(&JoinPoint, &ReturnValue) -> AdviceResult + Send + Sync + 'static,
    {
        self.bindings.push(AdviceDef {
            source: pointcut.into(),
            handler: AdviceHandler::AfterReturning(Arc::new(handler) as Arc<AfterReturningFn>),
        });
        self
    }

    /// 挂接异常通知（只读观察异常，传播不受影响）
    pub fn after_throwing<P, F>(mut self, pointcut: P, handler: F) -> Self
    where
        P: Into<PointcutSource>,
        F: Fn(&JoinPoint, &(dyn std::error::Error + Send + Sync)) -> AdviceResult
            + Send
            + Sync
            + 'static,
    {
        self.bindings.push(AdviceDef {
            source: pointcut.into(),
            handler: AdviceHandler::AfterThrowing(Arc::new(handler) as Arc<AfterThrowingFn>),
        });
        self
    }

    /// 挂接后置通知（成功或失败都执行）
    pub fn after<P, F>(mut self, pointcut: P, handler: F) -> Self
    where
        P: Into<PointcutSource>,
        F: Fn(&JoinPoint) -> AdviceResult + Send + Sync + 'static,
    {
        self.bindings.push(AdviceDef {
            source: pointcut.into(),
            handler: AdviceHandler::After(Arc::new(handler) as Arc<AfterFn>),
        });
        self
    }

    /// 挂接环绕通知
    pub fn around<P, F>(mut self, pointcut: P, handler: F) -> Self
    where
        P: Into<PointcutSource>,
        F: Fn(&mut ProceedingJoinPoint) -> TargetResult + Send + Sync + 'static,
    {
        self.bindings.push(AdviceDef {
            source: pointcut.into(),
            handler: AdviceHandler::Around(Arc::new(handler) as Arc<AroundFn>),
        });
        self
    }

    /// 已声明的通知数量
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 是否未声明任何通知
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<AdviceDef>) {
        (self.name, self.bindings)
    }
}

// ============================================================================
// 预定义的常用切面
// ============================================================================

/// 日志切面：进入/退出时记录
pub fn logging_aspect(pointcut: &str) -> Aspect {
    Aspect::new("LoggingAspect")
        .before(pointcut, |jp: &JoinPoint| {
            tracing::info!("→ Entering: {}", jp);
            Ok(())
        })
        .after(pointcut, |jp: &JoinPoint| {
            tracing::info!("← Exiting: {} (took {:?})", jp, jp.elapsed());
            Ok(())
        })
}

/// 性能监控切面：环绕计时，超过阈值告警
pub fn timing_aspect(pointcut: &str, threshold_ms: u128) -> Aspect {
    Aspect::new("PerformanceAspect").around(pointcut, move |pjp: &mut ProceedingJoinPoint| {
        let start = Instant::now();
        let result = pjp.proceed();
        let elapsed = start.elapsed().as_millis();
        if elapsed > threshold_ms {
            tracing::warn!(
                "Slow method detected: {} took {}ms (threshold: {}ms)",
                pjp.join_point(),
                elapsed,
                threshold_ms
            );
        }
        result
    })
}

/// 异常日志切面：记录异常的完整描述（含错误源链）
pub fn error_logging_aspect(pointcut: &str) -> Aspect {
    Aspect::new("ExceptionHandlingAspect").after_throwing(
        pointcut,
        |jp: &JoinPoint, error: &(dyn std::error::Error + Send + Sync)| {
            let info = ErrorInfo::from_dyn(error);
            tracing::error!("Exception in {}: {}", jp, info.full_description());
            Ok(())
        },
    )
}
