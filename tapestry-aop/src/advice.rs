//! 通知（Advice）定义
//!
//! 五种通知类型与它们的处理器形状；处理器是普通的 `Fn` trait object，
//! 由切面按声明顺序携带

use crate::capability::{ReturnValue, TargetError, TargetResult};
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use std::fmt;
use std::sync::Arc;

/// 通知自身的执行结果：`Err` 表示通知抛出
pub type AdviceResult = Result<(), TargetError>;

/// 前置通知处理器
pub type BeforeFn = dyn Fn(&JoinPoint) -> AdviceResult + Send + Sync;

/// 后置（finally）通知处理器
pub type AfterFn = dyn Fn(&JoinPoint) -> AdviceResult + Send + Sync;

/// 返回后通知处理器（只读观察，不能替换返回值）
pub type AfterReturningFn = dyn Fn(&JoinPoint, &ReturnValue) -> AdviceResult + Send + Sync;

/// 异常通知处理器（只读观察，不能吞掉异常）
pub type AfterThrowingFn =
    dyn Fn(&JoinPoint, &(dyn std::error::Error + Send + Sync)) -> AdviceResult + Send + Sync;

/// 环绕通知处理器：经由 `proceed()` 控制内层执行
pub type AroundFn = dyn Fn(&mut ProceedingJoinPoint) -> TargetResult + Send + Sync;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceKind {
    /// 前置通知
    Before,
    /// 返回后通知（正常返回时执行）
    AfterReturning,
    /// 异常通知（抛出时执行）
    AfterThrowing,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 环绕通知（可以控制内层执行）
    Around,
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdviceKind::Before => "before",
            AdviceKind::AfterReturning => "after-returning",
            AdviceKind::AfterThrowing => "after-throwing",
            AdviceKind::After => "after",
            AdviceKind::Around => "around",
        };
        write!(f, "{}", name)
    }
}

/// 通知处理器（类型随通知种类变化）
#[derive(Clone)]
pub enum AdviceHandler {
    Before(Arc<BeforeFn>),
    AfterReturning(Arc<AfterReturningFn>),
    AfterThrowing(Arc<AfterThrowingFn>),
    After(Arc<AfterFn>),
    Around(Arc<AroundFn>),
}

impl AdviceHandler {
    /// 通知类型
    pub fn kind(&self) -> AdviceKind {
        match self {
            AdviceHandler::Before(_) => AdviceKind::Before,
            AdviceHandler::AfterReturning(_) => AdviceKind::AfterReturning,
            AdviceHandler::AfterThrowing(_) => AdviceKind::AfterThrowing,
            AdviceHandler::After(_) => AdviceKind::After,
            AdviceHandler::Around(_) => AdviceKind::Around,
        }
    }
}

impl fmt::Debug for AdviceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdviceHandler({})", self.kind())
    }
}
