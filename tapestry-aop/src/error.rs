//! 错误类型定义
//!
//! 注册期/构建期错误（[`WeaveError`]）与调用期失败结果（[`InvocationError`]）
//! 严格分开：切点语法错误绝不会推迟到调用时才暴露

use crate::capability::TargetError;
use std::fmt;
use thiserror::Error;

/// 织入引擎的注册期/构建期错误
#[derive(Debug, Error)]
pub enum WeaveError {
    /// 切点表达式语法错误（注册时抛出，调用时绝不出现）
    #[error("invalid pointcut expression '{expression}': {reason}")]
    PointcutParse { expression: String, reason: String },

    /// 目标未实现所要求的能力接口（代理构建时抛出）
    #[error("target '{target_type}' does not implement capability '{capability}': missing {missing:?}")]
    CapabilityMismatch {
        target_type: String,
        capability: String,
        missing: Vec<String>,
    },

    /// 代理已开始接收调用之后再注册切面
    #[error("aspect '{aspect}' registered after proxies started receiving calls")]
    RegistrationAfterActivation { aspect: String },
}

impl WeaveError {
    pub(crate) fn parse(expression: &str, reason: impl Into<String>) -> Self {
        Self::PointcutParse {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

pub type WeaveResult<T> = Result<T, WeaveError>;

/// 通知链的执行阶段（用于失败定位）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvicePhase {
    Before,
    AfterReturning,
    AfterThrowing,
    After,
}

/// 通知处理器自身抛出的错误
///
/// 携带处理器标识（所属切面 + 通知标签）与原始错误
#[derive(Debug, Error)]
#[error("advice '{advice}' of aspect '{aspect}' failed in {phase:?} phase: {error}")]
pub struct AdviceFailure {
    /// 所属切面名称
    pub aspect: String,

    /// 通知标签（如 `before#0`）
    pub advice: String,

    /// 失败发生的阶段
    pub phase: AdvicePhase,

    /// 处理器抛出的原始错误
    #[source]
    pub error: TargetError,
}

/// 调用失败的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOrigin {
    /// 目标方法或某个 Around 层抛出
    Target,

    /// 某个 Before 通知抛出（目标从未执行）
    Advice { aspect: String, advice: String },

    /// 能力接口上不存在被调用的方法
    NoSuchMethod,
}

/// 能力接口上不存在的方法被调用
#[derive(Debug, Error)]
#[error("no method '{method}' declared on capability '{capability}'")]
pub struct NoSuchMethodError {
    pub capability: String,
    pub method: String,
}

/// 一次代理调用的失败结果
///
/// `error` 原样携带最初抛出的值（类型与内容不变，可 downcast 还原）；
/// 后续通知阶段产生的次级失败以 suppressed 形式附加，绝不覆盖原始结果
#[derive(Debug)]
pub struct InvocationError {
    origin: FailureOrigin,
    error: TargetError,
    suppressed: Vec<AdviceFailure>,
}

impl InvocationError {
    pub(crate) fn new(origin: FailureOrigin, error: TargetError) -> Self {
        Self {
            origin,
            error,
            suppressed: Vec::new(),
        }
    }

    pub(crate) fn with_suppressed(mut self, suppressed: Vec<AdviceFailure>) -> Self {
        self.suppressed = suppressed;
        self
    }

    /// 失败来源
    pub fn origin(&self) -> &FailureOrigin {
        &self.origin
    }

    /// 最初抛出的错误值
    pub fn original(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// 尝试还原为具体错误类型
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        self.error.downcast_ref::<T>()
    }

    /// 取出原始错误值
    pub fn into_original(self) -> TargetError {
        self.error
    }

    /// 附加的次级失败（诊断用）
    pub fn suppressed(&self) -> &[AdviceFailure] {
        &self.suppressed
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.suppressed.is_empty() {
            write!(f, " ({} suppressed advice failure(s))", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let original: &(dyn std::error::Error + 'static) = self.error.as_ref();
        Some(original)
    }
}
