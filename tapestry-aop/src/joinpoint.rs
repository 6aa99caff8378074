//! 连接点（JoinPoint）定义
//!
//! 连接点表示一次被拦截的方法调用的上下文，逐调用创建、随调用结束丢弃

use crate::capability::{ArgValue, MethodSignature, TargetResult};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 连接点信息
///
/// 包含方法调用时的上下文：目标类型、方法签名、参数、进入时刻
#[derive(Clone)]
pub struct JoinPoint {
    target_type: Arc<str>,
    signature: Arc<MethodSignature>,
    args: Vec<ArgValue>,
    timestamp: Instant,
}

impl JoinPoint {
    pub(crate) fn new(
        target_type: &str,
        signature: Arc<MethodSignature>,
        args: Vec<ArgValue>,
    ) -> Self {
        Self {
            target_type: Arc::from(target_type),
            signature,
            args,
            timestamp: Instant::now(),
        }
    }

    /// 目标的具体类型名称
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// 方法名称
    pub fn method_name(&self) -> &str {
        &self.signature.name
    }

    /// 方法签名
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// 调用参数
    pub fn args(&self) -> &[ArgValue] {
        &self.args
    }

    /// 尝试取第 `index` 个参数并还原类型
    pub fn arg<T: Any + Send + Sync>(&self, index: usize) -> Option<&T> {
        self.args.get(index)?.downcast_ref::<T>()
    }

    /// 签名声明的错误类型
    pub fn error_types(&self) -> &[String] {
        &self.signature.error_types
    }

    /// 进入连接点的时刻
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// 自进入连接点起经过的时间
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("target_type", &self.target_type)
            .field("signature", &self.signature.to_string())
            .field("arg_count", &self.args.len())
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.target_type, self.signature.name)
    }
}

/// 环绕通知的连接点
///
/// 持有「执行下一层」的续体：下一层是更内侧的 Around 通知，
/// 最内层是目标方法本身
pub struct ProceedingJoinPoint<'a> {
    join_point: &'a JoinPoint,
    proceed: &'a mut (dyn FnMut() -> TargetResult + 'a),
}

impl<'a> ProceedingJoinPoint<'a> {
    pub(crate) fn new(
        join_point: &'a JoinPoint,
        proceed: &'a mut (dyn FnMut() -> TargetResult + 'a),
    ) -> Self {
        Self { join_point, proceed }
    }

    /// 连接点信息
    pub fn join_point(&self) -> &JoinPoint {
        self.join_point
    }

    /// 执行下一层（内层 Around 通知或目标方法）
    ///
    /// 不调用表示有意短路（返回值即成为调用结果，内层不再执行）；
    /// 多次调用会逐次重新执行内层
    pub fn proceed(&mut self) -> TargetResult {
        (self.proceed)()
    }
}

impl fmt::Debug for ProceedingJoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProceedingJoinPoint")
            .field("join_point", &self.join_point)
            .finish()
    }
}
