//! 通知链执行引擎
//!
//! 单次调用的状态机：
//!
//! ```text
//! NotStarted → RunningBefore → Proceeding
//!            → (RunningAfterReturning | RunningAfterThrowing)
//!            → RunningAfter → Completed
//! ```
//!
//! 失败语义：Before 失败短路目标与 Around 链；目标/Around 失败原样传播；
//! 后续观察阶段（AfterReturning / AfterThrowing / After）自身的失败
//! 以 suppressed 形式附加到既定结果上，绝不覆盖它

use crate::capability::{ReturnValue, TargetResult};
use crate::error::{AdviceFailure, AdvicePhase, FailureOrigin, InvocationError};
use crate::joinpoint::{JoinPoint, ProceedingJoinPoint};
use crate::registry::{Bound, CompiledBindingSet};
use crate::advice::AroundFn;
use std::any::Any;
use std::fmt;

/// 链执行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChainPhase {
    NotStarted,
    RunningBefore,
    Proceeding,
    RunningAfterReturning,
    RunningAfterThrowing,
    RunningAfter,
    Completed,
}

/// 一次调用的正常完成结果
///
/// 携带返回值与观察阶段产生的次级失败（诊断用）
pub struct Completion {
    value: ReturnValue,
    suppressed: Vec<AdviceFailure>,
}

impl Completion {
    /// 返回值
    pub fn value(&self) -> &ReturnValue {
        &self.value
    }

    /// 取出返回值
    pub fn into_value(self) -> ReturnValue {
        self.value
    }

    /// 尝试还原返回值类型
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// 附加的次级失败
    pub fn suppressed(&self) -> &[AdviceFailure] {
        &self.suppressed
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("suppressed", &self.suppressed.len())
            .finish()
    }
}

/// 通知链：围绕一次目标调用执行匹配的通知
pub(crate) struct AdviceChain<'a> {
    bindings: &'a CompiledBindingSet,
    join_point: &'a JoinPoint,
}

impl<'a> AdviceChain<'a> {
    pub(crate) fn new(bindings: &'a CompiledBindingSet, join_point: &'a JoinPoint) -> Self {
        Self {
            bindings,
            join_point,
        }
    }

    /// 执行一次完整的调用
    ///
    /// `target` 是最内层的续体（真正的目标方法调用）；
    /// Around 通知多次 `proceed()` 会逐次重新执行它
    pub(crate) fn execute(
        &self,
        target: &mut dyn FnMut() -> TargetResult,
    ) -> Result<Completion, InvocationError> {
        let mut phase = ChainPhase::NotStarted;
        tracing::trace!(phase = ?phase, join_point = %self.join_point, "advice chain started");

        let mut suppressed: Vec<AdviceFailure> = Vec::new();

        // 1. 前置通知：任一失败则短路，目标与 Around 链不再进入
        phase = ChainPhase::RunningBefore;
        tracing::trace!(phase = ?phase, join_point = %self.join_point, "running before advice");
        let mut outcome = Ok(());
        for advice in &self.bindings.before {
            if let Err(error) = (*advice.handler)(self.join_point) {
                tracing::debug!(
                    "Before advice '{}' of aspect '{}' failed, short-circuiting: {}",
                    advice.label,
                    advice.aspect,
                    error
                );
                outcome = Err((
                    FailureOrigin::Advice {
                        aspect: advice.aspect.to_string(),
                        advice: advice.label.to_string(),
                    },
                    error,
                ));
                break;
            }
        }

        // 2–3. Around 链与目标调用：先注册者最外层
        let outcome = match outcome {
            Ok(()) => {
                phase = ChainPhase::Proceeding;
                tracing::trace!(phase = ?phase, join_point = %self.join_point, "proceeding to target");
                run_layers(&self.bindings.around, self.join_point, target)
                    .map_err(|error| (FailureOrigin::Target, error))
            }
            Err(failure) => Err(failure),
        };

        // 4. 返回后 / 异常通知：只读观察，自身失败被抑制
        let outcome = match outcome {
            Ok(value) => {
                phase = ChainPhase::RunningAfterReturning;
                tracing::trace!(phase = ?phase, join_point = %self.join_point, "target returned");
                for advice in &self.bindings.after_returning {
                    if let Err(error) = (*advice.handler)(self.join_point, &value) {
                        suppressed.push(AdviceFailure {
                            aspect: advice.aspect.to_string(),
                            advice: advice.label.to_string(),
                            phase: AdvicePhase::AfterReturning,
                            error,
                        });
                    }
                }
                Ok(value)
            }
            Err((origin, error)) => {
                phase = ChainPhase::RunningAfterThrowing;
                tracing::trace!(phase = ?phase, join_point = %self.join_point, "target raised");
                for advice in &self.bindings.after_throwing {
                    if let Err(secondary) = (*advice.handler)(self.join_point, error.as_ref()) {
                        suppressed.push(AdviceFailure {
                            aspect: advice.aspect.to_string(),
                            advice: advice.label.to_string(),
                            phase: AdvicePhase::AfterThrowing,
                            error: secondary,
                        });
                    }
                }
                Err((origin, error))
            }
        };

        // 5. 后置通知：两条路径都执行
        phase = ChainPhase::RunningAfter;
        tracing::trace!(phase = ?phase, join_point = %self.join_point, "running after advice");
        for advice in &self.bindings.after {
            if let Err(error) = (*advice.handler)(self.join_point) {
                suppressed.push(AdviceFailure {
                    aspect: advice.aspect.to_string(),
                    advice: advice.label.to_string(),
                    phase: AdvicePhase::After,
                    error,
                });
            }
        }

        for failure in &suppressed {
            tracing::warn!("Suppressed advice failure in {}: {}", self.join_point, failure);
        }

        phase = ChainPhase::Completed;
        tracing::trace!(phase = ?phase, join_point = %self.join_point, "advice chain completed");

        // 6. 既定结果原样返回，次级失败附加其上
        match outcome {
            Ok(value) => Ok(Completion { value, suppressed }),
            Err((origin, error)) => {
                Err(InvocationError::new(origin, error).with_suppressed(suppressed))
            }
        }
    }
}

/// 递归组合 Around 层：`layers[0]` 最外层，最内层是目标调用
fn run_layers(
    layers: &[Bound<AroundFn>],
    join_point: &JoinPoint,
    target: &mut dyn FnMut() -> TargetResult,
) -> TargetResult {
    match layers.split_first() {
        None => target(),
        Some((outer, inner)) => {
            let mut proceed = || run_layers(inner, join_point, &mut *target);
            let mut pjp = ProceedingJoinPoint::new(join_point, &mut proceed);
            (*outer.handler)(&mut pjp)
        }
    }
}
