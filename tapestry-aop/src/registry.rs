//! 切面注册表
//!
//! 显式构建、显式传递的注册表实例：setup 阶段可写，任一代理开始接收
//! 调用后冻结为只读。按（目标类型, 方法）缓存编译后的绑定集，
//! 首次为某类型构建代理时惰性计算，之后只读复用

use crate::advice::{
    AdviceHandler, AfterFn, AfterReturningFn, AfterThrowingFn, AroundFn, BeforeFn,
};
use crate::aspect::Aspect;
use crate::capability::CapabilityDescriptor;
use crate::error::{WeaveError, WeaveResult};
use crate::pointcut::{Pointcut, PointcutSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 注册成功后返回的句柄
///
/// rank 是注册序（从 0 起单调递增），决定跨切面的执行顺序与
/// Around 的嵌套顺序（先注册者最外层）
#[derive(Debug, Clone)]
pub struct AspectHandle {
    name: String,
    rank: usize,
}

impl AspectHandle {
    /// 切面名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 注册序
    pub fn rank(&self) -> usize {
        self.rank
    }
}

/// 绑定到某方法的一条通知（携带所属切面与标识）
pub(crate) struct Bound<H: ?Sized> {
    pub(crate) aspect: Arc<str>,
    pub(crate) label: Arc<str>,
    pub(crate) handler: Arc<H>,
}

impl<H: ?Sized> Clone for Bound<H> {
    fn clone(&self) -> Self {
        Self {
            aspect: self.aspect.clone(),
            label: self.label.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// 单个方法上五类通知的有序列表
///
/// 注册表计算一次，之后只读；通知链在调用时查找、绝不修改
#[derive(Default)]
pub struct CompiledBindingSet {
    pub(crate) before: Vec<Bound<BeforeFn>>,
    pub(crate) around: Vec<Bound<AroundFn>>,
    pub(crate) after_returning: Vec<Bound<AfterReturningFn>>,
    pub(crate) after_throwing: Vec<Bound<AfterThrowingFn>>,
    pub(crate) after: Vec<Bound<AfterFn>>,
}

impl CompiledBindingSet {
    /// 是否没有任何匹配的通知
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.around.is_empty()
            && self.after_returning.is_empty()
            && self.after_throwing.is_empty()
            && self.after.is_empty()
    }
}

/// 某目标类型在某能力接口下的全部绑定集（按方法名索引）
pub(crate) struct TypeBindings {
    by_method: HashMap<String, Arc<CompiledBindingSet>>,
}

impl TypeBindings {
    pub(crate) fn method(&self, name: &str) -> Option<Arc<CompiledBindingSet>> {
        self.by_method.get(name).cloned()
    }
}

/// 编译后的通知绑定
struct CompiledAdvice {
    pointcut: Pointcut,
    handler: AdviceHandler,
    label: Arc<str>,
}

/// 已注册的切面
struct RegisteredAspect {
    name: Arc<str>,
    bindings: Vec<CompiledAdvice>,
}

/// 切面注册表
pub struct AspectRegistry {
    aspects: RwLock<Vec<Arc<RegisteredAspect>>>,
    bindings: RwLock<HashMap<(String, String), Arc<TypeBindings>>>,
    activated: AtomicBool,
}

impl AspectRegistry {
    /// 创建新的切面注册表
    pub fn new() -> Self {
        Self {
            aspects: RwLock::new(Vec::new()),
            bindings: RwLock::new(HashMap::new()),
            activated: AtomicBool::new(false),
        }
    }

    /// 注册切面
    ///
    /// 编译切面全部切点文本（语法错误在此处失败，注册表状态不变），
    /// 按注册序追加。任一代理开始接收调用后注册会被拒绝
    pub fn register_aspect(&self, aspect: Aspect) -> WeaveResult<AspectHandle> {
        if self.activated.load(Ordering::Acquire) {
            return Err(WeaveError::RegistrationAfterActivation {
                aspect: aspect.name().to_string(),
            });
        }

        let (name, defs) = aspect.into_parts();
        let mut compiled = Vec::with_capacity(defs.len());
        for (index, def) in defs.into_iter().enumerate() {
            let pointcut = match def.source {
                PointcutSource::Text(text) => Pointcut::parse(&text)?,
                PointcutSource::Compiled(pointcut) => pointcut,
            };
            let label = Arc::from(format!("{}#{}", def.handler.kind(), index).as_str());
            compiled.push(CompiledAdvice {
                pointcut,
                handler: def.handler,
                label,
            });
        }

        let registered = Arc::new(RegisteredAspect {
            name: Arc::from(name.as_str()),
            bindings: compiled,
        });
        let rank = {
            let mut aspects = self.aspects.write();
            aspects.push(registered);
            aspects.len() - 1
        };

        // setup 阶段的晚注册使已缓存的绑定集失效，后续查找重新计算
        self.bindings.write().clear();

        tracing::debug!("Registered aspect '{}' with rank {}", name, rank);
        Ok(AspectHandle { name, rank })
    }

    /// 注册的切面数量
    pub fn len(&self) -> usize {
        self.aspects.read().len()
    }

    /// 是否没有注册任何切面
    pub fn is_empty(&self) -> bool {
        self.aspects.read().is_empty()
    }

    /// 是否已进入运行阶段（有代理接收过调用）
    pub fn is_activated(&self) -> bool {
        self.activated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_activated(&self) {
        self.activated.store(true, Ordering::Release);
    }

    /// 获取（惰性计算）某目标类型在某能力接口下的绑定集
    ///
    /// 并发的首次计算是幂等的：竞争双方得到相同的值，先写入者生效
    pub(crate) fn bindings_for(
        &self,
        type_name: &str,
        capability: &CapabilityDescriptor,
    ) -> Arc<TypeBindings> {
        let key = (type_name.to_string(), capability.name().to_string());
        if let Some(existing) = self.bindings.read().get(&key) {
            return existing.clone();
        }

        let computed = Arc::new(self.compute_type_bindings(capability));
        let mut cache = self.bindings.write();
        cache.entry(key).or_insert(computed).clone()
    }

    fn compute_type_bindings(&self, capability: &CapabilityDescriptor) -> TypeBindings {
        let aspects: Vec<Arc<RegisteredAspect>> = self.aspects.read().clone();
        let mut by_method = HashMap::new();

        for signature in capability.methods() {
            let mut set = CompiledBindingSet::default();
            // 跨切面按注册序，切面内按声明序
            for aspect in &aspects {
                for advice in &aspect.bindings {
                    if !advice.pointcut.matches(signature) {
                        continue;
                    }
                    let aspect_name = aspect.name.clone();
                    let label = advice.label.clone();
                    match &advice.handler {
                        AdviceHandler::Before(handler) => set.before.push(Bound {
                            aspect: aspect_name,
                            label,
                            handler: handler.clone(),
                        }),
                        AdviceHandler::Around(handler) => set.around.push(Bound {
                            aspect: aspect_name,
                            label,
                            handler: handler.clone(),
                        }),
                        AdviceHandler::AfterReturning(handler) => {
                            set.after_returning.push(Bound {
                                aspect: aspect_name,
                                label,
                                handler: handler.clone(),
                            })
                        }
                        AdviceHandler::AfterThrowing(handler) => set.after_throwing.push(Bound {
                            aspect: aspect_name,
                            label,
                            handler: handler.clone(),
                        }),
                        AdviceHandler::After(handler) => set.after.push(Bound {
                            aspect: aspect_name,
                            label,
                            handler: handler.clone(),
                        }),
                    }
                }
            }
            by_method.insert(signature.name.clone(), Arc::new(set));
        }

        TypeBindings { by_method }
    }
}

impl Default for AspectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MethodSignature;

    fn calculator_capability() -> CapabilityDescriptor {
        CapabilityDescriptor::new("demo.Calculator")
            .method(MethodSignature::new(
                "i64",
                "demo.Calculator",
                "multiply",
                ["i64", "i64"],
            ))
            .method(MethodSignature::new("void", "demo.Calculator", "reset", Vec::<String>::new()))
    }

    fn noop_before(name: &str) -> Aspect {
        Aspect::new(name).before("execution(* demo.Calculator.*(..))", |_jp| Ok(()))
    }

    #[test]
    fn test_ranks_are_monotonic_from_zero() {
        let registry = AspectRegistry::new();
        let first = registry.register_aspect(noop_before("first")).unwrap();
        let second = registry.register_aspect(noop_before("second")).unwrap();

        assert_eq!(first.rank(), 0);
        assert_eq!(second.rank(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_binding_order_follows_rank_then_declaration() {
        let registry = AspectRegistry::new();
        registry
            .register_aspect(
                Aspect::new("a1")
                    .before("execution(* demo.Calculator.*(..))", |_jp| Ok(()))
                    .before("execution(* demo.Calculator.*(..))", |_jp| Ok(())),
            )
            .unwrap();
        registry.register_aspect(noop_before("a2")).unwrap();

        let capability = calculator_capability();
        let bindings = registry.bindings_for("demo.CalculatorService", &capability);
        let set = bindings.method("multiply").unwrap();

        let order: Vec<(String, String)> = set
            .before
            .iter()
            .map(|b| (b.aspect.to_string(), b.label.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a1".to_string(), "before#0".to_string()),
                ("a1".to_string(), "before#1".to_string()),
                ("a2".to_string(), "before#0".to_string()),
            ]
        );
    }

    #[test]
    fn test_pointcut_selects_methods() {
        let registry = AspectRegistry::new();
        registry
            .register_aspect(
                Aspect::new("mul-only")
                    .before("execution(* demo.Calculator.multiply(..))", |_jp| Ok(())),
            )
            .unwrap();

        let capability = calculator_capability();
        let bindings = registry.bindings_for("demo.CalculatorService", &capability);
        assert!(!bindings.method("multiply").unwrap().is_empty());
        assert!(bindings.method("reset").unwrap().is_empty());
        assert!(bindings.method("missing").is_none());
    }

    #[test]
    fn test_parse_error_surfaces_at_registration() {
        let registry = AspectRegistry::new();
        let result = registry
            .register_aspect(Aspect::new("broken").before("execution(nonsense", |_jp| Ok(())));

        assert!(matches!(result, Err(WeaveError::PointcutParse { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registration_rejected_after_activation() {
        let registry = AspectRegistry::new();
        registry.register_aspect(noop_before("early")).unwrap();

        registry.mark_activated();
        let result = registry.register_aspect(noop_before("late"));
        assert!(matches!(
            result,
            Err(WeaveError::RegistrationAfterActivation { .. })
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_late_setup_registration_invalidates_cache() {
        let registry = AspectRegistry::new();
        registry.register_aspect(noop_before("first")).unwrap();

        let capability = calculator_capability();
        let before = registry.bindings_for("demo.CalculatorService", &capability);
        assert_eq!(before.method("multiply").unwrap().before.len(), 1);

        // 仍在 setup 阶段：注册必须反映到后续查找
        registry.register_aspect(noop_before("second")).unwrap();
        let after = registry.bindings_for("demo.CalculatorService", &capability);
        assert_eq!(after.method("multiply").unwrap().before.len(), 2);
    }
}
