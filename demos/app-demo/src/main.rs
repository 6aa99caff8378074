use anyhow::Result;
use std::sync::Arc;
use tapestry_aop::prelude::*;
use tapestry_aop::{logging_aspect, timing_aspect};
use thiserror::Error;

// ==================== 业务服务 ====================

#[derive(Debug, Error, PartialEq, Eq)]
#[error("division by zero")]
struct DivisionByZero;

/// 计算服务：被织入的目标
struct CalculatorService;

impl CalculatorService {
    fn multiply(&self, a: i64, b: i64) -> i64 {
        a * b
    }

    fn divide(&self, a: i64, b: i64) -> Result<i64, DivisionByZero> {
        if b == 0 {
            Err(DivisionByZero)
        } else {
            Ok(a / b)
        }
    }
}

// 能力接口的类型擦除分发入口（DI/配置层通常会生成这段代码）
impl CapabilityTarget for CalculatorService {
    fn type_name(&self) -> &str {
        "demo.CalculatorService"
    }

    fn declared_methods(&self) -> Vec<MethodSignature> {
        vec![
            MethodSignature::new("i64", "demo.Calculator", "multiply", ["i64", "i64"]),
            MethodSignature::new("i64", "demo.Calculator", "divide", ["i64", "i64"]),
        ]
    }

    fn invoke(&self, method: &str, args: &[ArgValue]) -> TargetResult {
        match method {
            "multiply" => {
                let a = arg_i64(args, 0)?;
                let b = arg_i64(args, 1)?;
                Ok(erased(self.multiply(a, b)))
            }
            "divide" => {
                let a = arg_i64(args, 0)?;
                let b = arg_i64(args, 1)?;
                let value = self.divide(a, b)?;
                Ok(erased(value))
            }
            other => Err(format!("unknown method '{}'", other).into()),
        }
    }
}

fn arg_i64(args: &[ArgValue], index: usize) -> Result<i64, TargetError> {
    args.get(index)
        .and_then(|arg| arg.downcast_ref::<i64>())
        .copied()
        .ok_or_else(|| format!("argument {} is not an i64", index).into())
}

// ==================== 切面定义 ====================

/// 参数校验切面：除数为 0 时在进入目标前拒绝
fn validation_aspect() -> Aspect {
    Aspect::new("ValidationAspect").before(
        "execution(* demo.Calculator.divide(i64, i64))",
        |jp: &JoinPoint| {
            let divisor = jp.arg::<i64>(1).copied().unwrap_or(0);
            if divisor == 0 {
                tracing::warn!("Rejecting {}: divisor is zero", jp);
                return Err(Box::new(DivisionByZero) as TargetError);
            }
            Ok(())
        },
    )
}

fn capability() -> Arc<CapabilityDescriptor> {
    Arc::new(
        CapabilityDescriptor::new("demo.Calculator")
            .method(MethodSignature::new(
                "i64",
                "demo.Calculator",
                "multiply",
                ["i64", "i64"],
            ))
            .method(
                MethodSignature::new("i64", "demo.Calculator", "divide", ["i64", "i64"])
                    .with_error_types(["DivisionByZero"]),
            ),
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // setup 阶段：注册切面，然后构建代理
    let registry = Arc::new(AspectRegistry::new());
    registry.register_aspect(logging_aspect("execution(* demo.Calculator.*(..))"))?;
    registry.register_aspect(timing_aspect("execution(* demo.Calculator.*(..))", 50))?;
    registry.register_aspect(validation_aspect())?;

    let factory = ProxyFactory::new(registry);
    let proxy = factory.create_proxy(Arc::new(CalculatorService), capability())?;

    // 运行阶段：所有调用经由通知链
    let completion = proxy.call("multiply", vec![erased(5i64), erased(3i64)])?;
    println!("multiply(5, 3) = {}", completion.downcast_ref::<i64>().unwrap());

    let completion = proxy.call("divide", vec![erased(10i64), erased(2i64)])?;
    println!("divide(10, 2) = {}", completion.downcast_ref::<i64>().unwrap());

    // 校验切面在目标执行前短路
    match proxy.call("divide", vec![erased(1i64), erased(0i64)]) {
        Ok(_) => unreachable!("divide by zero must fail"),
        Err(error) => {
            println!("divide(1, 0) failed as expected: {}", error);
            println!("  origin: {:?}", error.origin());
        }
    }

    Ok(())
}
