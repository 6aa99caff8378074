//! 能力接口（Capability）描述
//!
//! 引擎不依赖反射：目标以「能力接口描述符 + 类型擦除的分发入口」的形式
//! 把自己交给代理工厂，切点匹配只作用于方法签名值类型

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除的方法参数
pub type ArgValue = Arc<dyn Any + Send + Sync>;

/// 类型擦除的方法返回值
pub type ReturnValue = Arc<dyn Any + Send + Sync>;

/// 目标方法（或 Around 层）抛出的原始错误
///
/// 以 trait object 形式携带，类型与内容原样传播，调用方可 downcast 还原
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

/// 目标方法调用结果
pub type TargetResult = Result<ReturnValue, TargetError>;

/// 将任意值擦除为 [`ArgValue`] / [`ReturnValue`]
pub fn erased<T: Any + Send + Sync>(value: T) -> ArgValue {
    Arc::new(value)
}

/// 方法签名值类型
///
/// 切点匹配的唯一输入，与任何运行时反射设施解耦。
/// 单元返回值按约定写作 `void`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// 返回类型名称
    pub return_type: String,

    /// 声明类型（以 `.` 分隔的路径，例如 `billing.InvoiceService`）
    pub declaring_type: String,

    /// 方法名称
    pub name: String,

    /// 参数类型列表（按位置）
    pub parameter_types: Vec<String>,

    /// 声明的错误类型列表
    pub error_types: Vec<String>,
}

impl MethodSignature {
    /// 创建新的方法签名
    pub fn new(
        return_type: impl Into<String>,
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        parameter_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            return_type: return_type.into(),
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
            error_types: Vec::new(),
        }
    }

    /// 设置声明的错误类型
    pub fn with_error_types(
        mut self,
        error_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.error_types = error_types.into_iter().map(Into::into).collect();
        self
    }

}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}({})",
            self.return_type,
            self.declaring_type,
            self.name,
            self.parameter_types.join(", ")
        )?;
        if !self.error_types.is_empty() {
            write!(f, " throws {}", self.error_types.join(", "))?;
        }
        Ok(())
    }
}

/// 能力接口描述符
///
/// 调用方（DI/配置层）声明的接口形状：名称 + 方法签名列表。
/// 代理只实现这里声明的方法
#[derive(Debug, Clone)]
pub struct CapabilityDescriptor {
    name: String,
    methods: Vec<Arc<MethodSignature>>,
}

impl CapabilityDescriptor {
    /// 创建新的能力接口描述符
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// 声明一个方法
    pub fn method(mut self, signature: MethodSignature) -> Self {
        self.methods.push(Arc::new(signature));
        self
    }

    /// 接口名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 声明的全部方法
    pub fn methods(&self) -> &[Arc<MethodSignature>] {
        &self.methods
    }

    /// 按名称查找方法
    pub fn find_method(&self, name: &str) -> Option<&Arc<MethodSignature>> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// 可织入的目标
///
/// 目标以类型擦除的 `invoke` 入口暴露自己的方法表，
/// 代理经由通知链最终路由到这里
pub trait CapabilityTarget: Send + Sync {
    /// 目标的具体类型名称（`.` 分隔路径）
    fn type_name(&self) -> &str;

    /// 目标实际提供的方法签名
    fn declared_methods(&self) -> Vec<MethodSignature>;

    /// 分发一次方法调用
    fn invoke(&self, method: &str, args: &[ArgValue]) -> TargetResult;
}
