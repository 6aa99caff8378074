//! 结构化错误信息
//!
//! 供异常通知使用的错误摘要：消息、类型名、错误源链

use std::error::Error;

/// 结构化的错误信息
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// 错误消息
    pub message: String,

    /// 错误类型名称
    pub error_type: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl ErrorInfo {
    /// 从具体错误类型创建 ErrorInfo
    pub fn from_error<E: Error>(error: &E) -> Self {
        Self {
            message: error.to_string(),
            error_type: std::any::type_name::<E>().to_string(),
            source_chain: collect_sources(error),
        }
    }

    /// 从类型擦除的错误创建 ErrorInfo
    ///
    /// 异常通知收到的是 trait object，此时具体类型名不可得
    pub fn from_dyn(error: &(dyn Error + Send + Sync)) -> Self {
        Self {
            message: error.to_string(),
            error_type: "<erased>".to_string(),
            source_chain: collect_sources(error),
        }
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}

fn collect_sources<E: Error + ?Sized>(error: &E) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = error.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}
