//! 响应生成器
//!
//! 叙事系统只依赖 [`ResponseGenerator`] trait；真实模型接入只需实现它。
//! 默认的 [`EchoGenerator`] 直接回显 prompt，不访问任何外部服务。

use crate::error::Result;
use async_trait::async_trait;

/// 根据用户输入和最近上下文生成一条响应
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String>;
}

/// 回显生成器：`Processed response to: <prompt>`
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoGenerator;

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str, _context: &str) -> Result<String> {
        Ok(format!("Processed response to: {prompt}"))
    }
}
