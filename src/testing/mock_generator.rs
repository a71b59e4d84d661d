//! Mock 响应生成器，用于在不接入真实模型的情况下测试 [`NarrativeSystem`](crate::narrative::NarrativeSystem)。
//!
//! # 示例
//!
//! ```rust
//! use echo_narrative::generator::ResponseGenerator;
//! use echo_narrative::testing::MockGenerator;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mock = MockGenerator::new()
//!     .with_response("第一次响应")
//!     .with_failure("模型不可用");
//!
//! assert_eq!(mock.generate("hi", "").await.unwrap(), "第一次响应");
//! assert!(mock.generate("hi", "").await.is_err());
//! assert_eq!(mock.call_count(), 2);
//! # }
//! ```

use crate::error::{GenerationError, NarrativeError, Result};
use crate::generator::ResponseGenerator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 预设响应（文本或错误）
enum MockResponse {
    Content(String),
    Err(NarrativeError),
}

/// 可脚本化的 Mock 生成器。
///
/// 按顺序返回预设响应；队列耗尽后返回 `EmptyResponse` 错误。
/// 每次调用的 `(prompt, context)` 都会被记录。
pub struct MockGenerator {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    delay: Option<Duration>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// 追加一条成功响应
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Content(text.into()));
        self
    }

    /// 批量追加成功响应
    pub fn with_responses(self, texts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        {
            let mut q = self.responses.lock().unwrap();
            for t in texts {
                q.push_back(MockResponse::Content(t.into()));
            }
        }
        self
    }

    /// 追加一条生成失败
    pub fn with_failure(self, msg: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Err(NarrativeError::Generation(
                GenerationError::Failed(msg.into()),
            )));
        self
    }

    /// 每次调用前先等待 `delay`，用于测试超时
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 最后一次调用的 `(prompt, context)`
    pub fn last_call(&self) -> Option<(String, String)> {
        self.calls.lock().unwrap().last().cloned()
    }

    /// 剩余未消费的预设响应数量
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(MockResponse::Content(text)) => Ok(text),
            Some(MockResponse::Err(e)) => Err(e),
            None => Err(NarrativeError::Generation(GenerationError::EmptyResponse)),
        }
    }
}
