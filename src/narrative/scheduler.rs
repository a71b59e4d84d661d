//! 可取消的周期任务
//!
//! 每一轮都是"等待 interval → 执行一次 → 重新计时"，而不是固定节拍：
//! 上一轮耗时多久，下一轮就顺延多久。取消后不会再开始新的一轮，
//! 已经在执行中的那一轮允许跑完。

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct DriftScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DriftScheduler {
    /// 在当前 tokio 运行时上启动周期任务
    pub fn spawn<F, Fut>(interval: Duration, mut cycle: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut fired: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                fired += 1;
                debug!(cycle = fired, "⏰ 定时任务触发");
                cycle().await;
            }
            debug!(cycles = fired, "⏹️ 定时任务已退出");
        });
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// 仍在运行（未取消且任务未结束）
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handle
                .as_ref()
                .map(|h| !h.is_finished())
                .unwrap_or(false)
    }

    /// 取消并等待任务退出；返回后不会再有新的触发
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for DriftScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
