//! 叙事编排器
//!
//! 把分层记忆、漂移生成器和响应生成器组合在一起，有两条互相独立的路径：
//!
//! ```text
//! 交互路径  submit(prompt)
//!   ├─ recent_context(N)            读取最近上下文
//!   ├─ generator.generate()         调用响应生成器（失败则不写任何记忆）
//!   └─ record_exchange()            recent "User: … | System: …" 与 session {prompt, response}
//!                                   在同一把锁内写入，只落盘一次
//!
//! 漂移路径  DriftScheduler 每隔 interval 触发 drift_once()
//!   ├─ last_drift()                 session 中最近一条漂移
//!   ├─ DriftGenerator::reflect()    反思 + 标签 + 内部问题
//!   ├─ append session               {drift, tags, internal_questions}
//!   └─ compress()                   超过阈值时折叠进 archival
//! ```
//!
//! 编排器本身是一个显式构造的值，通过 `Arc` 在交互循环和定时任务之间共享。

pub mod scheduler;

use crate::config::NarrativeConfig;
use crate::drift::{DEFAULT_QUESTION_COUNT, DriftGenerator};
use crate::error::{GenerationError, NarrativeError, Result};
use crate::generator::{EchoGenerator, ResponseGenerator};
use crate::memory::{Entry, Tier, TieredMemory};
use scheduler::DriftScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 编排器的运行参数
#[derive(Debug, Clone)]
pub struct NarrativeSettings {
    pub context_window: usize,
    pub question_count: usize,
    pub summary_tail: usize,
    pub drift_interval: Duration,
    pub generation_timeout: Option<Duration>,
}

impl Default for NarrativeSettings {
    fn default() -> Self {
        Self {
            context_window: 5,
            question_count: DEFAULT_QUESTION_COUNT,
            summary_tail: 5,
            drift_interval: Duration::from_secs(60),
            generation_timeout: None,
        }
    }
}

impl From<&NarrativeConfig> for NarrativeSettings {
    fn from(config: &NarrativeConfig) -> Self {
        Self {
            context_window: config.context_window,
            question_count: config.question_count,
            summary_tail: config.summary_tail,
            drift_interval: config.drift_interval(),
            generation_timeout: config.generation_timeout(),
        }
    }
}

pub struct NarrativeSystem {
    memory: Arc<TieredMemory>,
    drift: DriftGenerator,
    generator: Arc<dyn ResponseGenerator>,
    settings: NarrativeSettings,
    scheduler: Mutex<Option<DriftScheduler>>,
}

impl NarrativeSystem {
    pub fn builder(memory: Arc<TieredMemory>) -> NarrativeSystemBuilder {
        NarrativeSystemBuilder {
            memory,
            drift: None,
            generator: None,
            settings: NarrativeSettings::default(),
        }
    }

    pub fn memory(&self) -> &Arc<TieredMemory> {
        &self.memory
    }

    // ── 交互路径 ──────────────────────────────────────────────────────────────

    /// 处理一次用户输入并返回响应。
    ///
    /// 生成失败时返回 `GenerationError`，此次交互不会写入任何记忆。
    pub async fn submit(&self, prompt: &str) -> Result<String> {
        let context = self
            .memory
            .recent_context(self.settings.context_window)
            .await;
        let response = self.generate(prompt, &context).await?;

        self.memory
            .record_exchange(
                format!("User: {prompt} | System: {response}"),
                Entry::interaction(prompt, &response),
            )
            .await?;
        info!(prompt_len = prompt.len(), "💬 交互已记录");
        Ok(response)
    }

    /// 在独立任务中执行 [`submit`](Self::submit)。
    ///
    /// 调用方放弃等待（例如收到 Ctrl-C）不会中断正在进行的写入，
    /// 之后仍可等待返回的句柄拿到结果。
    pub fn submit_detached(self: &Arc<Self>, prompt: String) -> JoinHandle<Result<String>> {
        let system = Arc::clone(self);
        tokio::spawn(async move { system.submit(&prompt).await })
    }

    async fn generate(&self, prompt: &str, context: &str) -> Result<String> {
        let call = self.generator.generate(prompt, context);
        let result = match self.settings.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| GenerationError::Timeout(limit))?,
            None => call.await,
        };
        result.map_err(|e| match e {
            NarrativeError::Generation(_) => e,
            other => GenerationError::Failed(other.to_string()).into(),
        })
    }

    // ── 漂移路径 ──────────────────────────────────────────────────────────────

    /// 执行一次漂移：生成反思、写入 session、按需压缩
    pub async fn drift_once(&self) -> Result<Entry> {
        let previous = self.memory.last_drift().await;
        let reflection = self
            .drift
            .reflect(previous.as_deref(), self.settings.question_count)?;
        let entry = reflection.into_entry();

        self.memory.append_to(Tier::Session, entry.clone()).await?;
        info!(
            drift = entry.field("drift").unwrap_or_default(),
            "🌀 [Drift] 新的漂移"
        );
        self.memory.compress().await?;
        Ok(entry)
    }

    /// 定时任务的一轮；失败只记录日志，不影响下一轮
    async fn drift_cycle(&self) {
        if let Err(e) = self.drift_once().await {
            match e {
                NarrativeError::Drift(_) => warn!("⚠️ 本轮漂移已跳过: {e}"),
                _ => error!("❌ 漂移失败，本轮已跳过: {e}"),
            }
        }
    }

    /// 启动漂移定时任务；已在运行时不重复启动
    pub async fn start_drift(self: &Arc<Self>) -> bool {
        let mut slot = self.scheduler.lock().await;
        if slot.as_ref().is_some_and(DriftScheduler::is_running) {
            warn!("漂移定时任务已在运行");
            return false;
        }
        let weak = Arc::downgrade(self);
        let interval = self.settings.drift_interval;
        *slot = Some(DriftScheduler::spawn(interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(system) = weak.upgrade() {
                    system.drift_cycle().await;
                }
            }
        }));
        info!(interval = ?interval, "⏰ 漂移定时任务已启动");
        true
    }

    pub async fn is_drifting(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(DriftScheduler::is_running)
    }

    /// 停止漂移定时任务；返回后不会再有新的漂移
    pub async fn stop_drift(&self) {
        let scheduler = self.scheduler.lock().await.take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
            info!("⏹️ 漂移定时任务已停止");
        }
    }

    // ── 关闭与摘要 ────────────────────────────────────────────────────────────

    /// 停止定时任务并返回叙事摘要
    pub async fn shutdown(&self) -> String {
        self.stop_drift().await;
        info!("👋 叙事系统已关闭");
        self.summary().await
    }

    /// 每一层最近几条记录的可读视图
    pub async fn summary(&self) -> String {
        let n = self.settings.summary_tail;
        let mut out = String::from("\n=== Narrative Summary ===\n");
        for (tier, title) in [
            (Tier::Recent, "Recent Memories"),
            (Tier::Session, "Session Memories"),
            (Tier::Archival, "Archival Memories"),
        ] {
            out.push_str(title);
            out.push_str(":\n");
            for record in self.memory.tail(tier, n).await {
                out.push_str(&record.render());
                out.push('\n');
            }
        }
        out
    }
}

/// `NarrativeSystem` 的构建器
pub struct NarrativeSystemBuilder {
    memory: Arc<TieredMemory>,
    drift: Option<DriftGenerator>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    settings: NarrativeSettings,
}

impl NarrativeSystemBuilder {
    /// 响应生成器，默认 [`EchoGenerator`]
    pub fn generator(mut self, generator: impl ResponseGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// 与外部共享同一个生成器实例（例如测试中检查调用记录）
    pub fn shared_generator(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// 漂移生成器，默认使用系统熵
    pub fn drift(mut self, drift: DriftGenerator) -> Self {
        self.drift = Some(drift);
        self
    }

    pub fn settings(mut self, settings: NarrativeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn drift_interval(mut self, interval: Duration) -> Self {
        self.settings.drift_interval = interval;
        self
    }

    /// 按配置设置运行参数和漂移种子
    pub fn config(mut self, config: &NarrativeConfig) -> Self {
        self.settings = NarrativeSettings::from(config);
        if let Some(seed) = config.seed {
            self.drift = Some(DriftGenerator::seeded(seed));
        }
        self
    }

    pub fn build(self) -> Arc<NarrativeSystem> {
        Arc::new(NarrativeSystem {
            memory: self.memory,
            drift: self.drift.unwrap_or_default(),
            generator: self.generator.unwrap_or_else(|| Arc::new(EchoGenerator)),
            settings: self.settings,
            scheduler: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;
    use crate::memory::{InMemorySnapshotStore, SnapshotStore};
    use crate::testing::MockGenerator;
    use async_trait::async_trait;

    /// 每次写入都要耗时一段时间的快照存储
    struct SlowStore {
        inner: InMemorySnapshotStore,
        delay: Duration,
    }

    #[async_trait]
    impl SnapshotStore for SlowStore {
        async fn read(&self, key: &str) -> Result<Option<String>> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, blob: &str) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.write(key, blob).await
        }
    }

    async fn slow_memory(delay: Duration) -> Arc<TieredMemory> {
        let store = SlowStore {
            inner: InMemorySnapshotStore::new(),
            delay,
        };
        Arc::new(TieredMemory::load(Arc::new(store), "memory", 10).await.unwrap())
    }

    async fn memory(threshold: usize) -> Arc<TieredMemory> {
        Arc::new(
            TieredMemory::load(Arc::new(InMemorySnapshotStore::new()), "memory", threshold)
                .await
                .unwrap(),
        )
    }

    fn drift_count(entries: &[Entry]) -> usize {
        entries.iter().filter(|e| e.is_drift()).count()
    }

    #[tokio::test]
    async fn test_submit_records_both_tiers() -> Result<()> {
        let system = NarrativeSystem::builder(memory(10).await)
            .generator(MockGenerator::new().with_response("world"))
            .build();

        assert_eq!(system.submit("hello").await?, "world");

        let store = system.memory().snapshot().await;
        assert_eq!(store.recent.len(), 1);
        assert!(store.recent[0].contains("hello") && store.recent[0].contains("world"));
        assert_eq!(store.session.len(), 1);
        assert_eq!(store.session[0].field("prompt"), Some("hello"));
        assert_eq!(store.session[0].field("response"), Some("world"));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_passes_recent_context() -> Result<()> {
        let mock = Arc::new(MockGenerator::new().with_responses(["r1", "r2", "r3"]));
        let system = NarrativeSystem::builder(memory(10).await)
            .shared_generator(mock.clone())
            .build();

        system.submit("a").await?;
        assert_eq!(mock.last_call(), Some(("a".to_string(), String::new())));

        system.submit("b").await?;
        system.submit("c").await?;
        let (prompt, context) = mock.last_call().unwrap();
        assert_eq!(prompt, "c");
        assert_eq!(context, "User: a | System: r1 User: b | System: r2");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.remaining(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_abandoned_submit_never_tears_exchange() {
        let system = NarrativeSystem::builder(slow_memory(Duration::from_millis(50)).await)
            .generator(MockGenerator::new().with_response("world"))
            .build();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(25), system.submit("hello")).await;
        assert!(abandoned.is_err());

        let store = system.memory().snapshot().await;
        assert_eq!(store.recent.len(), store.session.len());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_detached_submit_completes_after_caller_gives_up() -> Result<()> {
        let system = NarrativeSystem::builder(slow_memory(Duration::from_millis(50)).await)
            .generator(MockGenerator::new().with_response("world"))
            .build();

        let mut handle = system.submit_detached("hello".into());
        assert!(
            tokio::time::timeout(Duration::from_millis(25), &mut handle)
                .await
                .is_err()
        );

        let response = handle
            .await
            .map_err(|e| NarrativeError::Other(e.to_string()))??;
        assert_eq!(response, "world");

        let store = system.memory().snapshot().await;
        assert_eq!(store.recent.len(), 1);
        assert_eq!(store.session.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_memory_untouched() {
        let system = NarrativeSystem::builder(memory(10).await)
            .generator(MockGenerator::new().with_failure("model offline"))
            .build();

        let err = system.submit("hello").await.unwrap_err();
        assert!(matches!(err, NarrativeError::Generation(_)));
        assert!(system.memory().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_generation_timeout() {
        let system = NarrativeSystem::builder(memory(10).await)
            .generator(
                MockGenerator::new()
                    .with_response("late")
                    .with_delay(Duration::from_millis(200)),
            )
            .settings(NarrativeSettings {
                generation_timeout: Some(Duration::from_millis(20)),
                ..Default::default()
            })
            .build();

        let err = system.submit("hello").await.unwrap_err();
        assert!(matches!(
            err,
            NarrativeError::Generation(GenerationError::Timeout(_))
        ));
        assert!(system.memory().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_drift_references_previous_drift() -> Result<()> {
        let system = NarrativeSystem::builder(memory(10).await)
            .drift(DriftGenerator::seeded(11))
            .build();

        let first = system.drift_once().await?;
        assert!(!first.field("drift").unwrap().contains("Previously"));

        system.submit("between").await?;

        let second = system.drift_once().await?;
        let expected = format!("Previously, I pondered: '{}'", first.field("drift").unwrap());
        assert!(second.field("drift").unwrap().ends_with(&expected));

        let store = system.memory().snapshot().await;
        assert_eq!(drift_count(&store.session), 2);
        assert_eq!(store.session[2].payload["tags"].as_array().unwrap().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_drift_compresses_past_threshold() -> Result<()> {
        let system = NarrativeSystem::builder(memory(2).await)
            .drift(DriftGenerator::seeded(5))
            .build();

        for _ in 0..3 {
            system.drift_once().await?;
        }
        let store = system.memory().snapshot().await;
        assert!(store.session.is_empty());
        assert_eq!(store.archival.len(), 1);
        assert_eq!(store.archival[0].compressed, 3);

        // 压缩后找不到上一条漂移，回到不引用的状态
        let next = system.drift_once().await?;
        assert!(!next.field("drift").unwrap().contains("Previously"));
        Ok(())
    }

    #[tokio::test]
    async fn test_sampling_error_skips_cycle() {
        let system = NarrativeSystem::builder(memory(10).await)
            .settings(NarrativeSettings {
                question_count: 99,
                ..Default::default()
            })
            .build();

        let err = system.drift_once().await.unwrap_err();
        assert!(matches!(
            err,
            NarrativeError::Drift(DriftError::Sampling { requested: 99, .. })
        ));
        system.drift_cycle().await;
        assert!(system.memory().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_scheduled_drift_fires_and_stops() {
        let system = NarrativeSystem::builder(memory(100).await)
            .drift(DriftGenerator::seeded(1))
            .drift_interval(Duration::from_millis(10))
            .build();

        assert!(system.start_drift().await);
        assert!(!system.start_drift().await, "不应重复启动");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(system.is_drifting().await);

        let summary = system.shutdown().await;
        assert!(!system.is_drifting().await);
        assert!(summary.contains("=== Narrative Summary ==="));

        let fired = drift_count(&system.memory().snapshot().await.session);
        assert!(fired >= 2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            drift_count(&system.memory().snapshot().await.session),
            fired,
            "关闭后不应再有漂移"
        );
    }

    #[tokio::test]
    async fn test_cancel_before_first_drift() {
        let system = NarrativeSystem::builder(memory(10).await)
            .drift_interval(Duration::from_millis(40))
            .build();

        system.start_drift().await;
        system.stop_drift().await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(system.memory().snapshot().await.session.is_empty());
    }

    #[tokio::test]
    async fn test_summary_lists_every_tier() -> Result<()> {
        let system = NarrativeSystem::builder(memory(10).await)
            .generator(MockGenerator::new().with_response("world"))
            .drift(DriftGenerator::seeded(3))
            .build();
        system.submit("hello").await?;
        system.drift_once().await?;

        let summary = system.shutdown().await;
        let recent_at = summary.find("Recent Memories:").unwrap();
        let session_at = summary.find("Session Memories:").unwrap();
        let archival_at = summary.find("Archival Memories:").unwrap();
        assert!(recent_at < session_at && session_at < archival_at);
        assert!(summary.contains("User: hello | System: world"));
        assert!(summary.contains("\"drift\""));
        Ok(())
    }
}
