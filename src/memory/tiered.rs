//! 分层记忆管理器
//!
//! 持有一份 [`MemoryStore`]，每次变更（append / compress）都在同一把锁内完成
//! "在副本上修改 → 写快照 → 替换内存"，对调用方来说是原子的：快照写失败时内存不变。
//! 交互路径和漂移定时任务共享同一个实例。
//!
//! ```rust,no_run
//! use echo_narrative::memory::{InMemorySnapshotStore, Tier, TieredMemory};
//! use std::sync::Arc;
//!
//! # async fn example() -> echo_narrative::error::Result<()> {
//! let memory = TieredMemory::load(Arc::new(InMemorySnapshotStore::new()), "memory", 10).await?;
//! memory.append("recent", "User: hi | System: hello").await?;
//! let context = memory.recent_context(5).await;
//! let last = memory.tail(Tier::Recent, 5).await;
//! # Ok(())
//! # }
//! ```

use super::snapshot::SnapshotStore;
use super::store::{Entry, MemoryStore, SummaryEntry, Tier, TierRecord, last_n};
use crate::error::{ConfigError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 默认压缩阈值：session 层超过该条数时触发压缩
pub const DEFAULT_COMPRESS_THRESHOLD: usize = 10;

pub struct TieredMemory {
    store: Mutex<MemoryStore>,
    snapshots: Arc<dyn SnapshotStore>,
    key: String,
    threshold: usize,
}

impl TieredMemory {
    /// 从快照恢复；快照不存在、读取失败或无法解析时从空状态开始
    pub async fn load(
        snapshots: Arc<dyn SnapshotStore>,
        key: impl Into<String>,
        threshold: usize,
    ) -> Result<Self> {
        let key = key.into();
        let store = match snapshots.read(&key).await {
            Ok(Some(raw)) => MemoryStore::from_json(&raw).unwrap_or_else(|e| {
                warn!(key = %key, "快照解析失败，从空状态开始: {e}");
                MemoryStore::default()
            }),
            Ok(None) => {
                info!(key = %key, "未找到已有快照，从空状态开始");
                MemoryStore::default()
            }
            Err(e) => {
                warn!(key = %key, "快照读取失败，从空状态开始: {e}");
                MemoryStore::default()
            }
        };
        info!(
            key = %key,
            recent = store.recent.len(),
            session = store.session.len(),
            archival = store.archival.len(),
            "🧠 分层记忆已加载"
        );
        Ok(Self {
            store: Mutex::new(store),
            snapshots,
            key,
            threshold,
        })
    }

    /// 按层名追加一条记录。
    ///
    /// 层名未知或记录类型与层不匹配时记录警告并跳过，返回 `Ok(false)`；
    /// 写入成功返回 `Ok(true)`。快照写入失败向上返回错误。
    pub async fn append(&self, tier: &str, record: impl Into<TierRecord>) -> Result<bool> {
        match tier.parse::<Tier>() {
            Ok(tier) => self.append_to(tier, record).await,
            Err(e) => {
                warn!("⚠️ {e}，已跳过");
                Ok(false)
            }
        }
    }

    /// 追加到指定层
    pub async fn append_to(&self, tier: Tier, record: impl Into<TierRecord>) -> Result<bool> {
        let record = record.into();
        let mut store = self.store.lock().await;
        let mut next = store.clone();
        match (tier, record) {
            (Tier::Recent, TierRecord::Line(line)) => next.recent.push(line),
            (Tier::Session, TierRecord::Entry(entry)) => next.session.push(entry),
            (Tier::Archival, TierRecord::Summary(summary)) => next.archival.push(summary),
            (tier, record) => {
                let e = ConfigError::TierMismatch {
                    tier: tier.to_string(),
                    record: record.kind().to_string(),
                };
                warn!("⚠️ {e}，已跳过");
                return Ok(false);
            }
        }
        self.commit(&mut store, next).await?;
        debug!(tier = %tier, len = store.len(tier), "📝 记录已追加");
        Ok(true)
    }

    /// 一次交互同时写入 recent 行和 session 记录，一次加锁、一次落盘。
    ///
    /// 要么两条都写入，要么都不写入。
    pub async fn record_exchange(&self, line: String, entry: Entry) -> Result<()> {
        let mut store = self.store.lock().await;
        let mut next = store.clone();
        next.recent.push(line);
        next.session.push(entry);
        self.commit(&mut store, next).await?;
        debug!(
            recent = store.recent.len(),
            session = store.session.len(),
            "📝 交互已追加"
        );
        Ok(())
    }

    /// session 层超过阈值时，把全部 session 记录折叠成一条 archival 摘要。
    ///
    /// 触发时返回新摘要，否则返回 `None`。
    pub async fn compress(&self) -> Result<Option<SummaryEntry>> {
        let mut store = self.store.lock().await;
        let count = store.session.len();
        if count <= self.threshold {
            return Ok(None);
        }
        let summary = SummaryEntry::compressed(count);
        let mut next = store.clone();
        next.archival.push(summary.clone());
        next.session.clear();
        self.commit(&mut store, next).await?;
        info!(
            compressed = count,
            archival = store.archival.len(),
            "🗜️ session 记忆已压缩进 archival"
        );
        Ok(Some(summary))
    }

    /// 最近 `n` 条 recent 记录，按时间顺序以空格拼接
    pub async fn recent_context(&self, n: usize) -> String {
        let store = self.store.lock().await;
        last_n(&store.recent, n).join(" ")
    }

    /// 某一层最后 `n` 条记录，按时间顺序
    pub async fn tail(&self, tier: Tier, n: usize) -> Vec<TierRecord> {
        self.store.lock().await.tail(tier, n)
    }

    /// 从 session 尾部向前找最近一条漂移文本
    pub async fn last_drift(&self) -> Option<String> {
        let store = self.store.lock().await;
        store
            .session
            .iter()
            .rev()
            .find_map(|entry: &Entry| entry.field("drift").map(String::from))
    }

    /// 当前状态的副本
    pub async fn snapshot(&self) -> MemoryStore {
        self.store.lock().await.clone()
    }

    /// 先把 `next` 落盘，成功后才替换内存状态；落盘失败时内存保持原样
    async fn commit(&self, current: &mut MemoryStore, next: MemoryStore) -> Result<()> {
        let blob = next.to_json()?;
        self.snapshots.write(&self.key, &blob).await?;
        *current = next;
        Ok(())
    }
}
