//! 分层记忆系统
//!
//! | 层次 | 内容 | 策略 |
//! |------|------|------|
//! | `recent` | 人类可读的对话行 | 只追加，取最近 N 条作为上下文 |
//! | `session` | 结构化交互 / 漂移记录 | 超过阈值时整体压缩 |
//! | `archival` | 压缩摘要 | 只追加 |
//!
//! 每次变更后整份 [`MemoryStore`] 通过 [`SnapshotStore`] 落盘，
//! 进程启动时再从同一个 key 恢复。

pub mod snapshot;
pub mod store;
pub mod tiered;

pub use snapshot::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
pub use store::{Entry, MemoryStore, SummaryEntry, Tier, TierRecord};
pub use tiered::{DEFAULT_COMPRESS_THRESHOLD, TieredMemory};
