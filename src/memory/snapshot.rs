//! 快照存储（SnapshotStore）
//!
//! 以 `key → blob` 的形式保存整份分层记忆，blob 的编码由上层决定（当前为 JSON）。
//! 读不到 key 时返回 `Ok(None)`，这是冷启动的正常路径，不是错误。
//!
//! ## 内置实现
//!
//! | 类型 | 说明 |
//! |------|------|
//! | [`InMemorySnapshotStore`] | 进程内存，重启即清空，适合测试 |
//! | [`FileSnapshotStore`] | 每个 key 一个 JSON 文件，适合本地单机场景 |
//!
//! ```rust,no_run
//! use echo_narrative::memory::snapshot::{FileSnapshotStore, SnapshotStore};
//!
//! # async fn example() -> echo_narrative::error::Result<()> {
//! let store = FileSnapshotStore::new("~/.echo-narrative")?;
//! store.write("memory", "{}").await?;
//! assert_eq!(store.read("memory").await?.as_deref(), Some("{}"));
//! # Ok(())
//! # }
//! ```

use crate::error::{ConfigError, MemoryError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

// ── SnapshotStore trait ───────────────────────────────────────────────────────

/// 记忆快照的持久化接口
///
/// 实现方可替换为任意存储后端（内存、文件、数据库等）。
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 读取指定 key 的快照，不存在时返回 `None`
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// 覆盖写入指定 key 的快照
    async fn write(&self, key: &str, blob: &str) -> Result<()>;
}

// ── InMemorySnapshotStore ─────────────────────────────────────────────────────

/// 进程内存快照存储，不落盘
pub struct InMemorySnapshotStore {
    data: RwLock<HashMap<String, String>>,
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// 预置一份快照（用于模拟"上次运行留下的状态"）
    pub fn with_snapshot(mut self, key: impl Into<String>, blob: impl Into<String>) -> Self {
        self.data.get_mut().insert(key.into(), blob.into());
        self
    }

    /// 当前保存的快照内容
    pub async fn get(&self, key: &str) -> Option<String> {
        self.data.read().await.get(key).cloned()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, blob: &str) -> Result<()> {
        self.data
            .write()
            .await
            .insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

// ── FileSnapshotStore ─────────────────────────────────────────────────────────

/// 基于目录的文件快照存储
///
/// 每个 key 对应 `<dir>/<key>.json`。写入先落到临时文件再 rename，
/// 中途失败不会留下半截快照。
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// 打开快照目录，不存在时自动创建
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = expand_tilde(dir.as_ref());
        std::fs::create_dir_all(&dir)
            .map_err(|e| MemoryError::Persistence(format!("创建快照目录失败: {e}")))?;
        info!(dir = %dir.display(), "🗄️ FileSnapshotStore 初始化");
        Ok(Self { dir })
    }

    /// key 对应的快照文件路径
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(ConfigError::InvalidValue {
                field: "snapshot_key".to_string(),
                message: format!("'{key}' 不能作为文件名"),
            }
            .into());
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoryError::Persistence(format!("读取快照文件失败: {e}")).into()),
        }
    }

    async fn write(&self, key: &str, blob: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob)
            .await
            .map_err(|e| MemoryError::Persistence(format!("写入快照文件失败: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| MemoryError::Persistence(format!("替换快照文件失败: {e}")))?;
        debug!(path = %path.display(), bytes = blob.len(), "💾 快照已持久化");
        Ok(())
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_missing_key_is_none() -> Result<()> {
        let store = InMemorySnapshotStore::new();
        assert!(store.read("memory").await?.is_none());

        store.write("memory", "{\"recent\":[]}").await?;
        assert_eq!(
            store.read("memory").await?.as_deref(),
            Some("{\"recent\":[]}")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_overwrites_and_reads_back() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileSnapshotStore::new(dir.path())?;

        assert!(store.read("memory").await?.is_none(), "冷启动应返回 None");

        store.write("memory", "first").await?;
        store.write("memory", "second").await?;
        assert_eq!(store.read("memory").await?.as_deref(), Some("second"));
        assert!(dir.path().join("memory.json").exists());
        assert!(!dir.path().join("memory.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_creates_nested_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        let store = FileSnapshotStore::new(&nested)?;
        store.write("k", "v").await?;
        assert!(nested.join("k.json").exists());
        Ok(())
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("memory").is_ok());
    }
}
