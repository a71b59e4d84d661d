//! 分层记忆的数据模型
//!
//! | 层 | 元素类型 | 策略 |
//! |----|----------|------|
//! | `recent` | `String` | 无限追加，按"最近 N 条"读取 |
//! | `session` | [`Entry`] | 无限追加，超过阈值时整体压缩 |
//! | `archival` | [`SummaryEntry`] | 只追加，不再压缩 |

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ── Tier ─────────────────────────────────────────────────────────────────────

/// 记忆层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Recent,
    Session,
    Archival,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Recent, Tier::Session, Tier::Archival];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Recent => "recent",
            Tier::Session => "session",
            Tier::Archival => "archival",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(Tier::Recent),
            "session" => Ok(Tier::Session),
            "archival" => Ok(Tier::Archival),
            other => Err(ConfigError::UnknownTier(other.to_string())),
        }
    }
}

// ── Entry ────────────────────────────────────────────────────────────────────

/// session 层的结构化记录，写入后不可变
///
/// `payload` 单独嵌套一层，任意 key（包括 `id` / `timestamp`）都不会和元数据冲突：
/// ```json
/// { "id": "…", "timestamp": "2026-01-01T00:00:00Z", "payload": { "prompt": "hi", "response": "…" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Entry {
    pub fn new(payload: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// 一次问答交互
    pub fn interaction(prompt: &str, response: &str) -> Self {
        let mut payload = Map::new();
        payload.insert("prompt".into(), Value::String(prompt.to_string()));
        payload.insert("response".into(), Value::String(response.to_string()));
        Self::new(payload)
    }

    /// 读取字符串字段
    pub fn field(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(Value::as_str)
    }

    /// 是否为漂移记录
    pub fn is_drift(&self) -> bool {
        self.field("drift").is_some()
    }
}

// ── SummaryEntry ─────────────────────────────────────────────────────────────

/// archival 层的压缩摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    /// 被压缩的 session 记录数
    #[serde(default)]
    pub compressed: usize,
}

impl SummaryEntry {
    pub fn compressed(count: usize) -> Self {
        let timestamp = Utc::now();
        Self {
            id: Uuid::new_v4(),
            timestamp,
            summary: format!(
                "Compressed {count} session entries at {}.",
                timestamp.to_rfc3339()
            ),
            compressed: count,
        }
    }
}

// ── TierRecord ───────────────────────────────────────────────────────────────

/// 可写入任意层的一条记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TierRecord {
    Line(String),
    Entry(Entry),
    Summary(SummaryEntry),
}

impl TierRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            TierRecord::Line(_) => "line",
            TierRecord::Entry(_) => "entry",
            TierRecord::Summary(_) => "summary",
        }
    }

    /// 人类可读的单行表示
    pub fn render(&self) -> String {
        match self {
            TierRecord::Line(line) => line.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| format!("{other:?}")),
        }
    }
}

impl From<String> for TierRecord {
    fn from(line: String) -> Self {
        TierRecord::Line(line)
    }
}

impl From<&str> for TierRecord {
    fn from(line: &str) -> Self {
        TierRecord::Line(line.to_string())
    }
}

impl From<Entry> for TierRecord {
    fn from(entry: Entry) -> Self {
        TierRecord::Entry(entry)
    }
}

impl From<SummaryEntry> for TierRecord {
    fn from(summary: SummaryEntry) -> Self {
        TierRecord::Summary(summary)
    }
}

// ── MemoryStore ──────────────────────────────────────────────────────────────

/// 三层记忆的完整状态，也就是快照的内容
///
/// 三个层始终存在；快照缺少某一层时按空序列补齐。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub recent: Vec<String>,
    #[serde(default)]
    pub session: Vec<Entry>,
    #[serde(default)]
    pub archival: Vec<SummaryEntry>,
}

impl MemoryStore {
    pub fn len(&self, tier: Tier) -> usize {
        match tier {
            Tier::Recent => self.recent.len(),
            Tier::Session => self.session.len(),
            Tier::Archival => self.archival.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Tier::ALL.iter().all(|t| self.len(*t) == 0)
    }

    /// 取某一层最后 `n` 条（按时间正序），不足 `n` 条时全部返回
    pub fn tail(&self, tier: Tier, n: usize) -> Vec<TierRecord> {
        match tier {
            Tier::Recent => last_n(&self.recent, n)
                .iter()
                .cloned()
                .map(TierRecord::Line)
                .collect(),
            Tier::Session => last_n(&self.session, n)
                .iter()
                .cloned()
                .map(TierRecord::Entry)
                .collect(),
            Tier::Archival => last_n(&self.archival, n)
                .iter()
                .cloned()
                .map(TierRecord::Summary)
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// 切片末尾最多 `n` 个元素
pub(crate) fn last_n<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> MemoryStore {
        let mut drift = Map::new();
        drift.insert("drift".into(), Value::String("Truth bends.".into()));
        drift.insert("tags".into(), serde_json::json!(["pensive", "abstract"]));
        MemoryStore {
            recent: vec!["User: a | System: b".into(), "User: c | System: d".into()],
            session: vec![Entry::interaction("a", "b"), Entry::new(drift)],
            archival: vec![SummaryEntry::compressed(11)],
        }
    }

    #[test]
    fn test_tier_names_parse() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
        assert!(matches!(
            "short_term".parse::<Tier>(),
            Err(ConfigError::UnknownTier(name)) if name == "short_term"
        ));
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let store = sample_store();
        let raw = store.to_json().unwrap();
        let restored = MemoryStore::from_json(&raw).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn test_payload_is_nested() {
        let entry = Entry::interaction("hello", "world");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["payload"]["prompt"], "hello");
        assert_eq!(value["payload"]["response"], "world");
        assert!(value.get("prompt").is_none());
    }

    #[test]
    fn test_reserved_payload_keys_round_trip() {
        let mut payload = Map::new();
        payload.insert("prompt".into(), Value::String("hi".into()));
        payload.insert("id".into(), Value::String("legacy-id".into()));
        payload.insert(
            "timestamp".into(),
            Value::String("2024-01-01T00:00:00".into()),
        );
        let store = MemoryStore {
            recent: vec!["keep me".into()],
            session: vec![Entry::new(payload)],
            archival: vec![],
        };

        let restored = MemoryStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.session[0].field("timestamp"), Some("2024-01-01T00:00:00"));
        assert_eq!(restored.session[0].field("id"), Some("legacy-id"));
    }

    #[test]
    fn test_render_entry_is_single_json_line() {
        let record = TierRecord::Entry(Entry::interaction("hello", "world"));
        let line = record.render();
        assert!(!line.is_empty());
        assert!(!line.contains('\n'));
        assert!(line.contains("\"prompt\":\"hello\""));
    }

    #[test]
    fn test_missing_tiers_default_to_empty() {
        let store = MemoryStore::from_json(r#"{"recent": ["only line"]}"#).unwrap();
        assert_eq!(store.recent, vec!["only line".to_string()]);
        assert!(store.session.is_empty());
        assert!(store.archival.is_empty());

        let empty = MemoryStore::from_json("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_tail_returns_last_n_in_order() {
        let mut store = MemoryStore::default();
        store.recent = (0..7).map(|i| format!("line {i}")).collect();

        let tail: Vec<String> = store
            .tail(Tier::Recent, 3)
            .into_iter()
            .map(|r| r.render())
            .collect();
        assert_eq!(tail, vec!["line 4", "line 5", "line 6"]);

        assert_eq!(store.tail(Tier::Recent, 100).len(), 7);
        assert!(store.tail(Tier::Recent, 0).is_empty());
        assert!(store.tail(Tier::Archival, 5).is_empty());
    }

    #[test]
    fn test_summary_states_count() {
        let summary = SummaryEntry::compressed(11);
        assert!(summary.summary.contains("11"));
        assert_eq!(summary.compressed, 11);
    }
}
