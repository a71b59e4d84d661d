//! 叙事系统配置
//!
//! 从 YAML 文件读取，所有字段都有默认值；随后用环境变量覆盖（会先加载 `.env`）：
//! ```text
//! NARRATIVE_SNAPSHOT_DIR=~/.echo-narrative
//! NARRATIVE_DRIFT_INTERVAL_SECS=60
//! NARRATIVE_COMPRESS_THRESHOLD=10
//! NARRATIVE_SEED=42
//! ```

use crate::drift::DEFAULT_QUESTION_COUNT;
use crate::drift::vocabulary::INTERNAL_QUESTIONS;
use crate::error::{ConfigError, Result};
use crate::memory::DEFAULT_COMPRESS_THRESHOLD;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// 快照目录
    pub snapshot_dir: PathBuf,
    /// 快照 key（文件名不含扩展名）
    pub snapshot_key: String,
    /// 漂移间隔（秒）
    pub drift_interval_secs: u64,
    /// session 层压缩阈值
    pub compress_threshold: usize,
    /// 交互时带入的 recent 条数
    pub context_window: usize,
    /// 每次漂移的内部问题数
    pub question_count: usize,
    /// 退出摘要中每层展示的条数
    pub summary_tail: usize,
    /// 生成器超时（秒），不设置则不限时
    pub generation_timeout_secs: Option<u64>,
    /// 漂移随机种子，不设置则使用系统熵
    pub seed: Option<u64>,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("~/.echo-narrative"),
            snapshot_key: "memory".to_string(),
            drift_interval_secs: 60,
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
            context_window: 5,
            question_count: DEFAULT_QUESTION_COUNT,
            summary_tail: 5,
            generation_timeout_secs: None,
            seed: None,
        }
    }
}

impl NarrativeConfig {
    /// 从 YAML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let config: NarrativeConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    /// 有路径时读文件，否则用默认值；然后应用环境变量并校验
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 用 `lookup` 提供的环境变量覆盖字段
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("NARRATIVE_SNAPSHOT_DIR") {
            self.snapshot_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("NARRATIVE_DRIFT_INTERVAL_SECS") {
            self.drift_interval_secs = parse_field("NARRATIVE_DRIFT_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("NARRATIVE_COMPRESS_THRESHOLD") {
            self.compress_threshold = parse_field("NARRATIVE_COMPRESS_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("NARRATIVE_SEED") {
            self.seed = Some(parse_field("NARRATIVE_SEED", &raw)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.drift_interval_secs == 0 {
            return Err(invalid("drift_interval_secs", "必须大于 0"));
        }
        if self.context_window == 0 {
            return Err(invalid("context_window", "必须大于 0"));
        }
        if self.question_count > INTERNAL_QUESTIONS.len() {
            return Err(invalid(
                "question_count",
                &format!("不能超过问题词表大小 {}", INTERNAL_QUESTIONS.len()),
            ));
        }
        if self.snapshot_key.trim().is_empty() {
            return Err(invalid("snapshot_key", "不能为空"));
        }
        Ok(())
    }

    pub fn drift_interval(&self) -> Duration {
        Duration::from_secs(self.drift_interval_secs)
    }

    pub fn generation_timeout(&self) -> Option<Duration> {
        self.generation_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("无法解析 '{raw}'"),
        }
        .into()
    })
}

fn invalid(field: &str, message: &str) -> crate::error::NarrativeError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}
