use std::fmt;
use std::time::Duration;

/// 叙事系统的统一错误类型
#[derive(Debug)]
pub enum NarrativeError {
    /// 配置 / 参数校验错误
    Config(ConfigError),
    /// 分层记忆持久化错误
    Memory(MemoryError),
    /// 漂移生成错误
    Drift(DriftError),
    /// 响应生成器错误
    Generation(GenerationError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 未知的记忆层名称
    UnknownTier(String),
    /// 记录类型与目标层不匹配
    TierMismatch { tier: String, record: String },
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

/// 记忆持久化错误
#[derive(Debug)]
pub enum MemoryError {
    /// 快照读写失败
    Persistence(String),
    /// 序列化/反序列化错误
    Serialization(String),
}

/// 漂移生成错误
#[derive(Debug)]
pub enum DriftError {
    /// 请求的不重复问题数超过词表大小
    Sampling { requested: usize, available: usize },
}

/// 响应生成器错误
#[derive(Debug)]
pub enum GenerationError {
    /// 生成器返回失败
    Failed(String),
    /// 生成超时
    Timeout(Duration),
    /// 没有可用的响应
    EmptyResponse,
}

impl fmt::Display for NarrativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrativeError::Config(e) => write!(f, "Config Error: {}", e),
            NarrativeError::Memory(e) => write!(f, "Memory Error: {}", e),
            NarrativeError::Drift(e) => write!(f, "Drift Error: {}", e),
            NarrativeError::Generation(e) => write!(f, "Generation Error: {}", e),
            NarrativeError::Io(e) => write!(f, "IO Error: {}", e),
            NarrativeError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownTier(tier) => write!(f, "Unknown memory tier: {}", tier),
            ConfigError::TierMismatch { tier, record } => {
                write!(f, "Record kind '{}' does not belong to tier '{}'", record, tier)
            }
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::Persistence(msg) => write!(f, "Snapshot persistence failed: {}", msg),
            MemoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl fmt::Display for DriftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftError::Sampling {
                requested,
                available,
            } => write!(
                f,
                "Cannot sample {} distinct questions from a vocabulary of {}",
                requested, available
            ),
        }
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Failed(msg) => write!(f, "Response generation failed: {}", msg),
            GenerationError::Timeout(limit) => {
                write!(f, "Response generation timed out after {:?}", limit)
            }
            GenerationError::EmptyResponse => write!(f, "Empty response from generator"),
        }
    }
}

impl std::error::Error for NarrativeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NarrativeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for MemoryError {}
impl std::error::Error for DriftError {}
impl std::error::Error for GenerationError {}

// From 转换实现
impl From<std::io::Error> for NarrativeError {
    fn from(err: std::io::Error) -> Self {
        NarrativeError::Io(err)
    }
}

impl From<serde_json::Error> for NarrativeError {
    fn from(err: serde_json::Error) -> Self {
        NarrativeError::Memory(MemoryError::Serialization(err.to_string()))
    }
}

impl From<serde_yaml::Error> for NarrativeError {
    fn from(err: serde_yaml::Error) -> Self {
        NarrativeError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<ConfigError> for NarrativeError {
    fn from(err: ConfigError) -> Self {
        NarrativeError::Config(err)
    }
}

impl From<MemoryError> for NarrativeError {
    fn from(err: MemoryError) -> Self {
        NarrativeError::Memory(err)
    }
}

impl From<DriftError> for NarrativeError {
    fn from(err: DriftError) -> Self {
        NarrativeError::Drift(err)
    }
}

impl From<GenerationError> for NarrativeError {
    fn from(err: GenerationError) -> Self {
        NarrativeError::Generation(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, NarrativeError>;
