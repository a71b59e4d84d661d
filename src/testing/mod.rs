//! 测试基础设施
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockGenerator`] | 替代真实模型，用于测试交互路径的成功 / 失败 / 超时行为 |
//!
//! 分层记忆的测试直接使用 [`InMemorySnapshotStore`](crate::memory::InMemorySnapshotStore)，
//! 漂移的测试使用 [`DriftGenerator::seeded`](crate::drift::DriftGenerator::seeded)。

mod mock_generator;

pub use mock_generator::MockGenerator;
