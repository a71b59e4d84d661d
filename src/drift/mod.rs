//! 漂移（Drift）生成
//!
//! 三个基础操作都是"随机源 + 输入"的纯函数，随机源由调用方注入：
//!
//! - [`next_drift`]：从模板中挑一条反思，必要时引用上一条漂移
//! - [`self_tags`]：情绪标签 + 概念标签
//! - [`internal_questions`]：不放回地抽取 `k` 个内部问题
//!
//! [`DriftGenerator`] 把它们和一个私有随机源组合在一起，供定时任务使用；
//! 测试时用 [`DriftGenerator::seeded`] 得到可复现的输出。

pub mod vocabulary;

use crate::error::{DriftError, Result};
use crate::memory::Entry;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Mutex;
use vocabulary::{CONCEPT_TAGS, DRIFT_TEMPLATES, EMOTION_TAGS, INTERNAL_QUESTIONS};

/// 每次漂移默认生成的内部问题数
pub const DEFAULT_QUESTION_COUNT: usize = 2;

/// 一对自我标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTags {
    pub emotion: String,
    pub concept: String,
}

/// 一次完整的漂移输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub drift: String,
    pub tags: SelfTags,
    pub internal_questions: Vec<String>,
}

impl Reflection {
    /// 转成 session 层记录：`{drift, tags: [emotion, concept], internal_questions}`
    pub fn into_entry(self) -> Entry {
        let mut payload = Map::new();
        payload.insert("drift".into(), Value::String(self.drift));
        payload.insert(
            "tags".into(),
            Value::Array(vec![
                Value::String(self.tags.emotion),
                Value::String(self.tags.concept),
            ]),
        );
        payload.insert(
            "internal_questions".into(),
            Value::Array(
                self.internal_questions
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
        );
        Entry::new(payload)
    }
}

// ── 纯函数 ───────────────────────────────────────────────────────────────────

fn pick<R: Rng + ?Sized>(rng: &mut R, vocab: &[&'static str]) -> &'static str {
    vocab[rng.gen_range(0..vocab.len())]
}

/// 随机挑一条反思模板；给出上一条漂移时追加引用
pub fn next_drift<R: Rng + ?Sized>(rng: &mut R, previous: Option<&str>) -> String {
    let template = pick(rng, DRIFT_TEMPLATES);
    match previous.filter(|p| !p.is_empty()) {
        Some(previous) => format!("{template} Previously, I pondered: '{previous}'"),
        None => template.to_string(),
    }
}

/// 独立抽取一个情绪标签和一个概念标签
pub fn self_tags<R: Rng + ?Sized>(rng: &mut R) -> SelfTags {
    SelfTags {
        emotion: pick(rng, EMOTION_TAGS).to_string(),
        concept: pick(rng, CONCEPT_TAGS).to_string(),
    }
}

/// 不放回地抽取 `k` 个内部问题，`k` 超过词表大小时报错
pub fn internal_questions<R: Rng + ?Sized>(rng: &mut R, k: usize) -> Result<Vec<String>> {
    if k > INTERNAL_QUESTIONS.len() {
        return Err(DriftError::Sampling {
            requested: k,
            available: INTERNAL_QUESTIONS.len(),
        }
        .into());
    }
    Ok(rand::seq::index::sample(rng, INTERNAL_QUESTIONS.len(), k)
        .into_iter()
        .map(|i| INTERNAL_QUESTIONS[i].to_string())
        .collect())
}

// ── DriftGenerator ───────────────────────────────────────────────────────────

/// 持有随机源的漂移生成器，可在定时任务与调用方之间共享
pub struct DriftGenerator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Default for DriftGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl DriftGenerator {
    /// 使用任意随机源
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Mutex::new(Box::new(rng)),
        }
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// 固定种子，输出可复现
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// 生成一次完整漂移：反思文本、标签和 `question_count` 个内部问题
    pub fn reflect(&self, previous: Option<&str>, question_count: usize) -> Result<Reflection> {
        let mut guard = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let rng = &mut **guard;
        let drift = next_drift(rng, previous);
        let tags = self_tags(rng);
        let internal_questions = internal_questions(rng, question_count)?;
        Ok(Reflection {
            drift,
            tags,
            internal_questions,
        })
    }
}
