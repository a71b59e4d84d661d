//! 命令行入口：参数解析与交互循环
//!
//! rustyline 的编辑器固定在一个专用线程上，主循环每需要一行输入就发一次请求，
//! 这样提示符不会和上一轮的响应输出交错。

use crate::config::NarrativeConfig;
use crate::error::{NarrativeError, Result};
use crate::narrative::NarrativeSystem;
use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

const PROMPT: &str = "Enter prompt: ";
const EXIT_SENTINEL: &str = "exit";

#[derive(Debug, Parser)]
#[command(
    name = "echo_narrative",
    version,
    about = "带分层记忆和定时漂移的叙事模拟器"
)]
pub struct Cli {
    /// YAML 配置文件
    #[arg(short, long, env = "NARRATIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// 快照目录
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// 漂移间隔（秒）
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// session 层压缩阈值
    #[arg(long)]
    pub threshold: Option<usize>,

    /// 漂移随机种子
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Cli {
    /// 读取配置文件和环境变量，再用命令行参数覆盖
    pub fn resolve_config(&self) -> Result<NarrativeConfig> {
        let mut config = NarrativeConfig::resolve(self.config.as_deref())?;
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir = dir.clone();
        }
        if let Some(secs) = self.interval {
            config.drift_interval_secs = secs;
        }
        if let Some(threshold) = self.threshold {
            config.compress_threshold = threshold;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

/// 一行输入的含义
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Exit,
    Skip,
    Prompt(String),
}

pub fn classify(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Skip
    } else if trimmed.eq_ignore_ascii_case(EXIT_SENTINEL) {
        Input::Exit
    } else {
        Input::Prompt(trimmed.to_string())
    }
}

enum ReadEvent {
    Line(String),
    /// Ctrl-C / Ctrl-D / 终端错误
    Closed(String),
}

/// 在专用线程上运行编辑器，每收到一次请求读取一行
fn spawn_reader() -> Result<(std::sync::mpsc::Sender<()>, mpsc::Receiver<ReadEvent>)> {
    let mut editor = DefaultEditor::new()
        .map_err(|e| NarrativeError::Other(format!("无法初始化终端: {e}")))?;
    let (request_tx, request_rx) = std::sync::mpsc::channel::<()>();
    let (line_tx, line_rx) = mpsc::channel(1);

    std::thread::spawn(move || {
        while request_rx.recv().is_ok() {
            let event = match editor.readline(PROMPT) {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    ReadEvent::Line(line)
                }
                Err(ReadlineError::Interrupted) => ReadEvent::Closed("interrupted".into()),
                Err(ReadlineError::Eof) => ReadEvent::Closed("eof".into()),
                Err(e) => ReadEvent::Closed(e.to_string()),
            };
            let closed = matches!(event, ReadEvent::Closed(_));
            if line_tx.blocking_send(event).is_err() || closed {
                break;
            }
        }
    });
    Ok((request_tx, line_rx))
}

/// 交互循环：启动漂移，逐行处理输入，任何退出路径都会执行关闭并打印摘要
pub async fn run(system: Arc<NarrativeSystem>) -> Result<()> {
    let (request_tx, mut lines) = spawn_reader()?;
    system.start_drift().await;
    println!("Starting Narrative System. Type '{EXIT_SENTINEL}' to stop.\n");

    loop {
        if request_tx.send(()).is_err() {
            break;
        }
        let event = tokio::select! {
            event = lines.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down Narrative System.");
                break;
            }
        };
        let line = match event {
            Some(ReadEvent::Line(line)) => line,
            Some(ReadEvent::Closed(reason)) => {
                info!(reason = %reason, "输入已关闭");
                println!("\nShutting down Narrative System.");
                break;
            }
            None => break,
        };

        let prompt = match classify(&line) {
            Input::Exit => break,
            Input::Skip => continue,
            Input::Prompt(prompt) => prompt,
        };

        // 交互在独立任务中完成，Ctrl-C 只决定处理完这一轮后退出
        let mut pending = system.submit_detached(prompt);
        let (outcome, interrupted) = tokio::select! {
            outcome = &mut pending => (outcome, false),
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down Narrative System.");
                (pending.await, true)
            }
        };
        match outcome {
            Ok(Ok(response)) => println!("Response: {response}"),
            Ok(Err(e)) => {
                warn!("交互失败: {e}");
                println!("Error: {e}");
            }
            Err(e) => warn!("交互任务异常结束: {e}"),
        }
        if interrupted {
            break;
        }
    }

    println!("{}", system.shutdown().await);
    Ok(())
}
