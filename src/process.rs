//! 外部搜索进程执行器：参数数组启动、单一超时、输出上限、全局并发上限

use std::ffi::OsStr;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::GLOBAL_CONFIG;
use crate::error::Error;

/// stderr 只用于诊断，保留前 64 KiB
const MAX_STDERR_SIZE: usize = 64 * 1024;

/// 同一配置下所有外部进程共享的并发名额
pub type EngineSlots = Arc<Semaphore>;

/// 全局配置对应的名额池，无显式配置的调用共用它
pub static GLOBAL_ENGINE_SLOTS: Lazy<EngineSlots> = Lazy::new(|| engine_slots(GLOBAL_CONFIG.max_concurrent));

pub fn engine_slots(max_concurrent: usize) -> EngineSlots {
    Arc::new(Semaphore::new(max_concurrent.max(1)))
}

#[derive(Debug, Clone)]
pub struct RunLimits {
    pub timeout: Duration,
    pub max_output: usize,
    pub slots: EngineSlots,
}

#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    /// stdout 超过上限被截断（最后一行不完整时已丢弃）
    pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("program not found")]
    Missing,
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RunError {
    /// 映射到对外错误分类：未安装 / 超时 / 执行失败
    pub fn classify(self, engine: &str, guidance: &str, operation: &str) -> Error {
        match self {
            Self::Missing => Error::unavailable(engine, guidance),
            Self::TimedOut(timeout) => Error::EngineTimeout {
                operation: operation.to_string(),
                timeout,
            },
            Self::Io(e) => Error::failure(operation, format!("{engine}: {e}")),
        }
    }
}

/// 运行一个外部程序并收集输出
pub async fn run_engine<S: AsRef<OsStr>>(program: &OsStr, args: &[S], limits: &RunLimits) -> Result<EngineOutput, RunError> {
    let _slot = limits
        .slots
        .acquire()
        .await
        .map_err(|e| RunError::Io(io::Error::other(e)))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Windows 下不弹出控制台窗口
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    debug!(program = ?program, args = args.len(), "启动外部搜索进程");
    let started = Instant::now();

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RunError::Missing,
        _ => RunError::Io(e),
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RunError::Io(io::Error::other("stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RunError::Io(io::Error::other("stderr not captured")))?;

    let collect = async {
        let (out, err, status) = tokio::join!(
            read_bounded(stdout, limits.max_output),
            read_bounded(stderr, MAX_STDERR_SIZE),
            child.wait()
        );
        Ok::<_, io::Error>((out?, err?, status?))
    };

    let outcome = tokio::time::timeout(limits.timeout, collect).await;
    let ((stdout_bytes, truncated), (stderr_bytes, _), status) = match outcome {
        Ok(result) => result?,
        Err(_) => {
            warn!(program = ?program, timeout = ?limits.timeout, "外部搜索进程超时，已终止");
            let _ = child.kill().await;
            return Err(RunError::TimedOut(limits.timeout));
        }
    };

    let mut stdout = decode_output(&stdout_bytes);
    if truncated {
        warn!(program = ?program, limit = limits.max_output, "输出超过上限，已截断");
        match stdout.rfind('\n') {
            Some(pos) => stdout.truncate(pos + 1),
            None => stdout.clear(),
        }
    }

    debug!(
        program = ?program,
        code = ?status.code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "外部搜索进程结束"
    );

    Ok(EngineOutput {
        stdout,
        stderr: decode_output(&stderr_bytes),
        exit_code: status.code(),
        success: status.success(),
        truncated,
    })
}

// 超过上限后继续读完并丢弃，避免子进程写满管道后卡住
async fn read_bounded<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut truncated = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(buf.len());
        if n > room {
            truncated = true;
        }
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok((buf, truncated))
}

/// 智能检测编码：先尝试 UTF-8，有错误则按 GBK 解码（旧版 Windows 代码页）
pub fn decode_output(bytes: &[u8]) -> String {
    let (decoded_utf8, _, had_errors) = encoding_rs::UTF_8.decode(bytes);
    if !had_errors {
        return decoded_utf8.into_owned();
    }
    let (decoded_gbk, _, _) = encoding_rs::GBK.decode(bytes);
    decoded_gbk.into_owned()
}
