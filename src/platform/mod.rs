//! 平台适配器：每个平台驱动一个外部搜索工具，输出统一的结果结构

pub mod darwin;
pub mod linux;
pub mod windows;

use std::ffi::OsStr;
use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result, ValidationCode, ValidationError};
use crate::process::{run_engine, EngineOutput, EngineSlots, RunLimits};
use crate::types::{FileInfo, PlatformStatus, SearchOptions, SearchRequest, SearchResult};
use crate::validation::{sanitize_argument, validate_path};

pub use darwin::DarwinAdapter;
pub use linux::LinuxAdapter;
pub use windows::WindowsAdapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Darwin,
    Linux,
    Unsupported(String),
}

impl Platform {
    /// 每次调用重新检测，不缓存
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" | "darwin" => Self::Darwin,
            "linux" => Self::Linux,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 三种平台策略之一
#[derive(Debug, Clone)]
pub enum Adapter {
    Windows(WindowsAdapter),
    Darwin(DarwinAdapter),
    Linux(LinuxAdapter),
}

impl Adapter {
    /// `slots` 由调用方持有，同一配置下的多次调用共用一个并发上限
    pub fn for_platform(platform: &Platform, config: &EngineConfig, slots: &EngineSlots) -> Option<Self> {
        match platform {
            Platform::Windows => Some(Self::Windows(WindowsAdapter::with_slots(config, slots.clone()))),
            Platform::Darwin => Some(Self::Darwin(DarwinAdapter::with_slots(config, slots.clone()))),
            Platform::Linux => Some(Self::Linux(LinuxAdapter::with_slots(config, slots.clone()))),
            Platform::Unsupported(_) => None,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        match self {
            Self::Windows(a) => a.search(request).await,
            Self::Darwin(a) => a.search(request).await,
            Self::Linux(a) => a.search(request).await,
        }
    }

    pub async fn file_info(&self, path: &str) -> Result<FileInfo> {
        match self {
            Self::Windows(a) => a.file_info(path).await,
            Self::Darwin(a) => a.file_info(path).await,
            Self::Linux(a) => a.file_info(path).await,
        }
    }

    pub async fn status(&self) -> PlatformStatus {
        match self {
            Self::Windows(a) => a.status().await,
            Self::Darwin(a) => a.status().await,
            Self::Linux(a) => a.status().await,
        }
    }
}

pub(crate) fn search_limits(config: &EngineConfig, slots: &EngineSlots) -> RunLimits {
    RunLimits {
        timeout: config.command_timeout,
        max_output: config.max_buffer_size,
        slots: slots.clone(),
    }
}

pub(crate) fn probe_limits(config: &EngineConfig, slots: &EngineSlots) -> RunLimits {
    RunLimits {
        timeout: config.probe_timeout,
        max_output: 64 * 1024,
        slots: slots.clone(),
    }
}

/// 清洗后的查询；清洗后为空（全是危险字符）时拒绝，而不是变成"列出全部"
pub(crate) fn sanitized_query(options: &SearchOptions) -> Result<String> {
    let query = sanitize_argument(&options.query);
    if query.is_empty() {
        return Err(ValidationError::new(
            ValidationCode::EmptyQuery,
            "Query cannot be empty after removing unsafe characters",
        )
        .into());
    }
    Ok(query)
}

/// 文件信息查询的目标：清洗后若原路径是绝对路径则补回根 `/`。
///
/// 清洗只允许统一分隔符和合并 `/`；若还删掉了别的字符（如非开头的 `~`），
/// 查到的会是另一个文件，此时返回 None，由调用方报告未找到。
pub(crate) fn lookup_target(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let sanitized = sanitize_argument(trimmed);
    let target = if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        format!("/{sanitized}")
    } else {
        sanitized
    };

    let mut normalized = String::with_capacity(trimmed.len());
    for c in trimmed.chars().map(|c| if c == '\\' { '/' } else { c }) {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }

    if target == normalized {
        Some(target)
    } else {
        debug!(raw, target = %target, "清洗改变了路径，按未找到处理");
        None
    }
}

/// 先跳过 offset，再截取 limit，顺序不能反
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

/// 每行一个绝对路径的输出（mdfind / locate / rg --files）
pub fn parse_path_lines(stdout: &str) -> Vec<SearchResult> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(parse_path_line)
        .collect()
}

/// 末尾的 `/` 是唯一的目录判据
pub fn parse_path_line(line: &str) -> SearchResult {
    let is_folder = line.ends_with('/');
    let body = line.trim_end_matches('/');
    if body.is_empty() {
        return SearchResult::new("/".to_string(), String::new(), "/".to_string(), true);
    }

    let (path, name) = body.rsplit_once('/').unwrap_or(("", body));
    SearchResult::new(name.to_string(), path.to_string(), body.to_string(), is_folder)
}

/// `stat` 的制表符分隔记录：类型、大小、创建、修改、访问（epoch 秒）、名称
pub(crate) fn parse_stat_record(stdout: &str, target: &str) -> Option<FileInfo> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let fields: Vec<&str> = line.trim_end_matches('\r').splitn(6, '\t').collect();
    if fields.len() < 6 {
        return None;
    }

    let is_folder = fields[0].to_lowercase().contains("directory");
    let full_path = fields[5].trim();
    let trimmed = full_path.trim_end_matches('/');
    let name = trimmed.rsplit_once('/').map_or(trimmed, |(_, n)| n);
    let name = if name.is_empty() { "/" } else { name };
    let extension = if is_folder { None } else { crate::types::extension_of(name) };

    Some(FileInfo {
        path: target.to_string(),
        name: name.to_string(),
        size: fields[1].trim().parse().ok(),
        created: epoch_seconds(fields[2]),
        modified: epoch_seconds(fields[3]),
        accessed: epoch_seconds(fields[4]),
        attributes: None,
        extension,
        is_folder,
        is_file: !is_folder,
    })
}

/// 0、负数或 `-` 表示未知
pub(crate) fn epoch_seconds(field: &str) -> Option<DateTime<Local>> {
    let secs = field.trim().parse::<i64>().ok().filter(|s| *s > 0)?;
    Local.timestamp_opt(secs, 0).single()
}

/// 用 `stat` 查单个路径；`format` 是各平台的格式参数（如 `-c <fmt>`）
pub(crate) async fn stat_file_info(program: &str, format: [&str; 2], raw_path: &str, limits: &RunLimits) -> Result<FileInfo> {
    validate_path(raw_path)?;
    let target = lookup_target(raw_path).ok_or_else(|| not_found(raw_path))?;

    let mut args: Vec<String> = format.map(String::from).to_vec();
    args.push("--".to_string());
    args.push(target.clone());

    let output = run_engine(OsStr::new(program), &args, limits)
        .await
        .map_err(|e| e.classify(program, "stat is part of the base system; check PATH.", "get file info"))?;

    if !output.success {
        let stderr = output.stderr.trim();
        if stderr.is_empty() || stderr.contains("No such file") {
            return Err(not_found(raw_path));
        }
        return Err(Error::failure("get file info", stderr).with_context(&format!("path={target}")));
    }

    parse_stat_record(&output.stdout, &target).ok_or_else(|| not_found(raw_path))
}

/// 行式搜索工具的退出码处理：
/// 非零且 stderr 有内容 → 失败；非零且无输出 → 无匹配；非零但有输出（如权限错误被静默）→ 照常解析
pub(crate) fn accept_line_output(program: &str, output: EngineOutput, operation: &str) -> Result<Option<EngineOutput>> {
    if output.success {
        return Ok(Some(output));
    }

    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        warn!(program, code = ?output.exit_code, "搜索工具报错: {}", stderr);
        return Err(Error::failure(operation, format!("{program} error: {stderr}")));
    }

    if output.stdout.trim().is_empty() {
        debug!(program, code = ?output.exit_code, "无匹配结果");
        return Ok(None);
    }

    debug!(program, code = ?output.exit_code, "非零退出但有输出，保留结果");
    Ok(Some(output))
}

pub(crate) fn not_found(path: &str) -> Error {
    Error::NotFound { path: path.to_string() }
}
