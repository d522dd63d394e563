//! Everything 命令行 (es.exe) 适配器

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use tracing::{debug, info, warn};

use super::{lookup_target, not_found, paginate, probe_limits, sanitized_query, search_limits};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::process::{engine_slots, run_engine, EngineOutput, EngineSlots, RunError, RunLimits};
use crate::types::{FileInfo, PlatformStatus, SearchOptions, SearchRequest, SearchResult, SortField, SortOrder};
use crate::validation::{validate_path, validate_search_options};

pub const ENGINE_NAME: &str = "Everything (es.exe CLI)";

const INSTALL_GUIDANCE: &str = "Download es.exe from https://www.voidtools.com/downloads/ into the bin directory \
                                next to this program, or set UNISEARCH_ES_PATH.";

/// 结果列顺序固定：名称、所在目录、完整路径、大小、修改时间、创建时间、属性
const RESULT_COLUMNS: [&str; 7] = [
    "-name",
    "-path-column",
    "-full-path-and-name",
    "-size",
    "-date-modified",
    "-date-created",
    "-attributes",
];

/// TSV、无表头、ISO-8601 日期、大小按字节
const OUTPUT_FORMAT: [&str; 6] = ["-tsv", "-no-header", "-date-format", "1", "-size-format", "1"];

/// Win32 FILE_ATTRIBUTE_DIRECTORY
pub const ATTRIBUTE_DIRECTORY: u32 = 0x10;

#[derive(Debug, Clone)]
pub struct WindowsAdapter {
    es_path: PathBuf,
    instance: Option<String>,
    limits: RunLimits,
    probe: RunLimits,
}

impl WindowsAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_slots(config, engine_slots(config.max_concurrent))
    }

    pub fn with_slots(config: &EngineConfig, slots: EngineSlots) -> Self {
        Self {
            es_path: config.es_path.clone(),
            instance: config.es_instance.clone(),
            limits: search_limits(config, &slots),
            probe: probe_limits(config, &slots),
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let options = validate_search_options(request)?;
        let query = sanitized_query(&options)?;
        let args = build_search_args(self.instance.as_deref(), &options, &query);

        info!(query = %query, max_results = options.max_results, offset = options.offset, "Everything 搜索");
        let output = self.run(&args, "search").await?;
        let output = match check_output(output, "search").map_err(|e| e.with_context(&format!("query={query}")))? {
            Some(output) => output,
            None => return Ok(Vec::new()),
        };

        let results = parse_es_output(&output.stdout);
        debug!(parsed = results.len(), "es.exe 输出解析完成");
        Ok(paginate(results, options.offset, options.max_results))
    }

    pub async fn file_info(&self, path: &str) -> Result<FileInfo> {
        validate_path(path)?;
        let target = to_native(&lookup_target(path).ok_or_else(|| not_found(path))?);

        let mut args = self.instance_args();
        args.extend(["-n", "16"].map(String::from));
        args.extend(RESULT_COLUMNS.map(String::from));
        args.extend(output_format());
        args.extend(["-match-path", "-ww"].map(String::from));
        args.push(format!("\"{target}\""));

        let output = self.run(&args, "get file info").await?;
        let output = check_output(output, "get file info")
            .map_err(|e| e.with_context(&format!("path={target}")))?
            .ok_or_else(|| not_found(path))?;

        parse_es_output(&output.stdout)
            .into_iter()
            .find(|r| same_path(&r.full_path, &target))
            .map(FileInfo::from)
            .ok_or_else(|| not_found(path))
    }

    pub async fn status(&self) -> PlatformStatus {
        let mut args = self.instance_args();
        args.push("-version".to_string());

        let version = match run_engine(self.es_path.as_os_str(), &args, &self.probe).await {
            Ok(output) => output.stdout.trim().to_string(),
            Err(RunError::Missing) => {
                return unavailable(format!("es.exe not found. {INSTALL_GUIDANCE}"), None);
            }
            Err(e) => {
                return unavailable(format!("Error checking Everything status: {e}"), None);
            }
        };

        // es.exe 在，但 Everything 本体未运行时 IPC 版本为空或 0.0.0.0
        let mut ipc_args = self.instance_args();
        ipc_args.push("-get-everything-version".to_string());
        let service_version = run_engine(self.es_path.as_os_str(), &ipc_args, &self.probe)
            .await
            .map(|o| o.stdout.trim().to_string())
            .unwrap_or_default();

        if service_version.is_empty() || service_version == "0.0.0.0" {
            warn!("Everything IPC 未响应");
            return unavailable(
                "es.exe found, but Everything is not running or its IPC is unavailable. Start Everything and retry."
                    .to_string(),
                Some(version),
            );
        }

        PlatformStatus {
            platform: "windows".to_string(),
            search_engine: ENGINE_NAME.to_string(),
            available: true,
            version: Some(if version.is_empty() { service_version } else { version }),
            message: "Everything command-line interface available (sorting, regex, whole-word, case and path matching supported)"
                .to_string(),
        }
    }

    fn instance_args(&self) -> Vec<String> {
        match &self.instance {
            Some(instance) => vec!["-instance".to_string(), instance.clone()],
            None => Vec::new(),
        }
    }

    async fn run(&self, args: &[String], operation: &str) -> Result<EngineOutput> {
        run_engine(self.es_path.as_os_str(), args, &self.limits)
            .await
            .map_err(|e| e.classify("es.exe", INSTALL_GUIDANCE, operation))
    }
}

fn unavailable(message: String, version: Option<String>) -> PlatformStatus {
    PlatformStatus {
        platform: "windows".to_string(),
        search_engine: ENGINE_NAME.to_string(),
        available: false,
        version,
        message,
    }
}

fn output_format() -> Vec<String> {
    OUTPUT_FORMAT.map(String::from).to_vec()
}

pub fn sort_flag(field: SortField) -> &'static str {
    match field {
        SortField::Name => "name",
        SortField::Path => "path",
        SortField::Size => "size",
        SortField::Extension => "extension",
        SortField::DateModified => "date-modified",
        SortField::DateCreated => "date-created",
        SortField::Attributes => "attributes",
        SortField::RunCount => "run-count",
    }
}

/// 组装 es.exe 参数；查询文本永远排在开关之后
pub fn build_search_args(instance: Option<&str>, options: &SearchOptions, query: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if let Some(instance) = instance {
        args.push("-instance".to_string());
        args.push(instance.to_string());
    }

    // 本地再做 offset 切片，所以要多取 offset 条
    args.push("-n".to_string());
    args.push((options.offset + options.max_results).to_string());
    args.extend(RESULT_COLUMNS.map(String::from));
    args.extend(output_format());

    if options.match_path {
        args.push("-match-path".to_string());
    }
    if options.match_case {
        args.push("-case".to_string());
    }
    if options.match_whole_word {
        args.push("-ww".to_string());
    }

    if let Some(field) = options.sort_by {
        args.push("-sort".to_string());
        args.push(sort_flag(field).to_string());
        args.push(match options.sort_order {
            SortOrder::Ascending => "-sort-ascending".to_string(),
            SortOrder::Descending => "-sort-descending".to_string(),
        });
    }

    if options.regex {
        args.push("-regex".to_string());
        args.push(query.to_string());
        return args;
    }

    // 清洗后的查询只含 `/`，先拆分再转回反斜杠，避免 shell_words 把反斜杠当转义
    let tokens = split_query(query);
    if options.match_path {
        args.extend(tokens.iter().map(|t| to_native(t)));
    } else {
        args.extend(tokens);
    }
    args
}

/// 查询按空格拆成多个参数，避免整个查询被引号包裹导致 es.exe 解析失败；
/// shell_words::split 能正确处理带引号的关键词，如 "New Folder"
pub fn split_query(query: &str) -> Vec<String> {
    let parts = shell_words::split(query)
        .unwrap_or_else(|_| query.split_whitespace().map(str::to_string).collect());

    // 以 - 开头的词会被 es.exe 当成开关，包成短语
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .map(|p| if p.starts_with('-') { format!("\"{p}\"") } else { p })
        .collect()
}

fn to_native(path: &str) -> String {
    path.replace('/', "\\")
}

fn same_path(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.replace('/', "\\").trim_end_matches('\\').to_lowercase();
    normalize(a) == normalize(b)
}

/// stderr 为空 → 正常；含 "not found"/"no results"（非 IPC 问题）→ 无结果；其余 → 失败
fn check_output(output: EngineOutput, operation: &str) -> Result<Option<EngineOutput>> {
    let stderr = output.stderr.trim();
    if !stderr.is_empty() {
        let lower = stderr.to_lowercase();
        if (lower.contains("not found") || lower.contains("no results")) && !lower.contains("ipc") {
            debug!("es.exe 报告无结果: {}", stderr);
            return Ok(None);
        }
        warn!("es.exe stderr: {}", stderr);
        return Err(Error::failure(operation, format!("es.exe error: {stderr}")));
    }

    if !output.success {
        let first_line = output.stdout.lines().next().unwrap_or("").trim();
        return Err(Error::failure(
            operation,
            format!("es.exe exited with code {:?}: {first_line}", output.exit_code),
        ));
    }

    Ok(Some(output))
}

/// 解析 TSV 输出；缺少的尾部字段视为可选
pub fn parse_es_output(stdout: &str) -> Vec<SearchResult> {
    let mut lines = stdout.lines().filter(|l| !l.trim().is_empty()).peekable();

    // 老版本 es.exe 不认 -no-header，跳过表头
    if lines.peek().is_some_and(|first| is_header(first)) {
        lines.next();
    }

    lines.filter_map(parse_es_line).collect()
}

fn is_header(line: &str) -> bool {
    let mut fields = line.split('\t').map(|f| f.trim().trim_matches('"'));
    matches!(fields.next(), Some("Name" | "Filename")) && matches!(fields.next(), None | Some("Path" | "Size"))
}

fn parse_es_line(line: &str) -> Option<SearchResult> {
    let fields: Vec<&str> = line
        .trim_end_matches('\r')
        .split('\t')
        .map(|f| f.trim().trim_matches('"'))
        .collect();

    let first = *fields.first()?;
    if first.is_empty() {
        return None;
    }

    // 兜底：只有一列时是完整路径
    let (name, path, full_path) = if fields.len() == 1 {
        let trimmed = first.trim_end_matches(['\\', '/']);
        match trimmed.rsplit_once(['\\', '/']) {
            Some((parent, name)) => (name.to_string(), parent.to_string(), first.to_string()),
            None => (first.to_string(), String::new(), first.to_string()),
        }
    } else {
        let full_path = fields.get(2).copied().filter(|f| !f.is_empty()).unwrap_or(first);
        (first.to_string(), fields[1].to_string(), full_path.to_string())
    };

    let attributes = fields.get(6).and_then(|f| parse_attributes(f));
    let is_folder = match attributes {
        Some(mask) => mask & ATTRIBUTE_DIRECTORY != 0,
        None => full_path.ends_with('\\') || full_path.ends_with('/'),
    };

    let mut result = SearchResult::new(name, path, full_path, is_folder);
    result.size = fields.get(3).and_then(|f| f.replace(',', "").parse::<u64>().ok());
    result.modified = fields.get(4).and_then(|f| parse_es_date(f));
    result.created = fields.get(5).and_then(|f| parse_es_date(f));
    result.attributes = attributes;
    Some(result)
}

/// 属性可能是数字（十进制/0x 十六进制）或字母形式（RHSDA…）
pub fn parse_attributes(field: &str) -> Option<u32> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    if let Ok(mask) = field.parse::<u32>() {
        return Some(mask);
    }
    if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }

    let mut mask = 0;
    for c in field.chars() {
        mask |= match c.to_ascii_uppercase() {
            'R' => 0x1,
            'H' => 0x2,
            'S' => 0x4,
            'D' => ATTRIBUTE_DIRECTORY,
            'A' => 0x20,
            'N' => 0x80,
            'T' => 0x100,
            'P' => 0x200,
            'L' => 0x400,
            'C' => 0x800,
            'O' => 0x1000,
            'I' => 0x2000,
            'E' => 0x4000,
            _ => 0,
        };
    }
    Some(mask)
}

/// FILETIME 起点 (1601) 与 Unix 纪元之差
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;

pub fn parse_es_date(field: &str) -> Option<DateTime<Local>> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(field) {
        return Some(dt.with_timezone(&Local));
    }

    // -date-format 2：FILETIME，100ns 为单位
    if field.len() > 12 && field.bytes().all(|b| b.is_ascii_digit()) {
        let ticks = field.parse::<i64>().ok()?;
        let secs = ticks / 10_000_000 - FILETIME_UNIX_OFFSET_SECS;
        return Local.timestamp_opt(secs, 0).single();
    }

    const FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(field, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}
