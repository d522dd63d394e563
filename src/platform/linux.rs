//! ripgrep / locate 适配器

use std::ffi::OsStr;
use std::path::PathBuf;

use tracing::{debug, info};

use super::{
    accept_line_output, paginate, parse_path_lines, probe_limits, sanitized_query, search_limits, stat_file_info,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::process::{engine_slots, run_engine, EngineSlots, RunError, RunLimits};
use crate::types::{FileInfo, PlatformStatus, SearchOptions, SearchRequest, SearchResult};
use crate::validation::validate_search_options;

pub const ENGINE_NAME: &str = "ripgrep/locate";

const INSTALL_GUIDANCE: &str = "Install ripgrep (recommended) or locate (mlocate/plocate) and make sure it is on PATH.";

/// GNU stat：类型、大小、创建、修改、访问（epoch 秒）、路径，制表符分隔
const STAT_FORMAT: &str = "%F\t%s\t%W\t%Y\t%X\t%n";

const UNSUPPORTED_FEATURES: &str = "whole-word matching and sorting are not supported";

/// 本次搜索实际使用的工具
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinuxEngine {
    Ripgrep,
    Locate,
}

impl LinuxEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ripgrep => "ripgrep",
            Self::Locate => "locate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinuxAdapter {
    rg: String,
    locate: String,
    stat: String,
    search_root: PathBuf,
    limits: RunLimits,
    probe: RunLimits,
}

impl LinuxAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_slots(config, engine_slots(config.max_concurrent))
    }

    pub fn with_slots(config: &EngineConfig, slots: EngineSlots) -> Self {
        Self {
            rg: config.rg_program.clone(),
            locate: config.locate_program.clone(),
            stat: config.stat_program.clone(),
            search_root: config.search_root.clone(),
            limits: search_limits(config, &slots),
            probe: probe_limits(config, &slots),
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let options = validate_search_options(request)?;
        let query = sanitized_query(&options)?;

        // 每次调用重新探测；正则只交给 locate
        let engine = if !options.regex && self.version_of(&self.rg).await.is_some() {
            LinuxEngine::Ripgrep
        } else {
            LinuxEngine::Locate
        };

        let (program, args) = match engine {
            LinuxEngine::Ripgrep => (&self.rg, build_rg_args(&options, &query, &self.search_root)),
            LinuxEngine::Locate => (&self.locate, build_locate_args(&options, &query)),
        };

        info!(
            engine = engine.as_str(),
            query = %query,
            max_results = options.max_results,
            offset = options.offset,
            "Linux 文件搜索"
        );
        let output = run_engine(OsStr::new(program), &args, &self.limits)
            .await
            .map_err(|e| match (engine, e) {
                (LinuxEngine::Locate, RunError::Missing) => no_engine(),
                (_, e) => e.classify(engine.as_str(), INSTALL_GUIDANCE, "search"),
            })?;

        let output = match accept_line_output(program, output, "search")
            .map_err(|e| e.with_context(&format!("query={query}")))?
        {
            Some(output) => output,
            None => return Ok(Vec::new()),
        };

        let results = parse_path_lines(&output.stdout);
        debug!(parsed = results.len(), truncated = output.truncated, "搜索输出解析完成");
        Ok(paginate(results, options.offset, options.max_results))
    }

    pub async fn file_info(&self, path: &str) -> Result<FileInfo> {
        stat_file_info(&self.stat, ["-c", STAT_FORMAT], path, &self.limits).await
    }

    pub async fn status(&self) -> PlatformStatus {
        if let Some(version) = self.version_of(&self.rg).await {
            return PlatformStatus {
                platform: "linux".to_string(),
                search_engine: LinuxEngine::Ripgrep.as_str().to_string(),
                available: true,
                version: Some(version),
                message: format!("ripgrep available for fast search (regex queries use locate; {UNSUPPORTED_FEATURES})"),
            };
        }

        if let Some(version) = self.version_of(&self.locate).await {
            return PlatformStatus {
                platform: "linux".to_string(),
                search_engine: LinuxEngine::Locate.as_str().to_string(),
                available: true,
                version: Some(version),
                message: format!("locate available. For better performance, install ripgrep. ({UNSUPPORTED_FEATURES})"),
            };
        }

        PlatformStatus {
            platform: "linux".to_string(),
            search_engine: "none".to_string(),
            available: false,
            version: None,
            message: "Neither ripgrep nor locate found. Please install ripgrep for fast search.".to_string(),
        }
    }

    /// `--version` 首行；未安装或探测失败返回 None
    async fn version_of(&self, program: &str) -> Option<String> {
        match run_engine(OsStr::new(program), &["--version"], &self.probe).await {
            Ok(output) => Some(output.stdout.lines().next().unwrap_or("").trim().to_string()),
            Err(RunError::Missing) => None,
            Err(e) => {
                debug!(program, "版本探测失败: {}", e);
                None
            }
        }
    }
}

/// `rg --files` 列出根目录下所有文件，再用 glob 过滤
pub fn build_rg_args(options: &SearchOptions, query: &str, root: &std::path::Path) -> Vec<String> {
    let mut args: Vec<String> = ["--files", "--hidden", "--no-messages", "--color", "never", "--sort", "path"]
        .map(String::from)
        .to_vec();

    let glob_flag = if options.match_case { "--glob" } else { "--iglob" };
    let patterns = if options.match_path {
        vec![format!("**/*{query}*"), format!("**/*{query}*/**")]
    } else {
        vec![format!("*{query}*")]
    };
    for pattern in patterns {
        args.push(glob_flag.to_string());
        args.push(pattern);
    }

    args.push("--".to_string());
    args.push(root.to_string_lossy().into_owned());
    args
}

/// locate 自带数量上限，按 offset+limit 取
pub fn build_locate_args(options: &SearchOptions, query: &str) -> Vec<String> {
    let mut args = Vec::new();
    if !options.match_case {
        args.push("-i".to_string());
    }
    if !options.match_path {
        args.push("-b".to_string());
    }
    if options.regex {
        args.push("--regex".to_string());
    }
    args.push("-l".to_string());
    args.push((options.offset + options.max_results).to_string());
    args.push("--".to_string());
    args.push(query.to_string());
    args
}

fn no_engine() -> Error {
    Error::unavailable("ripgrep or locate", INSTALL_GUIDANCE)
}
