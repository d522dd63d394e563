//! Spotlight (mdfind) 适配器

use std::ffi::OsStr;

use tracing::{debug, info};

use super::{
    accept_line_output, paginate, parse_path_lines, probe_limits, sanitized_query, search_limits, stat_file_info,
};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::process::{engine_slots, run_engine, EngineSlots, RunError, RunLimits};
use crate::types::{FileInfo, PlatformStatus, SearchOptions, SearchRequest, SearchResult};
use crate::validation::validate_search_options;

pub const ENGINE_NAME: &str = "mdfind (Spotlight)";

const INSTALL_GUIDANCE: &str = "Spotlight should be built into macOS; check that mdfind is on PATH.";

/// BSD stat：类型、大小、创建、修改、访问（epoch 秒）、路径，制表符分隔
const STAT_FORMAT: &str = "%HT\t%z\t%B\t%m\t%a\t%N";

#[derive(Debug, Clone)]
pub struct DarwinAdapter {
    mdfind: String,
    stat: String,
    limits: RunLimits,
    probe: RunLimits,
}

impl DarwinAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_slots(config, engine_slots(config.max_concurrent))
    }

    pub fn with_slots(config: &EngineConfig, slots: EngineSlots) -> Self {
        Self {
            mdfind: config.mdfind_program.clone(),
            stat: config.stat_program.clone(),
            limits: search_limits(config, &slots),
            probe: probe_limits(config, &slots),
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let options = validate_search_options(request)?;
        let query = sanitized_query(&options)?;
        let args = build_search_args(&options, &query);

        if options.regex || options.sort_by.is_some() {
            debug!(regex = options.regex, sort = ?options.sort_by, "Spotlight 不支持正则和排序，按普通名称搜索");
        }

        info!(query = %query, max_results = options.max_results, offset = options.offset, "Spotlight 搜索");
        let output = run_engine(OsStr::new(&self.mdfind), &args, &self.limits)
            .await
            .map_err(|e| e.classify("mdfind", INSTALL_GUIDANCE, "search"))?;

        let output = match accept_line_output("mdfind", output, "search")
            .map_err(|e| e.with_context(&format!("query={query}")))?
        {
            Some(output) => output,
            None => return Ok(Vec::new()),
        };

        let results = parse_path_lines(&output.stdout);
        debug!(parsed = results.len(), truncated = output.truncated, "mdfind 输出解析完成");
        Ok(paginate(results, options.offset, options.max_results))
    }

    pub async fn file_info(&self, path: &str) -> Result<FileInfo> {
        stat_file_info(&self.stat, ["-f", STAT_FORMAT], path, &self.limits).await
    }

    pub async fn status(&self) -> PlatformStatus {
        // mdfind 没有版本参数，能启动即视为可用
        match run_engine(OsStr::new(&self.mdfind), &["-help"], &self.probe).await {
            Ok(_) => PlatformStatus {
                platform: "darwin".to_string(),
                search_engine: ENGINE_NAME.to_string(),
                available: true,
                version: None,
                message: "macOS Spotlight search available (regex and sorting are not supported)".to_string(),
            },
            Err(RunError::Missing) => unavailable("mdfind command not found. Spotlight should be built into macOS.".to_string()),
            Err(e) => unavailable(format!("Error checking Spotlight status: {e}")),
        }
    }
}

fn unavailable(message: String) -> PlatformStatus {
    PlatformStatus {
        platform: "darwin".to_string(),
        search_engine: ENGINE_NAME.to_string(),
        available: false,
        version: None,
        message,
    }
}

/// `kind:` 查询原样交给 Spotlight；无修饰时用 `-name`；其余拼成谓词
pub fn build_search_args(options: &SearchOptions, query: &str) -> Vec<String> {
    if query.contains("kind:") && !query.starts_with('-') {
        return vec![query.to_string()];
    }

    if !options.match_path && !options.match_case && !options.match_whole_word {
        return vec!["-name".to_string(), query.to_string()];
    }

    vec![spotlight_predicate(options, query)]
}

/// 例：`kMDItemFSName == "*report*"cd`
pub fn spotlight_predicate(options: &SearchOptions, query: &str) -> String {
    let attribute = if options.match_path { "kMDItemPath" } else { "kMDItemFSName" };
    let escaped = query.replace('"', "\\\"");

    let mut modifiers = String::new();
    if options.match_whole_word {
        modifiers.push('w');
    }
    if !options.match_case {
        modifiers.push_str("cd");
    }

    if options.match_whole_word {
        format!("{attribute} == \"{escaped}\"{modifiers}")
    } else {
        format!("{attribute} == \"*{escaped}*\"{modifiers}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortField;

    fn options(request: SearchRequest) -> SearchOptions {
        validate_search_options(&request).unwrap()
    }

    #[test]
    fn plain_query_uses_name_search() {
        let opts = options(SearchRequest::new("report"));
        assert_eq!(build_search_args(&opts, "report"), ["-name", "report"]);
    }

    #[test]
    fn regex_and_sort_fall_back_to_name_search() {
        let opts = options(SearchRequest {
            regex: true,
            sort_by: Some(SortField::Size),
            ..SearchRequest::new("^rep.*")
        });
        assert_eq!(build_search_args(&opts, "^rep.*"), ["-name", "^rep.*"]);
    }

    #[test]
    fn kind_query_is_passed_through() {
        let opts = options(SearchRequest {
            match_case: true,
            ..SearchRequest::new("kind:pdf invoice")
        });
        assert_eq!(build_search_args(&opts, "kind:pdf invoice"), ["kind:pdf invoice"]);
    }

    #[test]
    fn modifiers_build_a_predicate() {
        let opts = options(SearchRequest {
            match_case: true,
            ..SearchRequest::new("Report")
        });
        assert_eq!(build_search_args(&opts, "Report"), ["kMDItemFSName == \"*Report*\""]);

        let opts = options(SearchRequest {
            match_path: true,
            ..SearchRequest::new("Projects/app")
        });
        assert_eq!(
            build_search_args(&opts, "Projects/app"),
            ["kMDItemPath == \"*Projects/app*\"cd"]
        );

        let opts = options(SearchRequest {
            match_whole_word: true,
            ..SearchRequest::new("notes")
        });
        assert_eq!(build_search_args(&opts, "notes"), ["kMDItemFSName == \"notes\"wcd"]);
    }

    #[test]
    fn quotes_are_escaped_inside_predicate() {
        let opts = options(SearchRequest {
            match_case: true,
            ..SearchRequest::new("say \"hi\"")
        });
        assert_eq!(
            spotlight_predicate(&opts, "say \"hi\""),
            "kMDItemFSName == \"*say \\\"hi\\\"*\""
        );
    }

    #[tokio::test]
    async fn missing_mdfind_reports_unavailable() {
        let config = EngineConfig {
            mdfind_program: "unisearch-no-such-mdfind".to_string(),
            ..EngineConfig::default()
        };
        let adapter = DarwinAdapter::new(&config);

        let status = adapter.status().await;
        assert!(!status.available);
        assert_eq!(status.platform, "darwin");
        assert!(status.message.contains("mdfind command not found"));

        let err = adapter.search(&SearchRequest::new("report")).await.unwrap_err();
        assert_eq!(err.code(), "ENGINE_NOT_FOUND");
    }
}
