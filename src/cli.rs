use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{debug, warn};

use unisearch::error::Error;
use unisearch::types::{SearchRequest, SortField, SortOrder};
use unisearch::validation::string_argument;
use unisearch::{Dispatcher, ValidationCode, ValidationError};

pub const TOOL_SEARCH: &str = "search_files";
pub const TOOL_FILE_INFO: &str = "get_file_info";
pub const TOOL_STATUS: &str = "check_status";

#[derive(Parser, Debug)]
#[command(author, version, about = "跨平台文件搜索（Everything / Spotlight / ripgrep / locate），输出 JSON", long_about = None)]
pub struct CliArgs {
    /// 输出调试日志（写到 stderr）
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 按文件名/路径搜索
    Search(SearchArgs),
    /// 查询单个文件或目录的元数据
    Info {
        path: String,
    },
    /// 检查当前平台搜索引擎是否可用
    Status,
    /// 以工具名 + JSON 参数调用（search_files / get_file_info / check_status）
    Call {
        tool: String,
        /// camelCase JSON 对象，如 {"query":"report","maxResults":10}
        arguments: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// 搜索关键词
    pub query: String,

    /// 最大结果数（默认 100，上限 1000）
    #[arg(short = 'm', long)]
    pub max_results: Option<i64>,

    /// 跳过前 N 条
    #[arg(short, long)]
    pub offset: Option<i64>,

    /// 排序字段（仅 Everything 支持）
    #[arg(long)]
    pub sort_by: Option<SortField>,

    #[arg(long)]
    pub sort_order: Option<SortOrder>,

    /// 匹配完整路径而不只是文件名
    #[arg(long)]
    pub match_path: bool,

    /// 区分大小写
    #[arg(long)]
    pub match_case: bool,

    /// 全词匹配
    #[arg(long)]
    pub whole_word: bool,

    /// 正则表达式
    #[arg(long)]
    pub regex: bool,
}

impl SearchArgs {
    fn to_arguments(&self) -> Value {
        json!({
            "query": self.query,
            "maxResults": self.max_results,
            "offset": self.offset,
            "sortBy": self.sort_by,
            "sortOrder": self.sort_order,
            "matchPath": self.match_path,
            "matchCase": self.match_case,
            "matchWholeWord": self.whole_word,
            "regex": self.regex,
        })
    }
}

// CLI入口，返回是否成功（决定退出码）
pub async fn run_cli(args: CliArgs) -> anyhow::Result<bool> {
    let (tool, arguments) = match args.command {
        Command::Search(search) => (TOOL_SEARCH.to_string(), search.to_arguments()),
        Command::Info { path } => (TOOL_FILE_INFO.to_string(), json!({ "path": path })),
        Command::Status => (TOOL_STATUS.to_string(), json!({})),
        Command::Call { tool, arguments } => match parse_arguments(arguments.as_deref()) {
            Ok(arguments) => (tool, arguments),
            Err(e) => {
                let output = error_envelope(&tool, &e.message, e.code.as_str());
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(false);
            }
        },
    };

    let dispatcher = Dispatcher::default();
    let output = execute_tool(&dispatcher, &tool, &arguments).await;
    let success = output["success"] == json!(true);

    // 输出JSON（AI易解析）
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(success)
}

fn parse_arguments(raw: Option<&str>) -> Result<Value, ValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(json!({}));
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ValidationError::new(ValidationCode::InvalidType, "Arguments must be a JSON object")),
        Err(e) => Err(ValidationError::new(
            ValidationCode::InvalidType,
            format!("Arguments are not valid JSON: {e}"),
        )),
    }
}

/// 按工具名分发；失败一律转成错误信封，不向上抛
pub async fn execute_tool(dispatcher: &Dispatcher, tool: &str, arguments: &Value) -> Value {
    debug!(tool, "执行工具调用");
    let outcome: Result<Value, Error> = match tool {
        TOOL_SEARCH => match SearchRequest::from_json(arguments) {
            Ok(request) => dispatcher.search(&request).await.map(|results| {
                json!({
                    "success": true,
                    "count": results.len(),
                    "results": results,
                })
            }),
            Err(e) => Err(e.into()),
        },
        TOOL_FILE_INFO => match string_argument(arguments.get("path"), "Path") {
            Ok(path) => dispatcher
                .file_info(path)
                .await
                .map(|info| json!({ "success": true, "info": info })),
            Err(e) => Err(e.into()),
        },
        TOOL_STATUS => Ok(json!({
            "success": true,
            "status": dispatcher.status().await,
            "platform": dispatcher.platform_info(),
        })),
        other => return error_envelope(other, &format!("Unknown tool: {other}"), "UNKNOWN_TOOL"),
    };

    match outcome {
        Ok(value) => value,
        Err(e) => {
            warn!(tool, code = e.code(), "工具调用失败: {}", e);
            error_envelope(tool, &e.to_string(), e.code())
        }
    }
}

fn error_envelope(tool: &str, message: &str, code: &str) -> Value {
    json!({
        "success": false,
        "error": message,
        "errorCode": code,
        "tool": tool,
    })
}
