use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationCode, ValidationError};

/// 排序字段（仅 Everything 支持，其它平台忽略并在状态信息中说明）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Path,
    Size,
    Extension,
    DateModified,
    DateCreated,
    Attributes,
    RunCount,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Path => "path",
            Self::Size => "size",
            Self::Extension => "extension",
            Self::DateModified => "date_modified",
            Self::DateCreated => "date_created",
            Self::Attributes => "attributes",
            Self::RunCount => "run_count",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "path" => Ok(Self::Path),
            "size" => Ok(Self::Size),
            "extension" => Ok(Self::Extension),
            "date_modified" => Ok(Self::DateModified),
            "date_created" => Ok(Self::DateCreated),
            "attributes" => Ok(Self::Attributes),
            "run_count" => Ok(Self::RunCount),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(Self::Ascending),
            "descending" => Ok(Self::Descending),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// 调用方传入的原始搜索请求，尚未校验
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
    pub match_path: bool,
    pub match_case: bool,
    pub match_whole_word: bool,
    pub regex: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// 从 JSON 参数（camelCase）构建请求；类型不符一律 INVALID_TYPE
    pub fn from_json(args: &Value) -> Result<Self, ValidationError> {
        let query = crate::validation::string_argument(args.get("query"), "Query")?.to_string();

        let sort_by = match args.get("sortBy") {
            Some(Value::String(s)) => Some(s.parse().unwrap_or(SortField::Name)),
            Some(Value::Null) | None => None,
            Some(_) => return Err(invalid_type("sortBy must be a string")),
        };
        let sort_order = match args.get("sortOrder") {
            Some(Value::String(s)) => Some(s.parse().unwrap_or_default()),
            Some(Value::Null) | None => None,
            Some(_) => return Err(invalid_type("sortOrder must be a string")),
        };

        Ok(Self {
            query,
            max_results: json_integer(args, "maxResults", ValidationCode::InvalidMaxResults)?,
            offset: json_integer(args, "offset", ValidationCode::InvalidOffset)?,
            sort_by,
            sort_order,
            match_path: json_flag(args, "matchPath")?,
            match_case: json_flag(args, "matchCase")?,
            match_whole_word: json_flag(args, "matchWholeWord")?,
            regex: json_flag(args, "regex")?,
        })
    }
}

fn invalid_type(message: &str) -> ValidationError {
    ValidationError::new(ValidationCode::InvalidType, message)
}

// 10.0 这类整值浮点按整数接受；1.5 或超出 i64 的数字按越界处理，非数字按类型错误
fn json_integer(args: &Value, key: &str, range_code: ValidationCode) -> Result<Option<i64>, ValidationError> {
    match args.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(Value::Number(n)) => match n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)) {
            Some(v) => Ok(Some(v)),
            None => Err(ValidationError::new(range_code, format!("{key} must be an integer"))),
        },
        Some(_) => Err(invalid_type(&format!("{key} must be a number"))),
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    // 2^63 本身已超出 i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (v.is_finite() && v.fract() == 0.0 && v >= -LIMIT && v < LIMIT).then_some(v as i64)
}

fn json_flag(args: &Value, key: &str) -> Result<bool, ValidationError> {
    match args.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Null) | None => Ok(false),
        Some(_) => Err(invalid_type(&format!("{key} must be a boolean"))),
    }
}

/// 校验通过的搜索参数，limit/offset 已在范围内
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub query: String,
    pub max_results: usize,
    pub offset: usize,
    pub sort_by: Option<SortField>,
    pub sort_order: SortOrder,
    pub match_path: bool,
    pub match_case: bool,
    pub match_whole_word: bool,
    pub regex: bool,
}

/// 统一的搜索结果条目
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub name: String,
    pub path: String,
    pub full_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub is_folder: bool,
    pub is_file: bool,
}

impl SearchResult {
    /// isFile / isFolder 恰有一个为真
    pub fn new(name: String, path: String, full_path: String, is_folder: bool) -> Self {
        let extension = if is_folder { None } else { extension_of(&name) };
        Self {
            name,
            path,
            full_path,
            size: None,
            modified: None,
            created: None,
            attributes: None,
            extension,
            is_folder,
            is_file: !is_folder,
        }
    }
}

/// 单个文件/目录的元数据
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub is_folder: bool,
    pub is_file: bool,
}

impl From<SearchResult> for FileInfo {
    fn from(r: SearchResult) -> Self {
        Self {
            path: r.full_path,
            name: r.name,
            size: r.size,
            created: r.created,
            modified: r.modified,
            accessed: None,
            attributes: r.attributes,
            extension: r.extension,
            is_folder: r.is_folder,
            is_file: r.is_file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    pub platform: String,
    pub search_engine: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub platform: String,
    pub search_engine: String,
    pub is_primary: bool,
}

/// 取最后一个点之后的部分作为扩展名，空串不算
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
}
