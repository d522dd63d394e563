//! 输入清洗与校验
//!
//! 校验（validate_*）只判定接受/拒绝，不改写；清洗（sanitize_argument）只改写，不拒绝。
//! 外部命令一律以参数数组方式启动，清洗是纵深防御的一层。

use serde_json::Value;
use tracing::debug;

use crate::config::{DEFAULT_MAX_RESULTS, MAX_OFFSET, MAX_PATH_LENGTH, MAX_QUERY_LENGTH, MAX_RESULTS};
use crate::error::{ValidationCode, ValidationError};
use crate::types::{SearchOptions, SearchRequest};

/// 可用于命令串联/替换的 shell 元字符
pub const SHELL_METACHARACTERS: [char; 7] = [';', '&', '|', '$', '`', '(', ')'];

pub fn is_shell_metacharacter(c: char) -> bool {
    SHELL_METACHARACTERS.contains(&c)
}

/// 从 JSON 参数中取字符串；缺省/null 视为空串，其余类型为 INVALID_TYPE
pub fn string_argument<'a>(value: Option<&'a Value>, what: &str) -> Result<&'a str, ValidationError> {
    match value {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(Value::Null) | None => Ok(""),
        Some(_) => Err(reject(ValidationCode::InvalidType, format!("{what} must be a string"))),
    }
}

/// 清洗一个将要传给外部工具的参数。
///
/// 单趟顺序固定：删除元字符 → 删除 `..` → `\` 转 `/` → 删除 `~` → 合并连续 `/`
/// → 去掉一个前导 `/` → trim。单趟可能重新拼出 `..`（如 `.~.`），因此重复到不动点，
/// 保证幂等。
pub fn sanitize_argument(raw: &str) -> String {
    let mut current = sanitize_once(raw);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !is_shell_metacharacter(*c)).collect();
    let stripped = stripped.replace("..", "").replace('\\', "/").replace('~', "");

    let mut collapsed = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        if c == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(c);
    }

    let relative = collapsed.strip_prefix('/').unwrap_or(&collapsed);
    relative.trim().to_string()
}

pub fn validate_search_query(raw: &str) -> Result<(), ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(reject(ValidationCode::EmptyQuery, "Query cannot be empty"));
    }

    if trimmed.chars().count() > MAX_QUERY_LENGTH {
        return Err(reject(
            ValidationCode::QueryTooLong,
            format!("Query exceeds maximum length of {MAX_QUERY_LENGTH} characters"),
        ));
    }

    Ok(())
}

/// 路径是查询标识符，必须本身就干净：任何可疑内容直接拒绝
pub fn validate_path(raw: &str) -> Result<(), ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(reject(ValidationCode::EmptyPath, "Path cannot be empty"));
    }

    if trimmed.chars().count() > MAX_PATH_LENGTH {
        return Err(reject(
            ValidationCode::PathTooLong,
            format!("Path exceeds maximum length of {MAX_PATH_LENGTH} characters"),
        ));
    }

    if trimmed.contains("..") {
        return Err(reject(ValidationCode::PathTraversal, "Path traversal detected"));
    }

    if trimmed.starts_with('~') {
        return Err(reject(ValidationCode::HomePathNotAllowed, "Home directory paths are not allowed"));
    }

    if trimmed.chars().any(is_shell_metacharacter) {
        return Err(reject(ValidationCode::InvalidCharacters, "Invalid characters in path"));
    }

    Ok(())
}

/// 补默认值并检查 limit/offset 范围，返回可交给适配器的参数
pub fn validate_search_options(request: &SearchRequest) -> Result<SearchOptions, ValidationError> {
    let query = request.query.trim().to_string();
    validate_search_query(&query)?;

    let max_results = request.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    if !(1..=MAX_RESULTS).contains(&max_results) {
        return Err(reject(
            ValidationCode::InvalidMaxResults,
            format!("maxResults must be between 1 and {MAX_RESULTS}"),
        ));
    }

    let offset = request.offset.unwrap_or(0);
    if !(0..=MAX_OFFSET).contains(&offset) {
        return Err(reject(
            ValidationCode::InvalidOffset,
            format!("offset must be between 0 and {MAX_OFFSET}"),
        ));
    }

    Ok(SearchOptions {
        query,
        // 上面已限定范围，转换不会丢失
        max_results: max_results as usize,
        offset: offset as usize,
        sort_by: request.sort_by,
        sort_order: request.sort_order.unwrap_or_default(),
        match_path: request.match_path,
        match_case: request.match_case,
        match_whole_word: request.match_whole_word,
        regex: request.regex,
    })
}

fn reject(code: ValidationCode, message: impl Into<String>) -> ValidationError {
    let err = ValidationError::new(code, message);
    debug!(code = %err.code, "输入被拒绝: {}", err.message);
    err
}
