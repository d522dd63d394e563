//! 错误类型：输入校验失败与外部搜索引擎失败严格区分

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// 校验失败的稳定错误码，调用方按它分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationCode {
    EmptyQuery,
    QueryTooLong,
    EmptyPath,
    PathTooLong,
    PathTraversal,
    HomePathNotAllowed,
    InvalidCharacters,
    InvalidType,
    InvalidMaxResults,
    InvalidOffset,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::QueryTooLong => "QUERY_TOO_LONG",
            Self::EmptyPath => "EMPTY_PATH",
            Self::PathTooLong => "PATH_TOO_LONG",
            Self::PathTraversal => "PATH_TRAVERSAL",
            Self::HomePathNotAllowed => "HOME_PATH_NOT_ALLOWED",
            Self::InvalidCharacters => "INVALID_CHARACTERS",
            Self::InvalidType => "INVALID_TYPE",
            Self::InvalidMaxResults => "INVALID_MAX_RESULTS",
            Self::InvalidOffset => "INVALID_OFFSET",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 客户端输入被拒绝
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// 原样透传，不再包装
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{engine} not found. {guidance}")]
    EngineUnavailable { engine: String, guidance: String },

    #[error("{operation} timed out after {}s. Please try a narrower query.", .timeout.as_secs())]
    EngineTimeout { operation: String, timeout: Duration },

    #[error("{operation} failed: {detail}")]
    EngineFailure { operation: String, detail: String },

    #[error("File not found or inaccessible: {path}")]
    NotFound { path: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    pub fn unavailable(engine: impl Into<String>, guidance: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            guidance: guidance.into(),
        }
    }

    pub fn failure(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::EngineFailure {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// 机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code.as_str(),
            Self::EngineUnavailable { .. } => "ENGINE_NOT_FOUND",
            Self::EngineTimeout { .. } => "SEARCH_TIMEOUT",
            Self::EngineFailure { .. } => "ENGINE_FAILURE",
            Self::NotFound { .. } => "FILE_NOT_FOUND",
            Self::UnsupportedPlatform(_) => "UNSUPPORTED_PLATFORM",
        }
    }

    pub fn validation_code(&self) -> Option<ValidationCode> {
        match self {
            Self::Validation(e) => Some(e.code),
            _ => None,
        }
    }

    /// 给引擎层错误补上上下文（哪个操作、哪个查询/路径），分类保持不变
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::EngineTimeout { operation, timeout } => Self::EngineTimeout {
                operation: format!("{operation} ({context})"),
                timeout,
            },
            Self::EngineFailure { operation, detail } => Self::EngineFailure {
                operation: format!("{operation} ({context})"),
                detail,
            },
            other => other,
        }
    }
}
