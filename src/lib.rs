//! 跨平台文件搜索：Windows 用 Everything (es.exe)，macOS 用 Spotlight (mdfind)，Linux 用 ripgrep / locate

pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod types;
pub mod unified;
pub mod validation;

pub use error::{Error, Result, ValidationCode, ValidationError};
pub use platform::Platform;
pub use types::{FileInfo, PlatformInfo, PlatformStatus, SearchOptions, SearchRequest, SearchResult, SortField, SortOrder};
pub use unified::{get_file_info, get_status, platform_info, search_files, Dispatcher};
