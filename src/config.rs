use std::path::{Path, PathBuf};
use std::time::Duration;

/// 查询字符串最大长度（按字符计，trim 之后）
pub const MAX_QUERY_LENGTH: usize = 1000;

/// 单次搜索最大返回条数
pub const MAX_RESULTS: i64 = 1000;

/// 未指定时的默认返回条数
pub const DEFAULT_MAX_RESULTS: i64 = 100;

/// 分页偏移上限
pub const MAX_OFFSET: i64 = 100_000;

/// 路径最大长度
pub const MAX_PATH_LENGTH: usize = 4096;

/// 外部搜索进程的墙钟超时
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// 单次调用 stdout 缓冲上限 (50 MiB)
pub const MAX_BUFFER_SIZE: usize = 50 * 1024 * 1024;

/// 状态探测（-version 等）的超时，比搜索短得多
pub const STATUS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 同时运行的外部搜索进程数量上限
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Everything 命令行工具文件名
pub const ES_EXECUTABLE: &str = "es.exe";

/// 各平台外部搜索引擎的运行参数
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// es.exe 路径（Windows）
    pub es_path: PathBuf,
    /// Everything 实例名（如 1.5a），为空则使用默认实例
    pub es_instance: Option<String>,
    pub mdfind_program: String,
    pub rg_program: String,
    pub locate_program: String,
    pub stat_program: String,
    /// ripgrep 扫描的根目录
    pub search_root: PathBuf,
    pub command_timeout: Duration,
    pub probe_timeout: Duration,
    pub max_buffer_size: usize,
    pub max_concurrent: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            es_path: PathBuf::from(ES_EXECUTABLE),
            es_instance: None,
            mdfind_program: "mdfind".to_string(),
            rg_program: "rg".to_string(),
            locate_program: "locate".to_string(),
            stat_program: "stat".to_string(),
            search_root: PathBuf::from("/"),
            command_timeout: COMMAND_TIMEOUT,
            probe_timeout: STATUS_PROBE_TIMEOUT,
            max_buffer_size: MAX_BUFFER_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl EngineConfig {
    /// 从环境变量构建配置，未设置的项保持默认值
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 按键名取值构建配置；空白值视为未设置，非法或为 0 的数字被忽略
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self {
            es_path: get("UNISEARCH_ES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(locate_es_exe),
            ..Self::default()
        };

        config.es_instance = get("UNISEARCH_ES_INSTANCE");
        if let Some(v) = get("UNISEARCH_MDFIND") {
            config.mdfind_program = v;
        }
        if let Some(v) = get("UNISEARCH_RG") {
            config.rg_program = v;
        }
        if let Some(v) = get("UNISEARCH_LOCATE") {
            config.locate_program = v;
        }
        if let Some(v) = get("UNISEARCH_STAT") {
            config.stat_program = v;
        }
        if let Some(v) = get("UNISEARCH_SEARCH_ROOT") {
            config.search_root = PathBuf::from(v);
        }
        if let Some(secs) = get("UNISEARCH_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            if secs > 0 {
                config.command_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(n) = get("UNISEARCH_MAX_CONCURRENT").and_then(|v| v.parse::<usize>().ok()) {
            if n > 0 {
                config.max_concurrent = n;
            }
        }

        config
    }
}

pub static GLOBAL_CONFIG: once_cell::sync::Lazy<EngineConfig> =
    once_cell::sync::Lazy::new(EngineConfig::from_env);

/// es.exe 查找顺序：程序目录 bin/ lib/ 同级 > 当前目录 bin/ > PATH（环境变量覆盖在调用方处理）
fn locate_es_exe() -> PathBuf {
    let exe_path = std::env::current_exe().ok();
    let exe_dir = exe_path.as_deref().and_then(|p| p.parent());
    let cwd = std::env::current_dir().ok();

    es_exe_candidates(exe_dir, cwd.as_deref())
        .into_iter()
        .find(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(ES_EXECUTABLE))
}

fn es_exe_candidates(exe_dir: Option<&Path>, cwd: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(exe_dir) = exe_dir {
        candidates.push(exe_dir.join("bin").join(ES_EXECUTABLE));
        candidates.push(exe_dir.join("lib").join(ES_EXECUTABLE));
        candidates.push(exe_dir.join(ES_EXECUTABLE));
    }
    if let Some(cwd) = cwd {
        candidates.push(cwd.join("bin").join(ES_EXECUTABLE));
    }
    candidates
}
