//! 用 shell 脚本冒充外部搜索工具，驱动各平台适配器
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use unisearch::config::EngineConfig;
use unisearch::platform::{LinuxAdapter, WindowsAdapter};
use unisearch::{Dispatcher, Platform, SearchRequest, ValidationCode};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const ES_TEN_RECORDS: &str = r#"
case "$1" in
  -version) echo 1.1.0.27; exit 0 ;;
  -get-everything-version) echo 1.4.1.1024; exit 0 ;;
esac
i=0
while [ $i -lt 10 ]; do
  printf 'r%d.txt\tC:/data\tC:/data/r%d.txt\t%d\t2024-01-02T03:04:05\t\t32\n' $i $i $i
  i=$((i+1))
done
printf 'docs\tC:/data\tC:/data/docs\t\t\t\tD\n'
"#;

fn es_adapter(dir: &TempDir, body: &str, timeout: Duration) -> WindowsAdapter {
    let config = EngineConfig {
        es_path: write_script(dir.path(), "es.exe", body),
        command_timeout: timeout,
        ..EngineConfig::default()
    };
    WindowsAdapter::new(&config)
}

#[tokio::test]
async fn es_results_are_paginated_offset_first() {
    let dir = TempDir::new().unwrap();
    let adapter = es_adapter(&dir, ES_TEN_RECORDS, Duration::from_secs(10));

    let request = SearchRequest {
        max_results: Some(4),
        offset: Some(3),
        ..SearchRequest::new("r")
    };
    let results = adapter.search(&request).await.unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["r3.txt", "r4.txt", "r5.txt", "r6.txt"]);
    assert_eq!(results[0].size, Some(3));
    assert_eq!(results[0].full_path, "C:/data/r3.txt");
    assert_eq!(results[0].extension.as_deref(), Some("txt"));
    assert!(results[0].modified.is_some());
    assert!(results[0].created.is_none());

    // 超出范围的 offset 截到可用长度
    let request = SearchRequest {
        max_results: Some(5),
        offset: Some(9),
        ..SearchRequest::new("r")
    };
    let results = adapter.search(&request).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[1].is_folder && !results[1].is_file);
    assert_eq!(results[1].name, "docs");
}

#[tokio::test]
async fn es_file_info_matches_exact_path() {
    let dir = TempDir::new().unwrap();
    let adapter = es_adapter(&dir, ES_TEN_RECORDS, Duration::from_secs(10));

    let info = adapter.file_info("C:\\data\\r7.txt").await.unwrap();
    assert_eq!(info.name, "r7.txt");
    assert_eq!(info.size, Some(7));
    assert!(info.is_file);

    let err = adapter.file_info("C:/data/missing.txt").await.unwrap_err();
    assert_eq!(err.code(), "FILE_NOT_FOUND");

    // 清洗会删掉 `~`，不能因此报告 r7.txt
    let err = adapter.file_info("C:/data/r7.txt~").await.unwrap_err();
    assert_eq!(err.code(), "FILE_NOT_FOUND");
}

#[tokio::test]
async fn es_status_reports_versions() {
    let dir = TempDir::new().unwrap();
    let status = es_adapter(&dir, ES_TEN_RECORDS, Duration::from_secs(10)).status().await;
    assert!(status.available);
    assert_eq!(status.platform, "windows");
    assert_eq!(status.version.as_deref(), Some("1.1.0.27"));
}

#[tokio::test]
async fn es_status_without_everything_running() {
    let dir = TempDir::new().unwrap();
    let body = r#"case "$1" in -version) echo 1.1.0.27 ;; *) echo 0.0.0.0 ;; esac"#;
    let status = es_adapter(&dir, body, Duration::from_secs(10)).status().await;
    assert!(!status.available);
    assert!(status.message.contains("not running"));
}

#[tokio::test]
async fn es_no_results_diagnostic_is_an_empty_list() {
    let dir = TempDir::new().unwrap();
    let adapter = es_adapter(&dir, "echo 'Error 8: no results found' >&2\nexit 8", Duration::from_secs(10));
    let results = adapter.search(&SearchRequest::new("nothing")).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn es_ipc_error_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let adapter = es_adapter(&dir, "echo 'Error 1: Everything IPC not found' >&2\nexit 1", Duration::from_secs(10));
    let err = adapter.search(&SearchRequest::new("report")).await.unwrap_err();
    assert_eq!(err.code(), "ENGINE_FAILURE");
    assert!(err.to_string().contains("IPC not found"));
    assert!(err.to_string().contains("query=report"));
}

#[tokio::test]
async fn es_timeout_is_distinct() {
    let dir = TempDir::new().unwrap();
    let adapter = es_adapter(&dir, "sleep 5", Duration::from_millis(300));
    let err = adapter.search(&SearchRequest::new("slow")).await.unwrap_err();
    assert_eq!(err.code(), "SEARCH_TIMEOUT");
}

#[tokio::test]
async fn missing_es_exe_is_engine_not_found() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        es_path: dir.path().join("es.exe"),
        ..EngineConfig::default()
    };
    let adapter = WindowsAdapter::new(&config);

    let err = adapter.search(&SearchRequest::new("report")).await.unwrap_err();
    assert_eq!(err.code(), "ENGINE_NOT_FOUND");
    assert!(err.to_string().contains("voidtools"));

    let status = adapter.status().await;
    assert!(!status.available);
    assert!(status.message.starts_with("es.exe not found"));
}

#[tokio::test]
async fn max_concurrent_bounds_engine_processes() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        es_path: write_script(dir.path(), "es.exe", "sleep 1"),
        max_concurrent: 1,
        ..EngineConfig::default()
    };

    let adapter = WindowsAdapter::new(&config);
    let (req_a, req_b) = (SearchRequest::new("alpha"), SearchRequest::new("beta"));
    let started = Instant::now();
    let (a, b) = tokio::join!(adapter.search(&req_a), adapter.search(&req_b));
    assert!(a.unwrap().is_empty() && b.unwrap().is_empty());
    assert!(started.elapsed() >= Duration::from_millis(1900));

    // 同一个调度器上的并发调用同样排队
    let dispatcher = Dispatcher::with_platform(config, Platform::Windows);
    let started = Instant::now();
    let (a, b) = tokio::join!(dispatcher.search(&req_a), dispatcher.search(&req_b));
    assert!(a.is_ok() && b.is_ok());
    assert!(started.elapsed() >= Duration::from_millis(1900));
}

fn linux_config(dir: &TempDir, rg: Option<&str>, locate: Option<&str>) -> EngineConfig {
    let program = |name: &str, body: Option<&str>| match body {
        Some(body) => write_script(dir.path(), name, body).to_string_lossy().into_owned(),
        None => dir.path().join(name).to_string_lossy().into_owned(),
    };
    EngineConfig {
        rg_program: program("rg", rg),
        locate_program: program("locate", locate),
        search_root: dir.path().to_path_buf(),
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn locate_receives_one_argument_per_value() {
    let dir = TempDir::new().unwrap();
    let body = r#"
printf '%s\n' "$@" > "$(dirname "$0")/args.txt"
printf '/srv/data/report.txt\n/srv/data/reports/\n/srv/report.log\n'
"#;
    let adapter = LinuxAdapter::new(&linux_config(&dir, None, Some(body)));

    let request = SearchRequest {
        max_results: Some(2),
        offset: Some(1),
        ..SearchRequest::new("report; rm -rf /")
    };
    let results = adapter.search(&request).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "reports");
    assert_eq!(results[0].path, "/srv/data");
    assert!(results[0].is_folder);
    assert_eq!(results[1].full_path, "/srv/report.log");

    let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args, ["-i", "-b", "-l", "3", "--", "report rm -rf /"]);
}

#[tokio::test]
async fn locate_exit_one_without_stderr_is_no_match() {
    let dir = TempDir::new().unwrap();
    let adapter = LinuxAdapter::new(&linux_config(&dir, None, Some("exit 1")));
    assert!(adapter.search(&SearchRequest::new("nothing")).await.unwrap().is_empty());
}

#[tokio::test]
async fn locate_database_error_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let body = "echo 'locate: can not stat () `/var/lib/mlocate/mlocate.db'\"'\"': No such file or directory' >&2\nexit 1";
    let adapter = LinuxAdapter::new(&linux_config(&dir, None, Some(body)));
    let err = adapter.search(&SearchRequest::new("notes")).await.unwrap_err();
    assert_eq!(err.code(), "ENGINE_FAILURE");
    assert!(err.to_string().contains("mlocate.db"));
}

#[tokio::test]
async fn ripgrep_is_preferred_and_regex_goes_to_locate() {
    let dir = TempDir::new().unwrap();
    let rg = r#"
if [ "$1" = "--version" ]; then echo 'ripgrep 14.1.0'; exit 0; fi
printf '/home/me/notes.md\n'
"#;
    let locate = "printf '/var/log/notes.log\\n'";
    let adapter = LinuxAdapter::new(&linux_config(&dir, Some(rg), Some(locate)));

    let results = adapter.search(&SearchRequest::new("notes")).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].full_path, "/home/me/notes.md");

    let request = SearchRequest {
        regex: true,
        ..SearchRequest::new("notes")
    };
    let results = adapter.search(&request).await.unwrap();
    assert_eq!(results[0].full_path, "/var/log/notes.log");

    let status = adapter.status().await;
    assert!(status.available);
    assert_eq!(status.search_engine, "ripgrep");
    assert_eq!(status.version.as_deref(), Some("ripgrep 14.1.0"));
    assert!(status.message.contains("sorting are not supported"));
}

#[tokio::test]
async fn locate_only_status() {
    let dir = TempDir::new().unwrap();
    let locate = r#"[ "$1" = "--version" ] && echo 'plocate 1.1.19'"#;
    let status = LinuxAdapter::new(&linux_config(&dir, None, Some(locate))).status().await;
    assert!(status.available);
    assert_eq!(status.search_engine, "locate");
    assert!(status.message.starts_with("locate available. For better performance, install ripgrep."));
}

#[tokio::test]
async fn dispatcher_passes_validation_errors_through() {
    let dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::with_platform(linux_config(&dir, None, Some("exit 0")), Platform::Linux);

    let long = "a".repeat(1001);
    let err = dispatcher.search(&SearchRequest::new(long)).await.unwrap_err();
    assert_eq!(err.validation_code(), Some(ValidationCode::QueryTooLong));

    let request = SearchRequest {
        offset: Some(100_001),
        ..SearchRequest::new("a")
    };
    let err = dispatcher.search(&request).await.unwrap_err();
    assert_eq!(err.validation_code(), Some(ValidationCode::InvalidOffset));

    // 全是危险字符，清洗后为空
    let err = dispatcher.search(&SearchRequest::new(";;&&")).await.unwrap_err();
    assert_eq!(err.validation_code(), Some(ValidationCode::EmptyQuery));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn real_stat_describes_files_and_folders() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.md");
    fs::write(&file, "hello").unwrap();

    let adapter = LinuxAdapter::new(&EngineConfig::default());

    let info = adapter.file_info(&file.to_string_lossy()).await.unwrap();
    assert_eq!(info.name, "notes.md");
    assert_eq!(info.path, file.to_string_lossy());
    assert_eq!(info.size, Some(5));
    assert_eq!(info.extension.as_deref(), Some("md"));
    assert!(info.is_file && !info.is_folder);
    assert!(info.modified.is_some());

    let info = adapter.file_info(&dir.path().to_string_lossy()).await.unwrap();
    assert!(info.is_folder && !info.is_file);
    assert_eq!(info.extension, None);

    let missing = dir.path().join("absent.txt");
    let err = adapter.file_info(&missing.to_string_lossy()).await.unwrap_err();
    assert_eq!(err.code(), "FILE_NOT_FOUND");

    let backup = format!("{}~", file.to_string_lossy());
    let err = adapter.file_info(&backup).await.unwrap_err();
    assert_eq!(err.code(), "FILE_NOT_FOUND");
}
