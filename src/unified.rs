//! 统一入口：按当前操作系统路由到对应平台适配器

use tracing::debug;

use crate::config::{EngineConfig, GLOBAL_CONFIG};
use crate::error::{Error, Result};
use crate::platform::{darwin, linux, windows, Adapter, Platform};
use crate::process::{engine_slots, EngineSlots, GLOBAL_ENGINE_SLOTS};
use crate::types::{FileInfo, PlatformInfo, PlatformStatus, SearchRequest, SearchResult};

/// 除并发名额外不保存调用间状态；平台默认每次调用重新检测
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: EngineConfig,
    platform: Option<Platform>,
    slots: EngineSlots,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self {
            config: GLOBAL_CONFIG.clone(),
            platform: None,
            slots: GLOBAL_ENGINE_SLOTS.clone(),
        }
    }
}

impl Dispatcher {
    pub fn new(config: EngineConfig) -> Self {
        let slots = engine_slots(config.max_concurrent);
        Self {
            config,
            platform: None,
            slots,
        }
    }

    /// 固定平台，不再检测
    pub fn with_platform(config: EngineConfig, platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Self::new(config)
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform.clone().unwrap_or_else(Platform::current)
    }

    fn adapter(&self) -> Result<Adapter> {
        let platform = self.platform();
        debug!(platform = %platform, "选择平台适配器");
        Adapter::for_platform(&platform, &self.config, &self.slots)
            .ok_or_else(|| Error::UnsupportedPlatform(platform.to_string()))
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        self.adapter()?.search(request).await
    }

    pub async fn file_info(&self, path: &str) -> Result<FileInfo> {
        self.adapter()?.file_info(path).await
    }

    /// 从不返回错误；不支持的平台给出不可用状态
    pub async fn status(&self) -> PlatformStatus {
        match self.adapter() {
            Ok(adapter) => adapter.status().await,
            Err(e) => PlatformStatus {
                platform: self.platform().to_string(),
                search_engine: "none".to_string(),
                available: false,
                version: None,
                message: e.to_string(),
            },
        }
    }

    pub fn platform_info(&self) -> PlatformInfo {
        let platform = self.platform();
        let (search_engine, is_primary) = match platform {
            Platform::Windows => (windows::ENGINE_NAME, true),
            Platform::Darwin => (darwin::ENGINE_NAME, false),
            Platform::Linux => (linux::ENGINE_NAME, false),
            Platform::Unsupported(_) => ("none", false),
        };
        PlatformInfo {
            platform: platform.to_string(),
            search_engine: search_engine.to_string(),
            is_primary,
        }
    }
}

/// 用全局配置搜索
pub async fn search_files(request: &SearchRequest) -> Result<Vec<SearchResult>> {
    Dispatcher::default().search(request).await
}

pub async fn get_file_info(path: &str) -> Result<FileInfo> {
    Dispatcher::default().file_info(path).await
}

pub async fn get_status() -> PlatformStatus {
    Dispatcher::default().status().await
}

pub fn platform_info() -> PlatformInfo {
    Dispatcher::default().platform_info()
}
