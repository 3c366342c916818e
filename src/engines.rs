//! Engine construction
//!
//! The facade never decides how an engine is built; it asks an
//! [`EngineProvider`] for one of the three variants. [`ConfiguredEngines`]
//! is the provider used by the binary, tests inject their own.

use std::path::PathBuf;
use std::sync::Arc;

use memo_cloud::{AuthState, CloudStorageClient, DocumentStore};
use memo_local::{BrowserStorageClient, MobileStorageClient};
use memo_types::{StorageBackend, StorageError, StorageResult};

use crate::config::{AppConfig, CloudConfig};

/// 运行平台：决定本地引擎使用哪一种
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// 有浏览器风格的存储介质
    Browser,
    Native,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Platform::Browser
        } else {
            Platform::Native
        }
    }
}

/// 引擎构造器
///
/// 构造只负责创建实例，不打开存储；失败表示配置错误
pub trait EngineProvider: Send + Sync {
    fn platform(&self) -> Platform;

    fn cloud(&self) -> StorageResult<Arc<dyn StorageBackend>>;

    fn browser_local(&self) -> StorageResult<Arc<dyn StorageBackend>>;

    fn mobile_local(&self) -> StorageResult<Arc<dyn StorageBackend>>;

    /// 当前平台对应的本地引擎
    fn platform_local(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        match self.platform() {
            Platform::Browser => self.browser_local(),
            Platform::Native => self.mobile_local(),
        }
    }
}

/// 按应用配置构造引擎，所有文件都位于数据目录下
pub struct ConfiguredEngines {
    data_dir: PathBuf,
    platform: Platform,
    cloud: CloudConfig,
    auth: AuthState,
}

impl ConfiguredEngines {
    pub fn new(config: &AppConfig, auth: AuthState) -> Self {
        Self {
            data_dir: config.data_dir(),
            platform: config.platform.resolve(),
            cloud: config.cloud.clone(),
            auth,
        }
    }

    pub fn browser_db_path(&self) -> PathBuf {
        self.data_dir.join("browser").join("memo_db.redb")
    }

    pub fn mobile_db_path(&self) -> PathBuf {
        self.data_dir.join("mobile").join("memos.db")
    }

    pub fn cloud_documents_path(&self) -> PathBuf {
        self.data_dir.join("cloud").join("documents.redb")
    }
}

impl EngineProvider for ConfiguredEngines {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn cloud(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        if !self.cloud.enabled {
            return Err(StorageError::unavailable("cloud sync is disabled"));
        }
        let project = match self.cloud.project.as_deref().map(str::trim) {
            Some(project) if !project.is_empty() => project,
            _ => return Err(StorageError::unavailable("cloud project id is not configured")),
        };

        let store = DocumentStore::new(Some(self.cloud_documents_path()));
        Ok(Arc::new(CloudStorageClient::new(
            project,
            Arc::new(store),
            self.auth.clone(),
        )))
    }

    fn browser_local(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        Ok(Arc::new(BrowserStorageClient::new(self.browser_db_path())))
    }

    fn mobile_local(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        Ok(Arc::new(MobileStorageClient::new(self.mobile_db_path())))
    }
}
