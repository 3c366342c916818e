use anyhow::{Context, Result};
use std::sync::Arc;

use memo_cloud::AuthState;
use memo_sync::config::{AppConfig, ConfigScope};
use memo_sync::{ConfiguredEngines, FileLegacyStore, LegacyMigrator, StorageFacade};
use memo_types::BackendKind;

use crate::ui::Output;

/// 命令行指定的作用域和用户
pub struct Target {
    pub scope: ConfigScope,
    pub user: Option<String>,
}

/// 一次命令执行期间使用的存储
pub struct Session {
    pub facade: StorageFacade,
    pub kind: BackendKind,
    pub scope: &'static str,
}

impl Session {
    /// 加载配置并初始化存储（包括旧数据迁移）
    pub async fn open(target: &Target) -> Result<Self> {
        let config = AppConfig::load(target.scope)?;
        config.ensure_dirs()?;

        let user = target.user.clone().or_else(|| config.cloud.user.clone());
        let engines = ConfiguredEngines::new(&config, AuthState::fixed(user));
        let legacy = FileLegacyStore::new(config.legacy_dir());

        let facade = StorageFacade::new(Arc::new(engines), LegacyMigrator::new(Arc::new(legacy)));
        let kind = facade
            .initialize()
            .await
            .context("Failed to open memo storage")?;

        Ok(Self {
            facade,
            kind,
            scope: AppConfig::scope_name(target.scope),
        })
    }

    /// 显示当前存储及记录数
    pub async fn show_info(&self, output: &Output) -> Result<usize> {
        let total = self.facade.stats().await?.total;
        output.storage_info(self.kind, total);
        Ok(total)
    }
}
