//! Storage facade
//!
//! Owns the single active engine for the lifetime of the process. The first
//! operation (or an explicit [`StorageFacade::initialize`]) runs the
//! select → init → migrate sequence exactly once; callers racing that first
//! call all wait on the same attempt and observe the same outcome.

use std::sync::Arc;
use tokio::sync::OnceCell;

use memo_types::{
    BackendKind, Category, Memo, MemoId, MemoInput, MemoStats, StorageBackend, StorageError,
    StorageResult, Subscription,
};

use crate::engines::EngineProvider;
use crate::migrate::LegacyMigrator;

/// 门面状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeState {
    Uninitialized,
    Ready(BackendKind),
    /// 首选引擎与回退引擎都初始化失败，之后的操作都返回 Unavailable
    Failed,
}

type Outcome = Result<Arc<dyn StorageBackend>, StorageError>;

pub struct StorageFacade {
    provider: Arc<dyn EngineProvider>,
    migrator: LegacyMigrator,
    active: OnceCell<Outcome>,
}

impl StorageFacade {
    pub fn new(provider: Arc<dyn EngineProvider>, migrator: LegacyMigrator) -> Self {
        Self {
            provider,
            migrator,
            active: OnceCell::new(),
        }
    }

    pub fn state(&self) -> FacadeState {
        match self.active.get() {
            None => FacadeState::Uninitialized,
            Some(Ok(engine)) => FacadeState::Ready(engine.kind()),
            Some(Err(_)) => FacadeState::Failed,
        }
    }

    /// 选择并初始化引擎，返回最终使用的引擎种类
    pub async fn initialize(&self) -> StorageResult<BackendKind> {
        Ok(self.engine().await?.kind())
    }

    async fn engine(&self) -> StorageResult<&Arc<dyn StorageBackend>> {
        self.active
            .get_or_init(|| self.bring_up())
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    async fn bring_up(&self) -> Outcome {
        let engine = match self.select_and_init().await {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!("Preferred storage failed to initialize, falling back to browser-local: {}", e);
                match self.fallback().await {
                    Ok(engine) => engine,
                    Err(e) => {
                        tracing::error!("Fallback storage failed to initialize: {}", e);
                        return Err(match e {
                            StorageError::Unavailable(_) => e,
                            other => StorageError::unavailable(other),
                        });
                    }
                }
            }
        };
        tracing::info!("Using {} storage", engine.kind());

        // 迁移失败不影响启动，旧数据保留到下次重试
        if let Err(e) = self.migrator.migrate(engine.as_ref()).await {
            tracing::warn!("Legacy migration failed: {}", e);
        }
        Ok(engine)
    }

    /// 优先云端；云端无法构造时使用平台对应的本地引擎
    async fn select_and_init(&self) -> Outcome {
        let engine = match self.provider.cloud() {
            Ok(engine) => engine,
            Err(e) => {
                tracing::info!("Cloud storage not available ({}), using local storage", e);
                self.provider.platform_local()?
            }
        };
        engine.init().await?;
        Ok(engine)
    }

    async fn fallback(&self) -> Outcome {
        let engine = self.provider.browser_local()?;
        engine.init().await?;
        Ok(engine)
    }

    pub async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> StorageResult<Vec<Memo>> {
        self.engine().await?.list(limit, offset).await
    }

    pub async fn get(&self, id: &MemoId) -> StorageResult<Memo> {
        self.engine().await?.get(id).await
    }

    pub async fn create(&self, input: MemoInput) -> StorageResult<MemoId> {
        self.engine().await?.create(input).await
    }

    pub async fn update(&self, id: &MemoId, input: MemoInput) -> StorageResult<()> {
        self.engine().await?.update(id, input).await
    }

    pub async fn delete(&self, id: &MemoId) -> StorageResult<()> {
        self.engine().await?.delete(id).await
    }

    pub async fn search(&self, query: &str) -> StorageResult<Vec<Memo>> {
        self.engine().await?.search(query).await
    }

    pub async fn by_category(&self, category: Category) -> StorageResult<Vec<Memo>> {
        self.engine().await?.by_category(category).await
    }

    pub async fn stats(&self) -> StorageResult<MemoStats> {
        self.engine().await?.stats().await
    }

    /// 订阅变更；当前引擎不支持时返回 None
    pub async fn subscribe(&self) -> StorageResult<Option<Subscription>> {
        match self.engine().await?.cloud_sync() {
            Some(sync) => sync.subscribe().await.map(Some),
            None => Ok(None),
        }
    }

    /// 返回当前引擎是否支持在线/离线切换
    pub async fn go_offline(&self) -> StorageResult<bool> {
        match self.engine().await?.cloud_sync() {
            Some(sync) => sync.go_offline().await.map(|_| true),
            None => Ok(false),
        }
    }

    pub async fn go_online(&self) -> StorageResult<bool> {
        match self.engine().await?.cloud_sync() {
            Some(sync) => sync.go_online().await.map(|_| true),
            None => Ok(false),
        }
    }
}
