#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memo_cloud::{AuthState, CloudStorageClient, DocumentStore};
use memo_local::{BrowserStorageClient, MobileStorageClient};
use memo_sync::{EngineProvider, Platform};
use memo_types::{
    BackendKind, Category, CloudSync, Memo, MemoId, MemoInput, MemoStats, Priority,
    StorageBackend, StorageError, StorageResult,
};

pub fn input(title: &str, category: Category) -> MemoInput {
    MemoInput::new(title, "", category, Priority::Medium)
}

/// 三种引擎各一个，均已初始化
pub async fn all_engines() -> Vec<Arc<dyn StorageBackend>> {
    let engines: Vec<Arc<dyn StorageBackend>> = vec![
        Arc::new(BrowserStorageClient::in_memory()),
        Arc::new(MobileStorageClient::in_memory()),
        Arc::new(CloudStorageClient::new(
            "contract",
            Arc::new(DocumentStore::in_memory()),
            AuthState::fixed(Some("tester".into())),
        )),
    ];
    for engine in &engines {
        engine.init().await.unwrap();
    }
    engines
}

/// 包装真实引擎，按脚本注入 init / create 失败，并统计调用次数
pub struct Scripted {
    inner: Arc<dyn StorageBackend>,
    fail_init: bool,
    fail_create_at: Option<usize>,
    creates: AtomicUsize,
    inits: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(inner: Arc<dyn StorageBackend>, inits: Arc<AtomicUsize>) -> Self {
        Self {
            inner,
            fail_init: false,
            fail_create_at: None,
            creates: AtomicUsize::new(0),
            inits,
        }
    }

    pub fn failing_init(mut self, fail: bool) -> Self {
        self.fail_init = fail;
        self
    }

    /// 第 n 次（从 1 开始）create 失败
    pub fn failing_create_at(mut self, n: Option<usize>) -> Self {
        self.fail_create_at = n;
        self
    }
}

#[async_trait]
impl StorageBackend for Scripted {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn init(&self) -> StorageResult<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        // 让并发调用者有机会在初始化过程中到达
        tokio::task::yield_now().await;
        if self.fail_init {
            return Err(StorageError::unavailable(format!(
                "{} refused to open",
                self.inner.kind()
            )));
        }
        self.inner.init().await
    }

    async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> StorageResult<Vec<Memo>> {
        self.inner.list(limit, offset).await
    }

    async fn get(&self, id: &MemoId) -> StorageResult<Memo> {
        self.inner.get(id).await
    }

    async fn create(&self, input: MemoInput) -> StorageResult<MemoId> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_at == Some(n) {
            return Err(StorageError::unavailable("write failed"));
        }
        self.inner.create(input).await
    }

    async fn update(&self, id: &MemoId, input: MemoInput) -> StorageResult<()> {
        self.inner.update(id, input).await
    }

    async fn delete(&self, id: &MemoId) -> StorageResult<()> {
        self.inner.delete(id).await
    }

    async fn search(&self, query: &str) -> StorageResult<Vec<Memo>> {
        self.inner.search(query).await
    }

    async fn by_category(&self, category: Category) -> StorageResult<Vec<Memo>> {
        self.inner.by_category(category).await
    }

    async fn stats(&self) -> StorageResult<MemoStats> {
        self.inner.stats().await
    }

    fn cloud_sync(&self) -> Option<&dyn CloudSync> {
        self.inner.cloud_sync()
    }
}

/// 可脚本化的引擎构造器
#[derive(Default)]
pub struct TestEngines {
    pub cloud_configured: bool,
    pub cloud_init_fails: bool,
    pub mobile_init_fails: bool,
    pub browser_init_fails: bool,
    pub mobile_create_fails_at: Option<usize>,
    pub constructed: AtomicUsize,
    pub inits: Arc<AtomicUsize>,
}

impl TestEngines {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    fn scripted(&self, inner: Arc<dyn StorageBackend>) -> Scripted {
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Scripted::new(inner, self.inits.clone())
    }
}

impl EngineProvider for TestEngines {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    fn cloud(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        if !self.cloud_configured {
            return Err(StorageError::unavailable("cloud project id is not configured"));
        }
        let client = CloudStorageClient::new(
            "facade",
            Arc::new(DocumentStore::in_memory()),
            AuthState::fixed(Some("tester".into())),
        );
        Ok(Arc::new(
            self.scripted(Arc::new(client))
                .failing_init(self.cloud_init_fails),
        ))
    }

    fn browser_local(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        Ok(Arc::new(
            self.scripted(Arc::new(BrowserStorageClient::in_memory()))
                .failing_init(self.browser_init_fails),
        ))
    }

    fn mobile_local(&self) -> StorageResult<Arc<dyn StorageBackend>> {
        Ok(Arc::new(
            self.scripted(Arc::new(MobileStorageClient::in_memory()))
                .failing_init(self.mobile_init_fails)
                .failing_create_at(self.mobile_create_fails_at),
        ))
    }
}
