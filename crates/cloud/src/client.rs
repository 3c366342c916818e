use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use memo_types::{
    query, BackendKind, Category, Clock, CloudSync, Memo, MemoId, MemoInput, MemoStats,
    StorageBackend, StorageError, StorageResult, Subscription, SystemClock,
};

use crate::auth::AuthState;
use crate::document::{Document, DocumentStore, StoredDocument};

/// 云端文档库存储（按用户隔离）
///
/// 构造不会因为未登录而失败；未登录时每个操作返回 Unauthenticated
pub struct CloudStorageClient {
    project: String,
    store: Arc<DocumentStore>,
    auth: AuthState,
    clock: Arc<dyn Clock>,
}

impl CloudStorageClient {
    pub fn new(project: impl Into<String>, store: Arc<DocumentStore>, auth: AuthState) -> Self {
        Self {
            project: project.into(),
            store,
            auth,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// 当前用户的集合路径
    fn collection(&self) -> StorageResult<String> {
        let user = self
            .auth
            .current_user()
            .ok_or(StorageError::Unauthenticated)?;
        Ok(format!("users/{}/memos", user))
    }

    async fn snapshot(&self) -> StorageResult<Vec<Memo>> {
        let path = self.collection()?;
        let docs = self.store.query(&path).await?;
        Ok(ordered(&docs))
    }
}

/// 文档转为 Memo：枚举字符串校验，缺失的 tags 视为空
fn to_memo(doc: &StoredDocument) -> StorageResult<Memo> {
    let fields = &doc.fields;
    Ok(Memo {
        id: MemoId::Remote(doc.id.clone()),
        title: fields.title.clone(),
        content: fields.content.clone(),
        category: fields.category.parse()?,
        priority: fields.priority.parse()?,
        tags: fields.tags.clone().unwrap_or_default(),
        created_at: fields.created_at,
        updated_at: fields.updated_at.max(fields.created_at),
    })
}

fn readable(doc: &StoredDocument) -> Option<Memo> {
    match to_memo(doc) {
        Ok(memo) => Some(memo),
        Err(e) => {
            tracing::warn!("Skipping malformed document {}: {}", doc.id, e);
            None
        }
    }
}

fn ordered(docs: &[StoredDocument]) -> Vec<Memo> {
    query::order_recent_first(docs.iter().filter_map(readable).collect())
}

fn to_fields(input: MemoInput, created_at: chrono::DateTime<chrono::Utc>) -> Document {
    Document {
        title: input.title,
        content: input.content,
        category: input.category.as_str().to_string(),
        priority: input.priority.as_str().to_string(),
        tags: Some(input.tags),
        created_at,
        updated_at: created_at,
    }
}

#[async_trait]
impl StorageBackend for CloudStorageClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    async fn init(&self) -> StorageResult<()> {
        self.store.enable_network().await?;
        tracing::info!("Connected to document store for project {}", self.project);
        Ok(())
    }

    async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> StorageResult<Vec<Memo>> {
        Ok(query::paginate(self.snapshot().await?, limit, offset))
    }

    async fn get(&self, id: &MemoId) -> StorageResult<Memo> {
        let path = self.collection()?;
        let doc_id = id.to_string();

        let fields = self
            .store
            .get(&path, &doc_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        to_memo(&StoredDocument { id: doc_id, fields })
    }

    async fn create(&self, input: MemoInput) -> StorageResult<MemoId> {
        let path = self.collection()?;
        let id = self
            .store
            .add(&path, to_fields(input, self.clock.now()))
            .await?;

        tracing::debug!("Created document {} in {}", id, path);
        Ok(MemoId::Remote(id))
    }

    async fn update(&self, id: &MemoId, input: MemoInput) -> StorageResult<()> {
        let path = self.collection()?;
        let now = self.clock.now();

        let found = self
            .store
            .update(&path, &id.to_string(), move |doc| {
                let created_at = doc.created_at;
                *doc = to_fields(input, created_at);
                doc.updated_at = now.max(created_at);
            })
            .await?;

        if !found {
            return Err(StorageError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, id: &MemoId) -> StorageResult<()> {
        let path = self.collection()?;
        self.store.delete(&path, &id.to_string()).await?;
        Ok(())
    }

    async fn search(&self, query_text: &str) -> StorageResult<Vec<Memo>> {
        // 文档库没有全文检索，取全集后过滤
        Ok(query::filter_search(self.snapshot().await?, query_text))
    }

    async fn by_category(&self, category: Category) -> StorageResult<Vec<Memo>> {
        Ok(query::filter_category(self.snapshot().await?, category))
    }

    async fn stats(&self) -> StorageResult<MemoStats> {
        let memos = self.snapshot().await?;
        Ok(MemoStats::from_memos(&memos))
    }

    fn cloud_sync(&self) -> Option<&dyn CloudSync> {
        Some(self)
    }
}

#[async_trait]
impl CloudSync for CloudStorageClient {
    async fn subscribe(&self) -> StorageResult<Subscription> {
        let path = self.collection()?;
        let (tx, rx) = mpsc::unbounded_channel();

        // 订阅方已离开时发送失败，直接丢弃
        let listener_id = self
            .store
            .listen(
                &path,
                Box::new(move |docs: &[StoredDocument]| {
                    let _ = tx.send(ordered(docs));
                }),
            )
            .await?;

        tracing::debug!("Subscribed to {} (listener {})", path, listener_id);
        let watcher = self.store.watch_remote();
        let store = Arc::clone(&self.store);
        Ok(Subscription::new(rx, move || {
            watcher.abort();
            store.unlisten(listener_id);
        }))
    }

    async fn go_offline(&self) -> StorageResult<()> {
        self.store.disable_network().await;
        tracing::info!("Document store offline, writes stay in local cache");
        Ok(())
    }

    /// 推送离线写入，并拉取离线期间其他客户端的修改
    async fn go_online(&self) -> StorageResult<()> {
        self.store.enable_network().await?;
        tracing::info!("Document store online");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth_channel;
    use memo_types::Priority;

    async fn signed_in(user: &str) -> CloudStorageClient {
        let client = CloudStorageClient::new(
            "test",
            Arc::new(DocumentStore::in_memory()),
            AuthState::fixed(Some(user.to_string())),
        );
        client.init().await.unwrap();
        client
    }

    fn input(title: &str) -> MemoInput {
        MemoInput::new(title, "", Category::Idea, Priority::Low)
    }

    #[tokio::test]
    async fn test_unauthenticated_operations_fail() {
        let client = CloudStorageClient::new(
            "test",
            Arc::new(DocumentStore::in_memory()),
            AuthState::fixed(None),
        );
        // 未登录也可以初始化
        client.init().await.unwrap();

        assert_eq!(
            client.list(None, None).await.unwrap_err(),
            StorageError::Unauthenticated
        );
        assert_eq!(
            client.create(input("x")).await.unwrap_err(),
            StorageError::Unauthenticated
        );
        assert_eq!(
            client.delete(&MemoId::Remote("x".into())).await.unwrap_err(),
            StorageError::Unauthenticated
        );
        assert!(matches!(
            client.subscribe().await,
            Err(StorageError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_collections_are_per_user() {
        let store = Arc::new(DocumentStore::in_memory());
        let (auth, state) = auth_channel(Some("alice".into()));
        let client = CloudStorageClient::new("test", store, state);
        client.init().await.unwrap();

        client.create(input("alice's")).await.unwrap();
        auth.sign_in("bob");
        assert!(client.list(None, None).await.unwrap().is_empty());

        client.create(input("bob's")).await.unwrap();
        auth.sign_in("alice");
        let memos = client.list(None, None).await.unwrap();
        assert_eq!(memos.len(), 1);
        assert_eq!(memos[0].title, "alice's");
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let client = signed_in("u").await;
        let id = client.create(input("before")).await.unwrap();
        let created = client.get(&id).await.unwrap();

        client
            .update(&id, input("after").with_tags(["t1", "t2"]))
            .await
            .unwrap();
        let updated = client.get(&id).await.unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.tags, vec!["t1", "t2"]);

        let missing = MemoId::Remote("nope".into());
        assert_eq!(
            client.update(&missing, input("x")).await.unwrap_err(),
            StorageError::NotFound(missing)
        );
    }

    #[tokio::test]
    async fn test_subscription_receives_ordered_snapshots() {
        let client = signed_in("u").await;
        client.create(input("first")).await.unwrap();

        let mut sub = client.subscribe().await.unwrap();
        let initial = sub.next().await.unwrap();
        assert_eq!(initial.len(), 1);

        client.create(input("second")).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        let titles: Vec<_> = snapshot.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);

        sub.unsubscribe();
        assert_eq!(client.store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_harmless() {
        let client = signed_in("u").await;
        let sub = client.subscribe().await.unwrap();
        drop(sub);

        client.create(input("after drop")).await.unwrap();
        assert_eq!(client.store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_keeps_cache() {
        let client = signed_in("u").await;
        client.create(input("online")).await.unwrap();

        client.go_offline().await.unwrap();
        assert!(!client.store.is_online().await);
        client.create(input("offline")).await.unwrap();
        assert_eq!(client.list(None, None).await.unwrap().len(), 2);

        client.go_online().await.unwrap();
        assert!(client.store.is_online().await);
        assert_eq!(client.stats().await.unwrap().total, 2);
    }

    fn shared(backing: &std::path::Path, user: &str) -> CloudStorageClient {
        let store = DocumentStore::new(Some(backing.to_path_buf()))
            .with_poll_interval(std::time::Duration::from_millis(20));
        CloudStorageClient::new("test", Arc::new(store), AuthState::fixed(Some(user.into())))
    }

    #[tokio::test]
    async fn test_subscription_sees_other_clients() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("documents.redb");
        let a = shared(&backing, "u");
        let b = shared(&backing, "u");
        a.init().await.unwrap();
        b.init().await.unwrap();

        let mut sub = a.subscribe().await.unwrap();
        assert!(sub.next().await.unwrap().is_empty());

        b.create(input("from b")).await.unwrap();
        let snapshot = tokio::time::timeout(std::time::Duration::from_secs(5), sub.next())
            .await
            .expect("remote change delivered")
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "from b");
    }

    #[tokio::test]
    async fn test_going_online_pulls_and_merges() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("documents.redb");
        let a = shared(&backing, "u");
        let b = shared(&backing, "u");
        a.init().await.unwrap();
        b.init().await.unwrap();

        a.go_offline().await.unwrap();
        b.create(input("from b")).await.unwrap();
        a.create(input("from a")).await.unwrap();
        assert_eq!(a.list(None, None).await.unwrap().len(), 1);

        a.go_online().await.unwrap();
        assert_eq!(a.list(None, None).await.unwrap().len(), 2);
        assert_eq!(b.stats().await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let client = signed_in("u").await;
        client.create(input("good")).await.unwrap();

        let now = chrono::Utc::now();
        client
            .store
            .add(
                "users/u/memos",
                Document {
                    title: "written by an old client".into(),
                    content: String::new(),
                    category: "chore".into(),
                    priority: "low".into(),
                    tags: None,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .unwrap();

        let memos = client.list(None, None).await.unwrap();
        assert_eq!(memos.len(), 1);
        assert_eq!(client.stats().await.unwrap().total, 1);
    }
}
