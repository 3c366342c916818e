use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use memo_types::{
    query, BackendKind, Category, Clock, Memo, MemoId, MemoInput, MemoStats, StorageBackend,
    StorageError, StorageResult, SystemClock,
};

use crate::kv::{KvDatabase, StoredRecord};

/// 键值对象存储（浏览器本地引擎）
///
/// 单一命名空间，不区分用户
pub struct BrowserStorageClient {
    path: Option<PathBuf>,
    db: OnceCell<KvDatabase>,
    clock: Arc<dyn Clock>,
}

impl BrowserStorageClient {
    /// 文件数据库；init 时才真正打开
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            db: OnceCell::new(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// 内存数据库（测试用）
    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: OnceCell::new(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn db(&self) -> StorageResult<&KvDatabase> {
        self.db
            .get()
            .ok_or_else(|| StorageError::unavailable("browser database not initialized"))
    }

    async fn open(&self) -> StorageResult<KvDatabase> {
        match &self.path {
            Some(path) => KvDatabase::open(path).await,
            None => KvDatabase::in_memory(),
        }
    }

    /// 按最近更新顺序读出全部合法记录
    async fn snapshot(&self) -> StorageResult<Vec<Memo>> {
        let records = self.db()?.read(|store| store.recent_first()).await?;
        Ok(records.iter().filter_map(readable).collect())
    }
}

/// 越界的枚举值不返回给调用方，记录日志后跳过
fn readable(record: &StoredRecord) -> Option<Memo> {
    match record.to_memo() {
        Ok(memo) => Some(memo),
        Err(e) => {
            tracing::warn!("Skipping malformed record {}: {}", record.id, e);
            None
        }
    }
}

#[async_trait]
impl StorageBackend for BrowserStorageClient {
    fn kind(&self) -> BackendKind {
        BackendKind::BrowserLocal
    }

    async fn init(&self) -> StorageResult<()> {
        let db = self.db.get_or_try_init(|| self.open()).await?;

        match db.path() {
            Some(path) => tracing::info!("Key-value database ready at {}", path.display()),
            None => tracing::info!("Key-value in-memory database ready"),
        }
        Ok(())
    }

    async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> StorageResult<Vec<Memo>> {
        Ok(query::paginate(self.snapshot().await?, limit, offset))
    }

    async fn get(&self, id: &MemoId) -> StorageResult<Memo> {
        let key = id
            .as_local()
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        self.db()?
            .read(move |store| store.get(key))
            .await?
            .ok_or_else(|| StorageError::NotFound(id.clone()))?
            .to_memo()
    }

    async fn create(&self, input: MemoInput) -> StorageResult<MemoId> {
        let now = self.clock.now();
        let key = self
            .db()?
            .write(move |store| {
                let key = store.allocate_key()?;
                store.put(&StoredRecord::new(key, input, now))?;
                Ok(key)
            })
            .await?;

        tracing::debug!("Created memo {} in key-value store", key);
        Ok(MemoId::Local(key))
    }

    async fn update(&self, id: &MemoId, input: MemoInput) -> StorageResult<()> {
        let now = self.clock.now();
        let key = id
            .as_local()
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        let found = self
            .db()?
            .write(move |store| {
                let Some(mut record) = store.get(key)? else {
                    return Ok(false);
                };
                record.replace(input, now);
                store.put(&record)?;
                Ok(true)
            })
            .await?;

        if !found {
            return Err(StorageError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, id: &MemoId) -> StorageResult<()> {
        let db = self.db()?;
        let Some(key) = id.as_local() else {
            return Ok(());
        };

        db.write(move |store| store.remove(key).map(|_| ())).await
    }

    async fn search(&self, query_text: &str) -> StorageResult<Vec<Memo>> {
        Ok(query::filter_search(self.snapshot().await?, query_text))
    }

    async fn by_category(&self, category: Category) -> StorageResult<Vec<Memo>> {
        let records = self
            .db()?
            .read(move |store| store.with_category(category.as_str()))
            .await?;

        // 索引按主键（插入）顺序返回，再统一排序
        let memos = records.iter().filter_map(readable).collect();
        Ok(query::order_recent_first(memos))
    }

    async fn stats(&self) -> StorageResult<MemoStats> {
        self.db()?.read(|store| store.stats()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memo_types::Priority;

    async fn ready() -> BrowserStorageClient {
        let client = BrowserStorageClient::in_memory();
        client.init().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_operations_before_init_are_unavailable() {
        let client = BrowserStorageClient::in_memory();
        let err = client
            .create(MemoInput::new("t", "", Category::Bug, Priority::Low))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_by_category_uses_recent_first_order() {
        let client = ready().await;
        let a = client
            .create(MemoInput::new("a", "", Category::Bug, Priority::Low))
            .await
            .unwrap();
        client
            .create(MemoInput::new("b", "", Category::Idea, Priority::Low))
            .await
            .unwrap();
        client
            .create(MemoInput::new("c", "", Category::Bug, Priority::Low))
            .await
            .unwrap();
        client
            .update(&a, MemoInput::new("a2", "", Category::Bug, Priority::High))
            .await
            .unwrap();

        let bugs = client.by_category(Category::Bug).await.unwrap();
        let titles: Vec<_> = bugs.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["a2", "c"]);
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo_db.redb");

        // 其他写入方留下的越界记录
        let db = KvDatabase::open(&path).await.unwrap();
        db.write(|store| {
            let ok = StoredRecord::new(
                store.allocate_key()?,
                MemoInput::new("ok", "", Category::Note, Priority::Low),
                chrono::Utc::now(),
            );
            store.put(&ok)?;
            let mut bad = StoredRecord::new(
                store.allocate_key()?,
                MemoInput::new("bad", "", Category::Note, Priority::Low),
                chrono::Utc::now(),
            );
            bad.category = "chore".to_string();
            store.put(&bad)
        })
        .await
        .unwrap();
        drop(db);

        let client = BrowserStorageClient::new(&path);
        client.init().await.unwrap();

        let all = client.list(None, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "ok");
        assert!(all[0].tags.is_empty());

        let stats = client.stats().await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.category_sum(), 1);

        assert!(matches!(
            client.get(&MemoId::Local(2)).await,
            Err(StorageError::ValidationRejected(_))
        ));

        // 整体覆盖可以修复损坏的记录
        client
            .update(
                &MemoId::Local(2),
                MemoInput::new("fixed", "", Category::Todo, Priority::Low),
            )
            .await
            .unwrap();
        assert_eq!(client.list(None, None).await.unwrap().len(), 2);
        assert_eq!(client.stats().await.unwrap().todos, 1);

        let id = client
            .create(MemoInput::new("new", "", Category::Idea, Priority::Low))
            .await
            .unwrap();
        assert_eq!(id, MemoId::Local(3));
    }

    #[tokio::test]
    async fn test_clients_sharing_a_file_keep_each_others_memos() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo_db.redb");

        let a = BrowserStorageClient::new(&path);
        let b = BrowserStorageClient::new(&path);
        a.init().await.unwrap();
        b.init().await.unwrap();

        let from_b = b
            .create(MemoInput::new("from b", "", Category::Note, Priority::Low))
            .await
            .unwrap();
        let from_a = a
            .create(MemoInput::new("from a", "", Category::Note, Priority::Low))
            .await
            .unwrap();
        assert_ne!(from_a, from_b);

        let reader = BrowserStorageClient::new(&path);
        reader.init().await.unwrap();
        let mut titles: Vec<String> = reader
            .list(None, None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["from a", "from b"]);
        assert_eq!(a.get(&from_b).await.unwrap().title, "from b");
    }
}
