use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use memo_types::models::deserialize_content;
use memo_types::{StorageError, StorageResult};

use crate::remote::{RemoteStore, Snapshot};

/// 订阅期间检查远端变更的默认间隔
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 文档字段
///
/// 文档库不做枚举约束，category/priority 为普通字符串；时间为原生时间类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: String,
    pub category: String,
    pub priority: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    #[serde(flatten)]
    pub fields: Document,
}

/// 集合路径 -> 文档（插入顺序）
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Collections {
    collections: BTreeMap<String, Vec<StoredDocument>>,
}

impl Collections {
    pub(crate) fn docs(&self, path: &str) -> &[StoredDocument] {
        self.collections.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn push(&mut self, path: &str, doc: StoredDocument) {
        self.collections.entry(path.to_string()).or_default().push(doc);
    }

    fn find_mut(&mut self, path: &str, id: &str) -> Option<&mut StoredDocument> {
        self.collections
            .get_mut(path)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
    }

    fn remove(&mut self, path: &str, id: &str) -> bool {
        match self.collections.get_mut(path) {
            Some(docs) => {
                let before = docs.len();
                docs.retain(|doc| doc.id != id);
                docs.len() != before
            }
            None => false,
        }
    }
}

/// 单个文档的待同步修改
#[derive(Debug, Clone)]
pub(crate) enum Change {
    Set(Document),
    Delete,
}

#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub path: String,
    pub id: String,
    pub change: Change,
}

struct CacheState {
    cache: Collections,
    loaded: bool,
    online: bool,
    /// 尚未推送到后端的写入（按发生顺序）
    pending: Vec<PendingWrite>,
    /// 最近一次同步看到的后端版本
    revision: Option<u64>,
}

pub type Listener = Box<dyn Fn(&[StoredDocument]) + Send + Sync>;

/// 文档数据库客户端
///
/// 本地缓存始终可读写。网络开启时每次写入只推送本客户端的修改，
/// 并拉回其他客户端的修改；关闭期间写入只进缓存，重新开启时一次性推送。
/// `remote` 为 None 时没有后端，只有缓存（测试用）
pub struct DocumentStore {
    remote: Option<RemoteStore>,
    state: AsyncMutex<CacheState>,
    listeners: Mutex<HashMap<u64, (String, Listener)>>,
    next_listener: AtomicU64,
    poll_interval: Duration,
}

impl DocumentStore {
    /// 只记录后端位置，不访问网络；真正连接在 enable_network
    pub fn new(backing: Option<PathBuf>) -> Self {
        Self {
            remote: backing.map(RemoteStore::new),
            state: AsyncMutex::new(CacheState {
                cache: Collections::default(),
                loaded: false,
                online: false,
                pending: Vec::new(),
                revision: None,
            }),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn is_online(&self) -> bool {
        self.state.lock().await.online
    }

    /// 开启网络：推送离线写入并拉取后端最新状态
    ///
    /// 首次连接失败返回 Unavailable；之后的同步失败只记日志，写入留在缓存中
    pub async fn enable_network(&self) -> StorageResult<()> {
        let mut state = self.state.lock().await;

        if !state.loaded {
            self.sync(&mut state).await?;
            state.loaded = true;
        } else if let Err(e) = self.sync(&mut state).await {
            tracing::warn!("Document sync failed, keeping writes cached: {}", e);
        }
        state.online = true;
        Ok(())
    }

    /// 关闭网络同步，缓存保留
    pub async fn disable_network(&self) {
        self.state.lock().await.online = false;
    }

    /// 在线时检查后端版本，有其他客户端的修改就拉取并通知监听者
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        if !state.loaded || !state.online {
            return;
        }
        let Some(remote) = &self.remote else {
            return;
        };

        if state.pending.is_empty() {
            match remote.revision().await {
                Ok(revision) if Some(revision) == state.revision => return,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Document store unreachable, serving cache: {}", e);
                    return;
                }
            }
        }
        if let Err(e) = self.sync(&mut state).await {
            tracing::warn!("Document sync failed, serving cache: {}", e);
        }
    }

    /// 订阅期间的远端变更检查；调用方负责在取消订阅时终止任务
    pub fn watch_remote(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.poll_interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                store.refresh().await;
            }
        })
    }

    /// 新增文档，返回生成的文档 ID
    pub async fn add(&self, path: &str, fields: Document) -> StorageResult<String> {
        let mut state = self.ready().await?;
        let id = new_document_id();

        state.cache.push(
            path,
            StoredDocument {
                id: id.clone(),
                fields: fields.clone(),
            },
        );
        self.commit(&mut state, path, &id, Change::Set(fields)).await;
        Ok(id)
    }

    pub async fn get(&self, path: &str, id: &str) -> StorageResult<Option<Document>> {
        self.refresh().await;
        let state = self.ready().await?;
        Ok(state
            .cache
            .docs(path)
            .iter()
            .find(|doc| doc.id == id)
            .map(|doc| doc.fields.clone()))
    }

    /// 修改已有文档；文档不存在返回 false
    pub async fn update<F>(&self, path: &str, id: &str, f: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut Document) + Send,
    {
        self.refresh().await;
        let mut state = self.ready().await?;

        let Some(doc) = state.cache.find_mut(path, id) else {
            return Ok(false);
        };
        f(&mut doc.fields);
        let fields = doc.fields.clone();

        self.commit(&mut state, path, id, Change::Set(fields)).await;
        Ok(true)
    }

    /// 删除文档；文档不存在返回 false
    pub async fn delete(&self, path: &str, id: &str) -> StorageResult<bool> {
        self.refresh().await;
        let mut state = self.ready().await?;

        let removed = state.cache.remove(path, id);
        if removed {
            self.commit(&mut state, path, id, Change::Delete).await;
        }
        Ok(removed)
    }

    /// 集合中的全部文档（插入顺序）
    pub async fn query(&self, path: &str) -> StorageResult<Vec<StoredDocument>> {
        self.refresh().await;
        let state = self.ready().await?;
        Ok(state.cache.docs(path).to_vec())
    }

    /// 注册集合监听；注册时立即收到一次当前快照
    pub async fn listen(&self, path: &str, listener: Listener) -> StorageResult<u64> {
        self.refresh().await;
        let state = self.ready().await?;
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);

        listener(state.cache.docs(path));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (path.to_string(), listener));
        Ok(id)
    }

    pub fn unlisten(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn ready(&self) -> StorageResult<tokio::sync::MutexGuard<'_, CacheState>> {
        let state = self.state.lock().await;
        if !state.loaded {
            return Err(StorageError::unavailable("document store not connected"));
        }
        Ok(state)
    }

    /// 写入后：记录待同步修改并通知监听者；在线则立即同步
    async fn commit(&self, state: &mut CacheState, path: &str, id: &str, change: Change) {
        state.pending.push(PendingWrite {
            path: path.to_string(),
            id: id.to_string(),
            change,
        });
        self.notify(path, state.cache.docs(path));

        if state.online {
            if let Err(e) = self.sync(state).await {
                tracing::warn!("Document sync failed, keeping writes cached: {}", e);
            }
        }
    }

    /// 推送待同步修改，用后端视图替换缓存
    ///
    /// 没有后端时直接清空待同步队列。失败时缓存与队列保持不变，下次同步重试
    async fn sync(&self, state: &mut CacheState) -> StorageResult<()> {
        let Some(remote) = &self.remote else {
            state.pending.clear();
            return Ok(());
        };

        let Snapshot {
            revision,
            collections,
        } = remote.sync(state.pending.clone()).await?;
        state.pending.clear();
        state.revision = Some(revision);

        let previous = std::mem::replace(&mut state.cache, collections);
        self.notify_changed(&previous, &state.cache);
        Ok(())
    }

    /// 只通知内容发生变化的集合
    fn notify_changed(&self, before: &Collections, after: &Collections) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for (path, listener) in listeners.values() {
            let docs = after.docs(path);
            if before.docs(path) != docs {
                listener(docs);
            }
        }
    }

    fn notify(&self, path: &str, docs: &[StoredDocument]) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for (listened_path, listener) in listeners.values() {
            if listened_path == path {
                listener(docs);
            }
        }
    }
}

/// 20 位字母数字文档 ID
fn new_document_id() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let mut n = Uuid::new_v4().as_u128();
    (0..20)
        .map(|_| {
            let c = ALPHABET[(n % 62) as usize] as char;
            n /= 62;
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str) -> Document {
        let now = Utc::now();
        Document {
            title: title.to_string(),
            content: String::new(),
            category: "note".to_string(),
            priority: "low".to_string(),
            tags: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn titles(docs: &[StoredDocument]) -> Vec<String> {
        docs.iter().map(|doc| doc.fields.title.clone()).collect()
    }

    #[test]
    fn test_document_ids() {
        let a = new_document_id();
        let b = new_document_id();
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let store = DocumentStore::in_memory();
        assert!(matches!(
            store.query("users/u/memos").await,
            Err(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_writes_sync_when_back_online() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("documents.redb");

        let store = DocumentStore::new(Some(backing.clone()));
        store.enable_network().await.unwrap();
        store.add("c", doc("online")).await.unwrap();

        store.disable_network().await;
        store.add("c", doc("offline")).await.unwrap();
        // 离线写入对本地读取立即可见
        assert_eq!(store.query("c").await.unwrap().len(), 2);

        let remote = DocumentStore::new(Some(backing.clone()));
        remote.enable_network().await.unwrap();
        assert_eq!(remote.query("c").await.unwrap().len(), 1);

        store.enable_network().await.unwrap();
        assert_eq!(remote.query("c").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clients_keep_each_others_documents() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("documents.redb");

        let a = DocumentStore::new(Some(backing.clone()));
        let b = DocumentStore::new(Some(backing.clone()));
        a.enable_network().await.unwrap();
        b.enable_network().await.unwrap();

        b.add("c", doc("from b")).await.unwrap();
        a.add("c", doc("from a")).await.unwrap();

        assert_eq!(titles(&a.query("c").await.unwrap()), vec!["from b", "from a"]);
        assert_eq!(titles(&b.query("c").await.unwrap()), vec!["from b", "from a"]);
    }

    #[tokio::test]
    async fn test_offline_client_merges_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("documents.redb");

        let a = DocumentStore::new(Some(backing.clone()));
        let b = DocumentStore::new(Some(backing.clone()));
        a.enable_network().await.unwrap();
        b.enable_network().await.unwrap();
        let shared = a.add("c", doc("shared")).await.unwrap();

        a.disable_network().await;
        b.add("c", doc("from b")).await.unwrap();
        b.update("c", &shared, |d| d.title = "edited by b".to_string())
            .await
            .unwrap();
        a.add("c", doc("written offline")).await.unwrap();

        a.enable_network().await.unwrap();
        let mut merged = titles(&a.query("c").await.unwrap());
        merged.sort();
        assert_eq!(merged, vec!["edited by b", "from b", "written offline"]);
    }

    #[tokio::test]
    async fn test_listeners_scoped_to_collection() {
        let store = DocumentStore::in_memory();
        store.enable_network().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = store
            .listen(
                "a",
                Box::new(move |docs: &[StoredDocument]| sink.lock().unwrap().push(docs.len())),
            )
            .await
            .unwrap();

        store.add("a", doc("1")).await.unwrap();
        store.add("b", doc("other")).await.unwrap();
        store.add("a", doc("2")).await.unwrap();
        store.unlisten(id);
        store.add("a", doc("3")).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_delivers_remote_changes_once() {
        let dir = tempfile::tempdir().unwrap();
        let backing = dir.path().join("documents.redb");

        let a = DocumentStore::new(Some(backing.clone()));
        let b = DocumentStore::new(Some(backing));
        a.enable_network().await.unwrap();
        b.enable_network().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        a.listen(
            "c",
            Box::new(move |docs: &[StoredDocument]| sink.lock().unwrap().push(titles(docs))),
        )
        .await
        .unwrap();

        b.add("c", doc("remote")).await.unwrap();
        a.refresh().await;
        a.refresh().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Vec::<String>::new(), vec!["remote".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_report_presence() {
        let store = DocumentStore::in_memory();
        store.enable_network().await.unwrap();
        let id = store.add("c", doc("x")).await.unwrap();

        assert!(store
            .update("c", &id, |d| d.title = "y".to_string())
            .await
            .unwrap());
        assert_eq!(store.get("c", &id).await.unwrap().unwrap().title, "y");
        assert!(!store.update("c", "missing", |_| {}).await.unwrap());

        assert!(store.delete("c", &id).await.unwrap());
        assert!(!store.delete("c", &id).await.unwrap());
    }
}
