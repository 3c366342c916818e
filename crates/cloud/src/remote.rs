use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use memo_types::{StorageError, StorageResult};

use crate::document::{Change, Collections, Document, PendingWrite, StoredDocument};

/// (集合路径, 文档 ID) -> JSON 编码的文档
const DOCUMENTS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("documents");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// 每次提交写入后递增，客户端据此判断是否需要重新拉取
const REVISION: &str = "revision";
/// 文档首次写入时分配的序号，用于保持插入顺序
const SEQUENCE: &str = "sequence";

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(10);

#[derive(Debug, Serialize, Deserialize)]
struct ServerDocument {
    seq: u64,
    #[serde(flatten)]
    fields: Document,
}

/// 一次同步后的服务器视图
pub struct Snapshot {
    pub revision: u64,
    pub collections: Collections,
}

/// 文档库的服务器端
///
/// 状态保存在一个 redb 文件中，所有客户端共享。每次访问单独打开文件，
/// 写入按文档合并（同一文档后写者胜），不会覆盖其他客户端的文档
#[derive(Debug, Clone)]
pub struct RemoteStore {
    path: PathBuf,
}

impl RemoteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 当前服务器版本号（只读，开销很小）
    pub async fn revision(&self) -> StorageResult<u64> {
        let path = self.path.clone();
        blocking(move || {
            let db = connect(&path)?;
            let txn = db.begin_read().map_err(remote_error)?;
            let meta = match txn.open_table(META) {
                Ok(meta) => meta,
                Err(redb::TableError::TableDoesNotExist(_)) => return Ok(0),
                Err(e) => return Err(remote_error(e)),
            };
            let revision = meta.get(REVISION).map_err(remote_error)?;
            Ok(revision.map(|guard| guard.value()).unwrap_or(0))
        })
        .await
    }

    /// 在一个写事务中推送待同步写入，然后读回全部集合
    pub async fn sync(&self, writes: Vec<PendingWrite>) -> StorageResult<Snapshot> {
        let path = self.path.clone();
        blocking(move || {
            let db = connect(&path)?;
            let txn = db.begin_write().map_err(remote_error)?;

            let snapshot = {
                let mut documents = txn.open_table(DOCUMENTS).map_err(remote_error)?;
                let mut meta = txn.open_table(META).map_err(remote_error)?;

                let mut revision = read_counter(&meta, REVISION)?;
                let mut sequence = read_counter(&meta, SEQUENCE)?;

                if !writes.is_empty() {
                    for write in writes {
                        let key = (write.path.as_str(), write.id.as_str());
                        match write.change {
                            Change::Set(fields) => {
                                let existing = documents
                                    .get(key)
                                    .map_err(remote_error)?
                                    .and_then(|bytes| decode(&write.id, bytes.value()));
                                let seq = match existing {
                                    Some(doc) => doc.seq,
                                    None => {
                                        sequence += 1;
                                        sequence
                                    }
                                };
                                let bytes = serde_json::to_vec(&ServerDocument { seq, fields })
                                    .map_err(StorageError::unavailable)?;
                                documents
                                    .insert(key, bytes.as_slice())
                                    .map_err(remote_error)?;
                            }
                            Change::Delete => {
                                documents.remove(key).map_err(remote_error)?;
                            }
                        }
                    }
                    revision += 1;
                    meta.insert(REVISION, revision).map_err(remote_error)?;
                    meta.insert(SEQUENCE, sequence).map_err(remote_error)?;
                }

                let mut ordered: Vec<(String, u64, StoredDocument)> = Vec::new();
                for entry in documents.iter().map_err(remote_error)? {
                    let (key, bytes) = entry.map_err(remote_error)?;
                    let (collection, id) = key.value();
                    if let Some(doc) = decode(id, bytes.value()) {
                        ordered.push((
                            collection.to_string(),
                            doc.seq,
                            StoredDocument {
                                id: id.to_string(),
                                fields: doc.fields,
                            },
                        ));
                    }
                }
                ordered.sort_by_key(|(_, seq, _)| *seq);

                let mut collections = Collections::default();
                for (collection, _, doc) in ordered {
                    collections.push(&collection, doc);
                }
                Snapshot {
                    revision,
                    collections,
                }
            };

            txn.commit().map_err(remote_error)?;
            Ok(snapshot)
        })
        .await
    }
}

fn remote_error(err: impl Into<redb::Error>) -> StorageError {
    StorageError::unavailable(format!("document store: {}", err.into()))
}

fn read_counter<T>(meta: &T, key: &str) -> StorageResult<u64>
where
    T: ReadableTable<&'static str, u64>,
{
    let value = meta.get(key).map_err(remote_error)?;
    Ok(value.map(|guard| guard.value()).unwrap_or(0))
}

fn decode(id: &str, bytes: &[u8]) -> Option<ServerDocument> {
    match serde_json::from_slice(bytes) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::warn!("Skipping undecodable document {}: {}", id, e);
            None
        }
    }
}

/// 打开服务器文件；被其他客户端占用时短暂重试
fn connect(path: &Path) -> StorageResult<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StorageError::unavailable(format!(
                "failed to reach document store {}: {}",
                path.display(),
                e
            ))
        })?;
    }

    let deadline = Instant::now() + LOCK_TIMEOUT;
    loop {
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                std::thread::sleep(LOCK_RETRY);
            }
            Err(e) => {
                return Err(StorageError::unavailable(format!(
                    "failed to reach document store {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

async fn blocking<F, T>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::unavailable(format!("task join error: {}", e)))?
}
