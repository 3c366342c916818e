use redb::backends::InMemoryBackend;
use redb::{Database, DatabaseError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use memo_types::{StorageError, StorageResult};

use super::object_store::{ensure_tables, StoreReader, StoreWriter};

/// 等待其他进程释放数据库文件的上限
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// redb 错误映射：键值介质的任何故障都视为存储不可用
pub fn kv_error(err: impl Into<redb::Error>) -> StorageError {
    StorageError::unavailable(err.into())
}

enum Backend {
    /// 文件数据库：每个事务单独打开文件，事务结束即释放文件锁
    File(PathBuf),
    Memory(Arc<Database>),
}

/// 键值数据库：一个对象存储（主表 + 三个多值索引表）
///
/// 所有读写都在 redb 事务中完成，写事务提交后才对其他实例可见。
/// 同一文件可以被多个实例（多个进程）共享
pub struct KvDatabase {
    backend: Backend,
}

impl KvDatabase {
    /// 打开数据库文件；不存在则创建并建表
    pub async fn open(path: &Path) -> StorageResult<Self> {
        let path = path.to_path_buf();
        let target = path.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::unavailable(format!(
                        "failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            let db = open_file(&target)?;
            create_tables(&db)
        })
        .await
        .map_err(|e| StorageError::unavailable(format!("task join error: {}", e)))??;

        Ok(Self {
            backend: Backend::File(path),
        })
    }

    /// 内存数据库（测试用）
    pub fn in_memory() -> StorageResult<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(kv_error)?;
        create_tables(&db)?;

        Ok(Self {
            backend: Backend::Memory(Arc::new(db)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(path) => Some(path),
            Backend::Memory(_) => None,
        }
    }

    /// 只读事务（一致快照）
    pub async fn read<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&StoreReader<'_>) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_db(move |db| {
            let txn = db.begin_read().map_err(kv_error)?;
            let reader = StoreReader::new(&txn);
            f(&reader)
        })
        .await
    }

    /// 读写事务：闭包返回 Ok 才提交，否则整体回滚
    pub async fn write<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&StoreWriter<'_>) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_db(move |db| {
            let txn = db.begin_write().map_err(kv_error)?;
            let writer = StoreWriter::new(&txn);
            let result = f(&writer);
            match result {
                Ok(value) => {
                    txn.commit().map_err(kv_error)?;
                    Ok(value)
                }
                Err(e) => {
                    txn.abort().map_err(kv_error)?;
                    Err(e)
                }
            }
        })
        .await
    }

    async fn with_db<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let backend = match &self.backend {
            Backend::File(path) => Backend::File(path.clone()),
            Backend::Memory(db) => Backend::Memory(Arc::clone(db)),
        };

        tokio::task::spawn_blocking(move || {
            let db = match backend {
                Backend::File(path) => Arc::new(open_file(&path)?),
                Backend::Memory(db) => db,
            };
            f(&db)
        })
        .await
        .map_err(|e| StorageError::unavailable(format!("task join error: {}", e)))?
    }
}

/// 打开数据库文件；被其他实例占用时短暂重试
fn open_file(path: &Path) -> StorageResult<Database> {
    let deadline = Instant::now() + LOCK_TIMEOUT;
    loop {
        match Database::create(path) {
            Ok(db) => return Ok(db),
            Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                std::thread::sleep(LOCK_RETRY);
            }
            Err(e) => {
                return Err(StorageError::unavailable(format!(
                    "failed to open database {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

fn create_tables(db: &Database) -> StorageResult<()> {
    let txn = db.begin_write().map_err(kv_error)?;
    ensure_tables(&txn)?;
    txn.commit().map_err(kv_error)
}
