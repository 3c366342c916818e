use memo_types::{StorageError, StorageResult};
use rusqlite::ErrorCode;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// SQLite 连接（跨异步任务共享）
///
/// 所有阻塞调用都经由 [`with_conn`](Self::with_conn) 在 Tokio 阻塞线程池执行
#[derive(Clone)]
pub struct Connection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    path: Option<PathBuf>,
}

impl Connection {
    /// 打开（或创建）数据库文件
    pub async fn connect(path: &Path) -> StorageResult<Self> {
        let path = path.to_path_buf();
        let target = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::unavailable(format!(
                        "failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            let conn = rusqlite::Connection::open(&target).map_err(|e| {
                StorageError::unavailable(format!(
                    "failed to open database {}: {}",
                    target.display(),
                    e
                ))
            })?;
            configure(&conn, true)?;
            Ok::<_, StorageError>(conn)
        })
        .await
        .map_err(|e| StorageError::unavailable(format!("task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// 内存数据库（测试用）
    pub fn in_memory() -> StorageResult<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| {
            StorageError::unavailable(format!("failed to open in-memory database: {}", e))
        })?;
        configure(&conn, false)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn with_conn<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StorageError::unavailable(format!("failed to acquire database lock: {}", e))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::unavailable(format!("task join error: {}", e)))?
    }
}

fn configure(conn: &rusqlite::Connection, file_backed: bool) -> StorageResult<()> {
    // WAL 只对文件数据库有意义
    if file_backed {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(sql_error)?;
    }
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(sql_error)?;
    Ok(())
}

/// rusqlite 错误映射：约束冲突视为校验拒绝，其余视为存储不可用
pub fn sql_error(err: rusqlite::Error) -> StorageError {
    let constraint = matches!(
        &err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == ErrorCode::ConstraintViolation
    );
    if constraint {
        StorageError::rejected(err)
    } else {
        StorageError::unavailable(err)
    }
}
