use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use memo_types::{StorageError, StorageResult};

/// 旧版扁平键值存储
#[async_trait]
pub trait LegacyStore: Send + Sync {
    /// 读取键对应的原始文本；键不存在返回 None
    async fn read(&self, key: &str) -> StorageResult<Option<String>>;

    async fn remove(&self, key: &str) -> StorageResult<()>;
}

/// 目录中每个键一个 `<key>.json` 文件
pub struct FileLegacyStore {
    dir: PathBuf,
}

impl FileLegacyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl LegacyStore for FileLegacyStore {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::unavailable(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::unavailable(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// 内存实现
#[derive(Default)]
pub struct MemoryLegacyStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl LegacyStore for MemoryLegacyStore {
    async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
