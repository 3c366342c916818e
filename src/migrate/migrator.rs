use std::sync::Arc;

use memo_types::{MemoInput, StorageBackend, StorageError, StorageResult};

use super::legacy::LegacyStore;

/// 旧版应用保存备忘列表使用的键
pub const LEGACY_MEMOS_KEY: &str = "brainpatch_memos";

/// 迁移结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// 旧数据中的记录数
    pub found: usize,
    /// 成功写入当前引擎的记录数
    pub migrated: usize,
    /// 旧数据是否已删除
    pub cleared: bool,
}

/// 把旧版扁平存储中的备忘重放到当前引擎
///
/// ID 和时间戳由目标引擎重新分配。任何一条写入失败都会停止迁移并保留旧数据，
/// 下次启动时重试
pub struct LegacyMigrator {
    store: Arc<dyn LegacyStore>,
    key: String,
}

impl LegacyMigrator {
    pub fn new(store: Arc<dyn LegacyStore>) -> Self {
        Self {
            store,
            key: LEGACY_MEMOS_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub async fn migrate(&self, engine: &dyn StorageBackend) -> StorageResult<MigrationReport> {
        let Some(records) = self.read_records().await else {
            return Ok(MigrationReport::default());
        };

        let mut report = MigrationReport {
            found: records.len(),
            ..MigrationReport::default()
        };

        for (index, record) in records.into_iter().enumerate() {
            let created = match serde_json::from_value::<MemoInput>(record) {
                Ok(input) => engine.create(input).await.map(|_| ()),
                Err(e) => Err(StorageError::rejected(format!(
                    "legacy record {}: {}",
                    index, e
                ))),
            };

            if let Err(e) = created {
                tracing::warn!(
                    "Legacy migration stopped after {} of {} records, keeping legacy data: {}",
                    report.migrated,
                    report.found,
                    e
                );
                return Err(e);
            }
            report.migrated += 1;
        }

        self.store.remove(&self.key).await?;
        report.cleared = true;

        tracing::info!(
            "Migrated {} legacy memos into {} storage",
            report.migrated,
            engine.kind()
        );
        Ok(report)
    }

    /// 读取并解析旧数据；不存在或无法解析都视为没有旧数据
    async fn read_records(&self) -> Option<Vec<serde_json::Value>> {
        let text = match self.store.read(&self.key).await {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Legacy data unreadable, skipping migration: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(records) => Some(records),
            Err(e) => {
                tracing::warn!("Legacy data is not a memo list, skipping migration: {}", e);
                None
            }
        }
    }
}
