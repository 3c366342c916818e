use chrono::{DateTime, Utc};
use redb::{
    MultimapTableDefinition, ReadTransaction, ReadableMultimapTable, ReadableTable,
    TableDefinition, WriteTransaction,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use memo_types::models::{deserialize_content, deserialize_tags};
use memo_types::{
    Category, Memo, MemoId, MemoInput, MemoStats, Priority, StorageError, StorageResult,
};

use super::database::kv_error;

/// 主表：主键 -> JSON 编码的记录
const MEMOS: TableDefinition<i64, &[u8]> = TableDefinition::new("memos");
/// 元数据（自增主键游标）
const META: TableDefinition<&str, i64> = TableDefinition::new("meta");
const BY_CATEGORY: MultimapTableDefinition<&str, i64> = MultimapTableDefinition::new("by_category");
const BY_PRIORITY: MultimapTableDefinition<&str, i64> = MultimapTableDefinition::new("by_priority");
/// updatedAt（微秒）-> 主键
const BY_UPDATED_AT: MultimapTableDefinition<i64, i64> =
    MultimapTableDefinition::new("by_updated_at");

const NEXT_KEY: &str = "next_key";

/// 对象存储中的一条记录
///
/// 键值介质无法表达枚举约束，category/priority 以字符串保存，读取时再校验
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: String,
    pub category: String,
    pub priority: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(id: i64, input: MemoInput, now: DateTime<Utc>) -> Self {
        let memo = Memo::new(MemoId::Local(id), input, now);
        Self {
            id,
            title: memo.title,
            content: memo.content,
            category: memo.category.as_str().to_string(),
            priority: memo.priority.as_str().to_string(),
            tags: memo.tags,
            created_at: memo.created_at,
            updated_at: memo.updated_at,
        }
    }

    /// 校验并转换为 Memo；越界的枚举值返回 ValidationRejected
    pub fn to_memo(&self) -> StorageResult<Memo> {
        Ok(Memo {
            id: MemoId::Local(self.id),
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category.parse()?,
            priority: self.priority.parse()?,
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    /// 整体替换可变字段；已损坏的记录也可以被覆盖修复
    pub fn replace(&mut self, input: MemoInput, now: DateTime<Utc>) {
        self.title = input.title;
        self.content = input.content;
        self.category = input.category.as_str().to_string();
        self.priority = input.priority.as_str().to_string();
        self.tags = input.tags;
        self.updated_at = now.max(self.created_at);
    }

    fn updated_key(&self) -> i64 {
        self.updated_at.timestamp_micros()
    }
}

fn decode(id: i64, bytes: &[u8]) -> Option<StoredRecord> {
    match serde_json::from_slice::<StoredRecord>(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Skipping undecodable record {}: {}", id, e);
            None
        }
    }
}

fn load<T>(memos: &T, id: i64) -> StorageResult<Option<StoredRecord>>
where
    T: ReadableTable<i64, &'static [u8]>,
{
    let Some(bytes) = memos.get(id).map_err(kv_error)? else {
        return Ok(None);
    };
    Ok(decode(id, bytes.value()))
}

fn index_ids<T>(index: &T, key: &str) -> StorageResult<Vec<i64>>
where
    T: ReadableMultimapTable<&'static str, i64>,
{
    let mut ids = Vec::new();
    for id in index.get(key).map_err(kv_error)? {
        ids.push(id.map_err(kv_error)?.value());
    }
    Ok(ids)
}

/// 首次打开时建表，之后的只读事务才能打开它们
pub fn ensure_tables(txn: &WriteTransaction) -> StorageResult<()> {
    txn.open_table(MEMOS).map_err(kv_error)?;
    txn.open_table(META).map_err(kv_error)?;
    txn.open_multimap_table(BY_CATEGORY).map_err(kv_error)?;
    txn.open_multimap_table(BY_PRIORITY).map_err(kv_error)?;
    txn.open_multimap_table(BY_UPDATED_AT).map_err(kv_error)?;
    Ok(())
}

/// 只读事务上的对象存储视图（一致快照）
pub struct StoreReader<'t> {
    txn: &'t ReadTransaction,
}

impl<'t> StoreReader<'t> {
    pub fn new(txn: &'t ReadTransaction) -> Self {
        Self { txn }
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        let memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
        load(&memos, id)
    }

    /// 沿 updatedAt 索引倒序遍历（时间相同按主键倒序，即后插入的在前）
    pub fn recent_first(&self) -> StorageResult<Vec<StoredRecord>> {
        let memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
        let index = self.txn.open_multimap_table(BY_UPDATED_AT).map_err(kv_error)?;

        let mut keyed = Vec::new();
        for entry in index.iter().map_err(kv_error)? {
            let (updated, ids) = entry.map_err(kv_error)?;
            let updated = updated.value();
            for id in ids {
                keyed.push((updated, id.map_err(kv_error)?.value()));
            }
        }
        keyed.sort_unstable_by(|a, b| b.cmp(a));

        let mut records = Vec::with_capacity(keyed.len());
        for (_, id) in keyed {
            records.extend(load(&memos, id)?);
        }
        Ok(records)
    }

    /// category 索引上的记录，主键顺序
    pub fn with_category(&self, category: &str) -> StorageResult<Vec<StoredRecord>> {
        let memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
        let index = self.txn.open_multimap_table(BY_CATEGORY).map_err(kv_error)?;

        let mut records = Vec::new();
        for id in index_ids(&index, category)? {
            records.extend(load(&memos, id)?);
        }
        Ok(records)
    }

    /// 只读索引计数
    ///
    /// 只统计 category 与 priority 都在封闭集合内的记录，与读取时的校验一致
    pub fn stats(&self) -> StorageResult<MemoStats> {
        let by_category = self.txn.open_multimap_table(BY_CATEGORY).map_err(kv_error)?;
        let by_priority = self.txn.open_multimap_table(BY_PRIORITY).map_err(kv_error)?;

        let mut categories = Vec::new();
        for category in Category::ALL {
            categories.push((category, index_ids(&by_category, category.as_str())?));
        }
        let mut prioritized = HashSet::new();
        let mut high = HashSet::new();
        for priority in Priority::ALL {
            let ids = index_ids(&by_priority, priority.as_str())?;
            if priority == Priority::High {
                high.extend(ids.iter().copied());
            }
            prioritized.extend(ids);
        }

        let mut stats = MemoStats::default();
        for (category, ids) in categories {
            for id in ids.into_iter().filter(|id| prioritized.contains(id)) {
                let priority = if high.contains(&id) {
                    Priority::High
                } else {
                    Priority::Low
                };
                stats.record(category, priority);
            }
        }
        Ok(stats)
    }
}

/// 写事务上的对象存储视图
///
/// 主表与三个索引在同一事务中修改，提交前对其他读者不可见
pub struct StoreWriter<'t> {
    txn: &'t WriteTransaction,
}

impl<'t> StoreWriter<'t> {
    pub fn new(txn: &'t WriteTransaction) -> Self {
        Self { txn }
    }

    /// 分配自增主键（删除后不复用）
    pub fn allocate_key(&self) -> StorageResult<i64> {
        let mut meta = self.txn.open_table(META).map_err(kv_error)?;
        let stored = meta
            .get(NEXT_KEY)
            .map_err(kv_error)?
            .map(|guard| guard.value())
            .unwrap_or(1);

        // 游标丢失时不能落到已有主键上
        let memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
        let after_last = match memos.last().map_err(kv_error)? {
            Some((key, _)) => key.value() + 1,
            None => 1,
        };

        let key = stored.max(after_last).max(1);
        meta.insert(NEXT_KEY, key + 1).map_err(kv_error)?;
        Ok(key)
    }

    pub fn get(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        let memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
        load(&memos, id)
    }

    /// 新增或覆盖记录，同时维护索引
    pub fn put(&self, record: &StoredRecord) -> StorageResult<()> {
        self.remove(record.id)?;

        let bytes = serde_json::to_vec(record).map_err(StorageError::unavailable)?;
        let mut memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
        memos.insert(record.id, bytes.as_slice()).map_err(kv_error)?;

        let mut by_category = self.txn.open_multimap_table(BY_CATEGORY).map_err(kv_error)?;
        by_category
            .insert(record.category.as_str(), record.id)
            .map_err(kv_error)?;
        let mut by_priority = self.txn.open_multimap_table(BY_PRIORITY).map_err(kv_error)?;
        by_priority
            .insert(record.priority.as_str(), record.id)
            .map_err(kv_error)?;
        let mut by_updated_at = self.txn.open_multimap_table(BY_UPDATED_AT).map_err(kv_error)?;
        by_updated_at
            .insert(record.updated_key(), record.id)
            .map_err(kv_error)?;
        Ok(())
    }

    /// 删除记录及其索引项；不存在时返回 None
    pub fn remove(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        let removed = {
            let mut memos = self.txn.open_table(MEMOS).map_err(kv_error)?;
            let removed = memos.remove(id).map_err(kv_error)?;
            removed.and_then(|bytes| decode(id, bytes.value()))
        };
        let Some(record) = removed else {
            return Ok(None);
        };

        let mut by_category = self.txn.open_multimap_table(BY_CATEGORY).map_err(kv_error)?;
        by_category
            .remove(record.category.as_str(), id)
            .map_err(kv_error)?;
        let mut by_priority = self.txn.open_multimap_table(BY_PRIORITY).map_err(kv_error)?;
        by_priority
            .remove(record.priority.as_str(), id)
            .map_err(kv_error)?;
        let mut by_updated_at = self.txn.open_multimap_table(BY_UPDATED_AT).map_err(kv_error)?;
        by_updated_at
            .remove(record.updated_key(), id)
            .map_err(kv_error)?;
        Ok(Some(record))
    }
}
