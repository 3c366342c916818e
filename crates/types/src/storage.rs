use async_trait::async_trait;
use std::fmt;

use crate::error::StorageResult;
use crate::models::{Category, Memo, MemoId, MemoInput, MemoStats};
use crate::subscription::Subscription;

/// 存储引擎种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Cloud,
    BrowserLocal,
    MobileLocal,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Cloud => "cloud",
            BackendKind::BrowserLocal => "browser-local",
            BackendKind::MobileLocal => "mobile-local",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 存储后端的统一接口
///
/// 三种引擎（云端、浏览器本地、移动端本地）都实现这个 trait，
/// 排序、过滤和错误语义必须一致
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// 打开/创建底层存储及索引（幂等）
    async fn init(&self) -> StorageResult<()>;

    /// 按 updated_at 倒序列出；offset 先生效，limit 后生效
    async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> StorageResult<Vec<Memo>>;

    /// 按 ID 读取，不存在时返回 NotFound
    async fn get(&self, id: &MemoId) -> StorageResult<Memo>;

    /// 创建记录，返回引擎分配的 ID；返回时记录已对本实例可见
    async fn create(&self, input: MemoInput) -> StorageResult<MemoId>;

    /// 整体替换可变字段并刷新 updated_at
    async fn update(&self, id: &MemoId, input: MemoInput) -> StorageResult<()>;

    /// 删除记录；记录不存在也视为成功
    async fn delete(&self, id: &MemoId) -> StorageResult<()>;

    /// 大小写不敏感的子串搜索；空查询等同于 list
    async fn search(&self, query: &str) -> StorageResult<Vec<Memo>>;

    async fn by_category(&self, category: Category) -> StorageResult<Vec<Memo>>;

    /// 同一快照上的统计
    async fn stats(&self) -> StorageResult<MemoStats>;

    /// 云同步能力（仅云端引擎提供）
    fn cloud_sync(&self) -> Option<&dyn CloudSync> {
        None
    }
}

/// 云端引擎额外提供的能力：变更订阅与在线/离线切换
#[async_trait]
pub trait CloudSync: Send + Sync {
    /// 注册后立即收到当前列表，之后集合每次变化都会收到完整的有序列表
    async fn subscribe(&self) -> StorageResult<Subscription>;

    /// 暂停网络同步，本地缓存保留
    async fn go_offline(&self) -> StorageResult<()>;

    /// 恢复网络同步，并推送离线期间的写入
    async fn go_online(&self) -> StorageResult<()>;
}
