use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

use memo_types::clock::{from_text, to_text};
use memo_types::{
    query, BackendKind, Category, Clock, Memo, MemoId, MemoInput, MemoStats, StorageBackend,
    StorageError, StorageResult, SystemClock,
};

use crate::db::connection::sql_error;
use crate::db::{Connection, TableOperations};

const SELECT_COLUMNS: &str =
    "SELECT id, title, content, category, priority, tags_json, created_at, updated_at FROM memos";

/// SQLite 单表存储（移动端本地引擎）
pub struct MobileStorageClient {
    path: Option<PathBuf>,
    conn: OnceCell<Connection>,
    clock: Arc<dyn Clock>,
}

impl MobileStorageClient {
    /// 文件数据库；init 时才真正打开
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            conn: OnceCell::new(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// 内存数据库（测试用）
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: OnceCell::new(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn conn(&self) -> StorageResult<&Connection> {
        self.conn
            .get()
            .ok_or_else(|| StorageError::unavailable("mobile database not initialized"))
    }

    async fn open(&self) -> StorageResult<Connection> {
        match &self.path {
            Some(path) => Connection::connect(path).await,
            None => Connection::in_memory(),
        }
    }

    async fn query_memos(
        &self,
        sql: String,
        args: Vec<rusqlite::types::Value>,
    ) -> StorageResult<Vec<Memo>> {
        self.conn()?
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(args), MemoRow::from_row)
                    .map_err(sql_error)?;

                let mut memos = Vec::new();
                for row in rows {
                    memos.push(row.map_err(sql_error)?.into_memo()?);
                }
                Ok(memos)
            })
            .await
    }
}

#[async_trait]
impl StorageBackend for MobileStorageClient {
    fn kind(&self) -> BackendKind {
        BackendKind::MobileLocal
    }

    async fn init(&self) -> StorageResult<()> {
        let conn = self.conn.get_or_try_init(|| self.open()).await?;
        let existed = conn
            .with_conn(|conn| TableOperations::table_exists(conn, "memos"))
            .await?;
        if !existed {
            tracing::debug!("Creating memos table");
        }
        conn.with_conn(TableOperations::ensure_schema).await?;

        match conn.path() {
            Some(path) => tracing::info!("SQLite database ready at {}", path.display()),
            None => tracing::info!("SQLite in-memory database ready"),
        }
        Ok(())
    }

    async fn list(&self, limit: Option<usize>, offset: Option<usize>) -> StorageResult<Vec<Memo>> {
        // SQLite 中 LIMIT -1 表示不限制；超出 i64 的 offset 等同于越过末尾
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(-1));
        let offset = offset.map_or(0, |n| i64::try_from(n).unwrap_or(i64::MAX));

        self.query_memos(
            format!(
                "{} ORDER BY updated_at DESC, id DESC LIMIT ?1 OFFSET ?2",
                SELECT_COLUMNS
            ),
            vec![limit.into(), offset.into()],
        )
        .await
    }

    async fn get(&self, id: &MemoId) -> StorageResult<Memo> {
        let key = id
            .as_local()
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;

        let row = self
            .conn()?
            .with_conn(move |conn| {
                conn.query_row(
                    &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                    [key],
                    MemoRow::from_row,
                )
                .optional()
                .map_err(sql_error)
            })
            .await?;

        match row {
            Some(row) => row.into_memo(),
            None => Err(StorageError::NotFound(id.clone())),
        }
    }

    async fn create(&self, input: MemoInput) -> StorageResult<MemoId> {
        let tags_json = serde_json::to_string(&input.tags).map_err(StorageError::rejected)?;
        let now = to_text(&self.clock.now());

        let id = self
            .conn()?
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO memos (title, content, category, priority, tags_json, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        input.title,
                        input.content,
                        input.category.as_str(),
                        input.priority.as_str(),
                        tags_json,
                        now
                    ],
                )
                .map_err(sql_error)?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::debug!("Created memo {} in SQLite", id);
        Ok(MemoId::Local(id))
    }

    async fn update(&self, id: &MemoId, input: MemoInput) -> StorageResult<()> {
        let key = id
            .as_local()
            .ok_or_else(|| StorageError::NotFound(id.clone()))?;
        let tags_json = serde_json::to_string(&input.tags).map_err(StorageError::rejected)?;
        let now = to_text(&self.clock.now());

        let changed = self
            .conn()?
            .with_conn(move |conn| {
                conn.execute(
                    "UPDATE memos
                     SET title = ?1, content = ?2, category = ?3, priority = ?4, tags_json = ?5,
                         updated_at = MAX(?6, created_at)
                     WHERE id = ?7",
                    params![
                        input.title,
                        input.content,
                        input.category.as_str(),
                        input.priority.as_str(),
                        tags_json,
                        now,
                        key
                    ],
                )
                .map_err(sql_error)
            })
            .await?;

        if changed == 0 {
            return Err(StorageError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, id: &MemoId) -> StorageResult<()> {
        let conn = self.conn()?;
        let Some(key) = id.as_local() else {
            return Ok(());
        };

        conn.with_conn(move |conn| {
            conn.execute("DELETE FROM memos WHERE id = ?1", [key])
                .map_err(sql_error)
        })
        .await?;
        Ok(())
    }

    async fn search(&self, query_text: &str) -> StorageResult<Vec<Memo>> {
        // LIKE 只做 ASCII 大小写折叠，且不覆盖 tags_json 的元素，
        // 所以取有序全集后用共享的过滤逻辑
        let all = self.list(None, None).await?;
        Ok(query::filter_search(all, query_text))
    }

    async fn by_category(&self, category: Category) -> StorageResult<Vec<Memo>> {
        self.query_memos(
            format!(
                "{} WHERE category = ?1 ORDER BY updated_at DESC, id DESC",
                SELECT_COLUMNS
            ),
            vec![category.as_str().to_string().into()],
        )
        .await
    }

    async fn stats(&self) -> StorageResult<MemoStats> {
        self.conn()?
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT
                        COUNT(*),
                        COUNT(CASE WHEN category = 'bug' THEN 1 END),
                        COUNT(CASE WHEN category = 'feature' THEN 1 END),
                        COUNT(CASE WHEN category = 'idea' THEN 1 END),
                        COUNT(CASE WHEN category = 'note' THEN 1 END),
                        COUNT(CASE WHEN category = 'todo' THEN 1 END),
                        COUNT(CASE WHEN priority = 'high' THEN 1 END)
                     FROM memos",
                    [],
                    |row| {
                        Ok(MemoStats {
                            total: row.get::<_, i64>(0)? as usize,
                            bugs: row.get::<_, i64>(1)? as usize,
                            features: row.get::<_, i64>(2)? as usize,
                            ideas: row.get::<_, i64>(3)? as usize,
                            notes: row.get::<_, i64>(4)? as usize,
                            todos: row.get::<_, i64>(5)? as usize,
                            high_priority: row.get::<_, i64>(6)? as usize,
                        })
                    },
                )
                .map_err(sql_error)
            })
            .await
    }
}

/// 数据库行（未经解析的文本字段）
struct MemoRow {
    id: i64,
    title: String,
    content: String,
    category: String,
    priority: String,
    tags_json: String,
    created_at: String,
    updated_at: String,
}

impl MemoRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            category: row.get(3)?,
            priority: row.get(4)?,
            tags_json: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_memo(self) -> StorageResult<Memo> {
        let tags: Option<Vec<String>> = serde_json::from_str(&self.tags_json).map_err(|e| {
            StorageError::rejected(format!("memo {} has malformed tags: {}", self.id, e))
        })?;
        let created_at = from_text(&self.created_at).ok_or_else(|| {
            StorageError::rejected(format!("memo {} has malformed created_at", self.id))
        })?;
        let updated_at = from_text(&self.updated_at).ok_or_else(|| {
            StorageError::rejected(format!("memo {} has malformed updated_at", self.id))
        })?;

        Ok(Memo {
            id: MemoId::Local(self.id),
            title: self.title,
            content: self.content,
            category: self.category.parse()?,
            priority: self.priority.parse()?,
            tags: tags.unwrap_or_default(),
            created_at,
            updated_at,
        })
    }
}
