use memo_types::{Category, Priority, StorageResult};

use super::connection::sql_error;

pub struct TableOperations;

impl TableOperations {
    /// 建表与索引（IF NOT EXISTS，可重复执行）
    pub fn ensure_schema(conn: &rusqlite::Connection) -> StorageResult<()> {
        conn.execute_batch(&Self::schema_sql()).map_err(sql_error)?;
        Ok(())
    }

    pub fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> StorageResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(sql_error)?;
        Ok(count > 0)
    }

    fn schema_sql() -> String {
        // CHECK 约束与封闭枚举保持同源
        let categories = quoted_list(Category::ALL.iter().map(|c| c.as_str()));
        let priorities = quoted_list(Priority::ALL.iter().map(|p| p.as_str()));

        format!(
            "CREATE TABLE IF NOT EXISTS memos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL CHECK (category IN ({categories})),
                priority TEXT NOT NULL CHECK (priority IN ({priorities})),
                tags_json TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memos_category ON memos (category);
            CREATE INDEX IF NOT EXISTS idx_memos_priority ON memos (priority);
            CREATE INDEX IF NOT EXISTS idx_memos_updated_at ON memos (updated_at);"
        )
    }
}

fn quoted_list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values
        .map(|v| format!("'{}'", v))
        .collect::<Vec<_>>()
        .join(", ")
}
