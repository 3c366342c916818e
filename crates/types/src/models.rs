use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// 备忘分类（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bug,
    Feature,
    Idea,
    Note,
    Todo,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Bug,
        Category::Feature,
        Category::Idea,
        Category::Note,
        Category::Todo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Bug => "bug",
            Category::Feature => "feature",
            Category::Idea => "idea",
            Category::Note => "note",
            Category::Todo => "todo",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StorageError::rejected(format!("unknown category: {:?}", s)))
    }
}

/// 优先级（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| StorageError::rejected(format!("unknown priority: {:?}", s)))
    }
}

/// 备忘 ID
///
/// 本地引擎使用自增整数，云端引擎使用不透明字符串。
/// 上层只把它当作可比较、可序列化的令牌，不做算术
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoId {
    Local(i64),
    Remote(String),
}

impl MemoId {
    /// 本地引擎的主键（字符串形式的整数也接受）
    pub fn as_local(&self) -> Option<i64> {
        match self {
            MemoId::Local(n) => Some(*n),
            MemoId::Remote(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for MemoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoId::Local(n) => write!(f, "{}", n),
            MemoId::Remote(s) => f.write_str(s),
        }
    }
}

impl FromStr for MemoId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) => MemoId::Local(n),
            Err(_) => MemoId::Remote(s.to_string()),
        })
    }
}

impl From<i64> for MemoId {
    fn from(n: i64) -> Self {
        MemoId::Local(n)
    }
}

impl From<String> for MemoId {
    fn from(s: String) -> Self {
        MemoId::Remote(s)
    }
}

/// 缺失或为 null 的 tags 统一视为空列表
pub fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// 缺失或为 null 的 content 视为空字符串
pub fn deserialize_content<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// 创建/更新时由调用方提供的可变字段
///
/// update 是整体替换，调用方必须传完整的五个字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoInput {
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

impl MemoInput {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: Category,
        priority: Priority,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category,
            priority,
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// 持久化的备忘记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: MemoId,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memo {
    /// 新建记录：created_at 与 updated_at 取同一个时间
    pub fn new(id: MemoId, input: MemoInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: input.title,
            content: input.content,
            category: input.category,
            priority: input.priority,
            tags: input.tags,
            created_at: now,
            updated_at: now,
        }
    }

    /// 整体替换可变字段并刷新 updated_at（id 与 created_at 不变）
    pub fn apply(&mut self, input: MemoInput, now: DateTime<Utc>) {
        self.title = input.title;
        self.content = input.content;
        self.category = input.category;
        self.priority = input.priority;
        self.tags = input.tags;
        self.updated_at = now.max(self.created_at);
    }

    /// 取出可变字段（迁移、测试比较用）
    pub fn input(&self) -> MemoInput {
        MemoInput {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category,
            priority: self.priority,
            tags: self.tags.clone(),
        }
    }
}

/// 统计结果（固定结构）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoStats {
    pub total: usize,
    pub bugs: usize,
    pub features: usize,
    pub ideas: usize,
    pub notes: usize,
    pub todos: usize,
    pub high_priority: usize,
}

impl MemoStats {
    /// 从同一个快照一次性计算
    pub fn from_memos<'a, I>(memos: I) -> Self
    where
        I: IntoIterator<Item = &'a Memo>,
    {
        let mut stats = Self::default();
        for memo in memos {
            stats.record(memo.category, memo.priority);
        }
        stats
    }

    pub fn record(&mut self, category: Category, priority: Priority) {
        self.total += 1;
        match category {
            Category::Bug => self.bugs += 1,
            Category::Feature => self.features += 1,
            Category::Idea => self.ideas += 1,
            Category::Note => self.notes += 1,
            Category::Todo => self.todos += 1,
        }
        if priority == Priority::High {
            self.high_priority += 1;
        }
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Bug => self.bugs,
            Category::Feature => self.features,
            Category::Idea => self.ideas,
            Category::Note => self.notes,
            Category::Todo => self.todos,
        }
    }

    pub fn category_sum(&self) -> usize {
        Category::ALL.into_iter().map(|c| self.count(c)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_sets_reject_unknown_values() {
        assert_eq!("idea".parse::<Category>().unwrap(), Category::Idea);
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);

        assert!(matches!(
            "Bug".parse::<Category>(),
            Err(StorageError::ValidationRejected(_))
        ));
        assert!(matches!(
            "urgent".parse::<Priority>(),
            Err(StorageError::ValidationRejected(_))
        ));
    }

    #[test]
    fn test_memo_id_parse_and_display() {
        assert_eq!("42".parse::<MemoId>().unwrap(), MemoId::Local(42));
        assert_eq!(
            "aZ09xYz".parse::<MemoId>().unwrap(),
            MemoId::Remote("aZ09xYz".to_string())
        );
        assert_eq!(MemoId::Local(7).to_string(), "7");
        assert_eq!(MemoId::Remote("12".into()).as_local(), Some(12));
        assert_eq!(MemoId::Remote("abc".into()).as_local(), None);
    }

    #[test]
    fn test_input_requires_title_and_normalizes_tags() {
        let missing_title = r#"{"content":"x","category":"bug","priority":"low"}"#;
        assert!(serde_json::from_str::<MemoInput>(missing_title).is_err());

        let null_tags = r#"{"title":"t","category":"note","priority":"low","tags":null}"#;
        let input: MemoInput = serde_json::from_str(null_tags).unwrap();
        assert!(input.tags.is_empty());
        assert_eq!(input.content, "");

        let null_content = r#"{"title":"t","content":null,"category":"idea","priority":"high"}"#;
        let input: MemoInput = serde_json::from_str(null_content).unwrap();
        assert_eq!(input.content, "");

        let bad_category = r#"{"title":"t","category":"chore","priority":"low"}"#;
        assert!(serde_json::from_str::<MemoInput>(bad_category).is_err());
    }

    #[test]
    fn test_memo_serializes_camel_case_and_untagged_id() {
        let now = Utc::now();
        let memo = Memo::new(
            MemoId::Local(3),
            MemoInput::new("t", "c", Category::Todo, Priority::Medium),
            now,
        );
        let value = serde_json::to_value(&memo).unwrap();

        assert_eq!(value["id"], 3);
        assert_eq!(value["category"], "todo");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
    }

    #[test]
    fn test_apply_keeps_id_and_created_at() {
        let created = Utc::now();
        let mut memo = Memo::new(
            MemoId::Local(1),
            MemoInput::new("old", "", Category::Bug, Priority::Low),
            created,
        );
        let later = created + chrono::Duration::seconds(5);
        memo.apply(
            MemoInput::new("new", "body", Category::Idea, Priority::High).with_tags(["a"]),
            later,
        );

        assert_eq!(memo.id, MemoId::Local(1));
        assert_eq!(memo.created_at, created);
        assert_eq!(memo.updated_at, later);
        assert_eq!(memo.title, "new");
        assert_eq!(memo.tags, vec!["a".to_string()]);
    }

    #[test]
    fn test_stats_sum_matches_total() {
        let now = Utc::now();
        let memos: Vec<Memo> = [
            (Category::Bug, Priority::High),
            (Category::Bug, Priority::Low),
            (Category::Todo, Priority::High),
            (Category::Note, Priority::Medium),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (c, p))| Memo::new(MemoId::Local(i as i64), MemoInput::new("t", "", c, p), now))
        .collect();

        let stats = MemoStats::from_memos(&memos);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.bugs, 2);
        assert_eq!(stats.high_priority, 2);
        assert_eq!(stats.category_sum(), stats.total);
    }
}
