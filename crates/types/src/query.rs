//! Ordering, paging and filtering shared by every engine.
//!
//! Engines that cannot express these natively fetch a snapshot and run it
//! through these helpers so results match across media.

use crate::models::{Category, Memo};

/// 按 updated_at 倒序排列
///
/// 输入必须是插入顺序；时间戳相同时后插入的排在前面（稳定排序）
pub fn order_recent_first(mut memos: Vec<Memo>) -> Vec<Memo> {
    memos.reverse();
    memos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    memos
}

/// 先跳过 offset 条，再截取 limit 条；None 表示不限制
pub fn paginate(memos: Vec<Memo>, limit: Option<usize>, offset: Option<usize>) -> Vec<Memo> {
    let rest = memos.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(n) => rest.take(n).collect(),
        None => rest.collect(),
    }
}

/// 空查询或纯空白查询
pub fn is_blank(query: &str) -> bool {
    query.trim().is_empty()
}

/// 大小写不敏感的子串匹配：标题、内容、任一标签
pub fn matches(memo: &Memo, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    contains_folded(&memo.title, &needle)
        || contains_folded(&memo.content, &needle)
        || memo.tags.iter().any(|tag| contains_folded(tag, &needle))
}

fn contains_folded(haystack: &str, folded_needle: &str) -> bool {
    haystack.to_lowercase().contains(folded_needle)
}

/// 保持输入顺序过滤；空查询原样返回
pub fn filter_search(memos: Vec<Memo>, query: &str) -> Vec<Memo> {
    if is_blank(query) {
        return memos;
    }
    let needle = query.to_lowercase();
    memos
        .into_iter()
        .filter(|memo| matches(memo, &needle))
        .collect()
}

pub fn filter_category(memos: Vec<Memo>, category: Category) -> Vec<Memo> {
    memos
        .into_iter()
        .filter(|memo| memo.category == category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemoId, MemoInput, Priority};
    use chrono::{Duration, TimeZone, Utc};

    fn memo_at(id: i64, secs: i64, title: &str) -> Memo {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        Memo::new(
            MemoId::Local(id),
            MemoInput::new(title, "", Category::Note, Priority::Low),
            ts,
        )
    }

    fn ids(memos: &[Memo]) -> Vec<i64> {
        memos.iter().filter_map(|m| m.id.as_local()).collect()
    }

    #[test]
    fn test_order_recent_first() {
        let memos = vec![memo_at(1, 10, "a"), memo_at(2, 30, "b"), memo_at(3, 20, "c")];
        assert_eq!(ids(&order_recent_first(memos)), vec![2, 3, 1]);
    }

    #[test]
    fn test_ties_prefer_later_insertion() {
        let memos = vec![memo_at(1, 10, "a"), memo_at(2, 10, "b"), memo_at(3, 10, "c")];
        assert_eq!(ids(&order_recent_first(memos)), vec![3, 2, 1]);
    }

    #[test]
    fn test_paginate() {
        let memos: Vec<Memo> = (1..=5).map(|i| memo_at(i, i, "x")).collect();

        assert_eq!(ids(&paginate(memos.clone(), None, None)), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&paginate(memos.clone(), Some(2), Some(1))), vec![2, 3]);
        assert_eq!(ids(&paginate(memos.clone(), None, Some(4))), vec![5]);
        assert_eq!(ids(&paginate(memos.clone(), Some(10), Some(9))), Vec::<i64>::new());
        assert!(paginate(memos, Some(0), None).is_empty());
    }

    #[test]
    fn test_search_matches_title_content_and_tags() {
        let mut by_tag = memo_at(1, 1, "plain");
        by_tag.tags = vec!["BugFix".to_string()];
        let mut by_content = memo_at(2, 2, "other");
        by_content.content = "found a BUG here".to_string();
        let by_title = memo_at(3, 3, "Debugging");
        let unrelated = memo_at(4, 4, "groceries");

        let found = filter_search(vec![by_tag, by_content, by_title, unrelated], "bug");
        assert_eq!(ids(&found), vec![1, 2, 3]);
    }

    #[test]
    fn test_blank_search_returns_everything() {
        let memos = vec![memo_at(1, 1, "a"), memo_at(2, 2, "b")];
        assert_eq!(filter_search(memos.clone(), "   ").len(), 2);
        assert_eq!(filter_search(memos, "").len(), 2);
    }

    #[test]
    fn test_update_moves_memo_to_front() {
        let mut memos = vec![memo_at(1, 1, "a"), memo_at(2, 2, "b"), memo_at(3, 3, "c")];
        let bumped = memos[0].updated_at + Duration::seconds(100);
        memos[0].updated_at = bumped;
        assert_eq!(ids(&order_recent_first(memos)), vec![1, 3, 2]);
    }
}
