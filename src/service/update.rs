use anyhow::{Context, Result};

use memo_types::{Category, MemoId, Priority};

use super::{Session, Target};
use crate::ui::Output;

/// 命令行上给出的字段，未给出的沿用旧值
pub struct Changes {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

pub async fn update(target: &Target, id: &MemoId, changes: Changes) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    output.status("Finding", &format!("memo {}", id));
    let memo = session
        .facade
        .get(id)
        .await
        .with_context(|| format!("Failed to load memo {}", id))?;

    // 存储层是整体替换，这里补齐完整字段
    let mut input = memo.input();
    if let Some(title) = changes.title {
        if title.trim().is_empty() {
            anyhow::bail!("Title cannot be empty");
        }
        input.title = title;
    }
    if let Some(content) = changes.content {
        input.content = content;
    }
    if let Some(category) = changes.category {
        input.category = category;
    }
    if let Some(priority) = changes.priority {
        input.priority = priority;
    }
    if let Some(tags) = changes.tags {
        input.tags = tags;
    }

    output.status("Updating", &format!("memo {}", id));
    session.facade.update(id, input).await?;

    output.finish("update", session.scope);
    Ok(())
}
