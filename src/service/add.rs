use anyhow::Result;

use memo_types::{Category, MemoInput, Priority};

use super::{Session, Target};
use crate::ui::Output;

pub async fn add(
    target: &Target,
    title: String,
    content: String,
    category: Category,
    priority: Priority,
    tags: Vec<String>,
) -> Result<()> {
    let output = Output::new();

    if title.trim().is_empty() {
        anyhow::bail!("Title cannot be empty");
    }

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    output.status("Adding", &format!("{} memo \"{}\"", category, title));
    let input = MemoInput::new(title, content, category, priority).with_tags(tags);
    let id = session.facade.create(input).await?;

    output.status("Created", &format!("memo {}", id));
    output.finish("add", session.scope);
    Ok(())
}
