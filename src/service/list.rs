use anyhow::Result;

use memo_types::Category;

use super::{Session, Target};
use crate::ui::Output;

pub async fn list(target: &Target, limit: Option<usize>, offset: Option<usize>) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    let total = session.show_info(&output).await?;

    if total == 0 {
        output.info("No memos found. Use 'memo add' to create one!");
        return Ok(());
    }

    let memos = session.facade.list(limit, offset).await?;
    if memos.is_empty() {
        output.info("No memos on this page");
        return Ok(());
    }
    output.memo_list(&memos);

    Ok(())
}

pub async fn search(target: &Target, query: &str) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    output.status("Searching", query);
    let memos = session.facade.search(query).await?;
    eprintln!();

    if memos.is_empty() {
        output.info(&format!("No memos match \"{}\"", query));
        return Ok(());
    }
    output.memo_list(&memos);

    Ok(())
}

pub async fn category(target: &Target, category: Category) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    let memos = session.facade.by_category(category).await?;
    if memos.is_empty() {
        output.info(&format!("No {} memos", category));
        return Ok(());
    }
    output.memo_list(&memos);

    Ok(())
}
