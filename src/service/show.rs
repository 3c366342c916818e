use anyhow::{Context, Result};

use memo_types::MemoId;

use super::{Session, Target};
use crate::ui::Output;

pub async fn show(target: &Target, id: &MemoId) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    let memo = session
        .facade
        .get(id)
        .await
        .with_context(|| format!("Failed to load memo {}", id))?;
    output.memo_detail(&memo);

    Ok(())
}
