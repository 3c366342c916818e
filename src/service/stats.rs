use anyhow::Result;

use super::{Session, Target};
use crate::ui::Output;

pub async fn stats(target: &Target) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    let stats = session.facade.stats().await?;

    output.storage_info(session.kind, stats.total);
    output.memo_stats(&stats);

    Ok(())
}
