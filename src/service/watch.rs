use anyhow::Result;

use super::{Session, Target};
use crate::ui::Output;

/// 持续输出最新列表，直到 Ctrl-C
pub async fn watch(target: &Target) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    let Some(mut subscription) = session.facade.subscribe().await? else {
        output.warning(&format!(
            "{} storage does not publish changes, enable cloud sync to watch",
            session.kind
        ));
        return Ok(());
    };
    output.status("Watching", "for changes (Ctrl-C to stop)");

    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(memos) = snapshot else { break };
                eprintln!();
                output.status("Changed", &format!("{} memos", memos.len()));
                output.memo_list(&memos);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    output.finish("watch", session.scope);
    Ok(())
}
