use anyhow::Result;

use memo_types::MemoId;

use super::{Session, Target};
use crate::ui::Output;

pub async fn delete(target: &Target, id: &MemoId, skip_confirm: bool) -> Result<()> {
    let output = Output::new();

    let session = Session::open(target).await?;
    session.show_info(&output).await?;

    output.warning(&format!("this will permanently delete memo {}", id));

    if !skip_confirm && !output.confirm("yes")? {
        output.info("Operation cancelled");
        return Ok(());
    }

    output.begin_operation("Deleting", &format!("memo {}", id));
    session.facade.delete(id).await?;

    output.finish("delete", session.scope);
    Ok(())
}
