use std::fmt;
use tokio::sync::mpsc;

use crate::models::Memo;

/// 变更订阅句柄
///
/// 持有快照接收端和取消动作。显式 `unsubscribe()` 或 drop 都会取消注册；
/// 取消后发送端的推送会被静默丢弃
pub struct Subscription {
    snapshots: mpsc::UnboundedReceiver<Vec<Memo>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F>(snapshots: mpsc::UnboundedReceiver<Vec<Memo>>, cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            snapshots,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// 等待下一份快照；订阅源关闭后返回 None
    pub async fn next(&mut self) -> Option<Vec<Memo>> {
        self.snapshots.recv().await
    }

    /// 非阻塞地取出一份已到达的快照
    pub fn try_next(&mut self) -> Option<Vec<Memo>> {
        self.snapshots.try_recv().ok()
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        self.snapshots.close();
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
