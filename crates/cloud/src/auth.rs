use tokio::sync::watch;

/// 创建一对认证信号：发送端交给认证模块，接收端交给云端引擎
pub fn auth_channel(initial_user: Option<String>) -> (AuthHandle, AuthState) {
    let (tx, rx) = watch::channel(initial_user);
    (AuthHandle { tx }, AuthState { rx })
}

/// 当前登录用户（只读）
///
/// 引擎在每次操作开始时读取，不持有也不修改登录状态
#[derive(Debug, Clone)]
pub struct AuthState {
    rx: watch::Receiver<Option<String>>,
}

impl AuthState {
    /// 固定用户（或固定未登录），用于不接认证模块的场景
    pub fn fixed(user: Option<String>) -> Self {
        auth_channel(user).1
    }

    pub fn current_user(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

/// 登录状态的写端
#[derive(Debug)]
pub struct AuthHandle {
    tx: watch::Sender<Option<String>>,
}

impl AuthHandle {
    pub fn sign_in(&self, user_id: impl Into<String>) {
        self.tx.send_replace(Some(user_id.into()));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    pub fn state(&self) -> AuthState {
        AuthState {
            rx: self.tx.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_follows_handle() {
        let (handle, state) = auth_channel(None);
        assert!(!state.is_signed_in());

        handle.sign_in("alice");
        assert_eq!(state.current_user().as_deref(), Some("alice"));
        assert_eq!(handle.state().current_user().as_deref(), Some("alice"));

        handle.sign_out();
        assert_eq!(state.current_user(), None);
    }

    #[test]
    fn test_fixed_state_survives_dropped_sender() {
        let state = AuthState::fixed(Some("bob".into()));
        assert_eq!(state.current_user().as_deref(), Some("bob"));
    }
}
