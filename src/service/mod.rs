pub mod add;
pub mod delete;
pub mod init;
pub mod list;
pub mod session;
pub mod show;
pub mod stats;
pub mod update;
pub mod watch;

pub use session::{Session, Target};
