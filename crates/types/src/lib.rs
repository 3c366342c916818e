//! Memo Types - shared model and storage contract
//!
//! Every storage engine (cloud, browser-local, mobile-local) implements
//! [`StorageBackend`] against the types defined here, so callers see the same
//! ordering, filtering and error semantics whichever engine is active.

pub mod clock;
pub mod error;
pub mod models;
pub mod query;
pub mod storage;
pub mod subscription;

pub use clock::{Clock, SystemClock};
pub use error::{StorageError, StorageResult};
pub use models::{Category, Memo, MemoId, MemoInput, MemoStats, Priority};
pub use storage::{BackendKind, CloudSync, StorageBackend};
pub use subscription::Subscription;
