//! Memo Local - on-device storage engines
//!
//! Two independent implementations of the `StorageBackend` contract:
//! - [`BrowserStorageClient`]: key-value object store with secondary indexes,
//!   persisted to a single database file
//! - [`MobileStorageClient`]: SQLite table with CHECK constraints and indexes

mod browser;
mod db;
mod kv;
mod mobile;

pub use browser::BrowserStorageClient;
pub use mobile::MobileStorageClient;
