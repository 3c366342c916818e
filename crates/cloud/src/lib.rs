//! Memo Cloud - document-store storage engine
//!
//! Memos live in one collection per signed-in user. The document store keeps
//! a local cache that stays readable while network sync is suspended, merges
//! its own writes into the shared backend document by document, and pushes
//! full ordered snapshots to registered listeners whenever a collection
//! changes, including changes made by other clients.

mod auth;
mod client;
mod document;
mod remote;

pub use auth::{auth_channel, AuthHandle, AuthState};
pub use client::CloudStorageClient;
pub use document::{Document, DocumentStore, Listener, StoredDocument};
