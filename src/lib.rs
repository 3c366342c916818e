//! Memo Sync - storage facade over cloud and on-device engines
//!
//! The application talks to one [`StorageFacade`]. It prefers the cloud
//! engine, falls back to a platform-appropriate local engine, and carries
//! memos over from the legacy flat store on first start.

pub mod config;
pub mod engines;
pub mod facade;
pub mod migrate;

pub use config::AppConfig;
pub use engines::{ConfiguredEngines, EngineProvider, Platform};
pub use facade::{FacadeState, StorageFacade};
pub use migrate::{
    FileLegacyStore, LegacyMigrator, LegacyStore, MemoryLegacyStore, MigrationReport,
    LEGACY_MEMOS_KEY,
};
