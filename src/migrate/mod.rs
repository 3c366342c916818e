//! Legacy data migration
//!
//! Older app versions kept every memo as one JSON array under a single key
//! of a flat key-value store. On first start the facade replays that list
//! into the active engine and clears the key.

mod legacy;
mod migrator;

pub use legacy::{FileLegacyStore, LegacyStore, MemoryLegacyStore};
pub use migrator::{LegacyMigrator, MigrationReport, LEGACY_MEMOS_KEY};
