mod database;
mod object_store;

pub use database::KvDatabase;
pub use object_store::StoredRecord;
