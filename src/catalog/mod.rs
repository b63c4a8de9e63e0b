//! Session catalog
//!
//! This module provides the durable history of recorded sessions:
//! - `Session` records with a tri-state analysis status
//! - `Catalog`: newest-first, id-unique, persisted after every mutation
//! - `KeyValueStore` backends for the persisted blob

mod catalog;
mod session;
mod store;

pub use catalog::{Catalog, CatalogSummary, CATALOG_KEY};
pub use session::{format_duration, AnalysisStatus, Session, SessionId};
pub use store::{FileStore, KeyValueStore, MemoryStore};
