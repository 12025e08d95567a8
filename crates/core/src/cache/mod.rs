//! Catalog cache, backfill protocol and the service that owns them.

mod pending;
mod service;
mod store;
mod types;

pub use pending::PendingRequestGroup;
pub use service::CatalogService;
pub use store::CatalogCache;
pub use types::{
    CatalogEvent, LoadPhase, PageOutcome, RefreshOutcome, SearchResults, SearchSource, SyncError,
    SyncState, SyncStatus,
};
