pub mod cache;
pub mod clock;
pub mod config;
pub mod locale;
pub mod metrics;
pub mod movie;
pub mod overlay;
pub mod query;
pub mod testing;
pub mod views;

pub use cache::{
    CatalogCache, CatalogEvent, CatalogService, LoadPhase, PageOutcome, PendingRequestGroup,
    RefreshOutcome, SearchResults, SearchSource, SyncError, SyncState, SyncStatus,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use locale::{LocaleSource, StaticLocale};
pub use movie::Movie;
pub use overlay::{OverlayError, OverlaySnapshot, OverlayStore, SqliteOverlayStore};
pub use query::{CatalogSource, QueryClient, QueryError};
