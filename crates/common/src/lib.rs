//! Shared data types for pulseboard: probed entity identity, catalog
//! descriptors, ping classification and the bounded ping history with its
//! rolling metrics cache.

mod collab;
mod error;
mod history;
mod model;

pub use collab::{Catalog, CredentialResolver, StaticCatalog};
pub use error::{Error, Result};
pub use history::{PingHistory, RollingStats, DEFAULT_HISTORY_CAP};
pub use model::{CatalogEntry, EntityKey, Meta, PingCode, PingOutcome, Provider, Status, Tier};
