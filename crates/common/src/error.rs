use thiserror::Error;

use crate::history::RollingStats;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown provider `{0}`")]
    UnknownProvider(String),
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    #[error("invalid export target `{0}`")]
    InvalidExportTarget(String),
    #[error("no API credential configured for any provider")]
    NoCredentials,
    #[error("an interactive terminal is required")]
    NotATerminal,
    #[error("invalid probe url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("no reachable entity")]
    NoReachableEntity,
    #[error("catalog unavailable: {0}")]
    Catalog(String),
    /// The rolling snapshot no longer matches a rescan of the retained pings.
    #[error("metrics cache diverged: cached {cached:?}, rescan {expected:?}")]
    CacheDivergence {
        cached: RollingStats,
        expected: RollingStats,
    },
}
