mod best;
mod dashboard;
mod list;

use std::sync::{Arc, Mutex};

use common::Error;

use crate::config::{Config, CredentialStore};
use crate::probe::{HttpProber, ProbeContext, Session, SessionConfig};

pub use best::best;
pub use dashboard::dashboard;
pub use list::list;

/// Fresh session over the configured catalog, probing over HTTP.
fn probe_context(cfg: &Config, credentials: Arc<CredentialStore>) -> ProbeContext {
    ProbeContext {
        session: Arc::new(Mutex::new(Session::new(SessionConfig::default()))),
        prober: Arc::new(HttpProber::new()),
        catalog: Arc::new(cfg.catalog()),
        credentials,
    }
}

/// Probing without any credential only ever yields 401s.
fn require_credentials(cfg: &Config, credentials: &CredentialStore) -> Result<(), Error> {
    let keys: Vec<String> = cfg.providers.iter().map(|p| p.key.clone()).collect();
    if credentials.has_any(&keys) {
        Ok(())
    } else {
        Err(Error::NoCredentials)
    }
}
