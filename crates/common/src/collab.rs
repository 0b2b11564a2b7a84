use std::collections::HashMap;

use crate::error::Result;
use crate::model::{CatalogEntry, Provider};

/// Source of probe-eligible entities. Called on every refresh; the caller
/// merges the answer into its live state by identity.
pub trait Catalog: Send + Sync {
    fn providers(&self) -> Vec<Provider>;
    fn entries(&self) -> Result<Vec<CatalogEntry>>;
}

/// Resolves the bearer credential for a provider, if any.
pub trait CredentialResolver: Send + Sync {
    fn credential(&self, provider: &str) -> Option<String>;
}

impl CredentialResolver for HashMap<String, String> {
    fn credential(&self, provider: &str) -> Option<String> {
        self.get(provider).filter(|k| !k.is_empty()).cloned()
    }
}

/// A catalog fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    providers: Vec<Provider>,
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(providers: Vec<Provider>, entries: Vec<CatalogEntry>) -> Self {
        Self { providers, entries }
    }
}

impl Catalog for StaticCatalog {
    fn providers(&self) -> Vec<Provider> {
        self.providers.clone()
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }
}
