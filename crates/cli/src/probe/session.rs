use std::collections::HashMap;
use std::time::Duration;

use common::{
    Catalog, CatalogEntry, CredentialResolver, EntityKey, Error, Meta, PingCode, PingHistory,
    PingOutcome, Provider, RollingStats, Status, DEFAULT_HISTORY_CAP,
};
use tracing::{debug, warn};

use super::backoff::{Backoff, BackoffPolicy};
use super::epoch::{SeqGuard, Ticket};
use super::prober::ProbeTarget;

/// Concurrency and deadline for one class of probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassConfig {
    pub concurrency: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub history_cap: usize,
    /// Entities without any ping yet: wide and fast-failing.
    pub first_contact: PassConfig,
    /// Entities with history: narrower and patient.
    pub steady: PassConfig,
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            first_contact: PassConfig {
                concurrency: 20,
                timeout: Duration::from_millis(2_500),
            },
            steady: PassConfig {
                concurrency: 8,
                timeout: Duration::from_millis(15_000),
            },
            backoff: BackoffPolicy::default(),
        }
    }
}

/// A probed entity and its mutable probe state.
#[derive(Debug, Clone)]
pub struct Entity {
    pub key: EntityKey,
    pub meta: Meta,
    pub history: PingHistory,
    pub status: Status,
    pub last_code: Option<PingCode>,
    pub backoff: Backoff,
    guard: SeqGuard,
}

impl Entity {
    fn new(entry: CatalogEntry, history_cap: usize, epoch: u64) -> Self {
        Self {
            key: entry.key,
            meta: entry.meta,
            history: PingHistory::new(history_cap),
            status: Status::Pending,
            last_code: None,
            backoff: Backoff::default(),
            guard: SeqGuard::new(epoch),
        }
    }

    pub fn stats(&self) -> RollingStats {
        self.history.stats()
    }

    pub fn latest(&self) -> Option<&PingOutcome> {
        self.history.latest()
    }

    fn reset(&mut self, epoch: u64) {
        self.history.clear();
        self.status = Status::Pending;
        self.last_code = None;
        self.backoff.reset();
        self.guard.advance(epoch);
    }
}

#[derive(Debug, Clone)]
pub struct ProbeJob {
    pub key: EntityKey,
    pub round: u64,
    pub ticket: Ticket,
    pub target: ProbeTarget,
}

#[derive(Debug, Clone, Default)]
pub struct RoundPlan {
    pub round: u64,
    pub first_contact: Vec<ProbeJob>,
    pub steady: Vec<ProbeJob>,
    /// Entities sitting out this round on backoff.
    pub skipped: usize,
}

impl RoundPlan {
    pub fn len(&self) -> usize {
        self.first_contact.len() + self.steady.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct ProbeDone {
    pub key: EntityKey,
    pub round: u64,
    pub ticket: Ticket,
    pub outcome: PingOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Applied(Status),
    /// Superseded epoch or out-of-order sequence.
    Stale,
    /// The entity left the catalog while the probe was in flight.
    Vanished,
}

/// Live probing state: entities, the round counter that drives backoff and
/// the epoch counter that drives staleness rejection.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    providers: HashMap<String, Provider>,
    entities: Vec<Entity>,
    index: HashMap<EntityKey, usize>,
    round: u64,
    epoch: u64,
    stale_drops: u64,
    cache_enabled: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            providers: HashMap::new(),
            entities: Vec::new(),
            index: HashMap::new(),
            round: 0,
            epoch: 0,
            stale_drops: 0,
            cache_enabled: true,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stale_drops(&self) -> u64 {
        self.stale_drops
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.index.get(key).map(|&i| &self.entities[i])
    }

    pub fn provider(&self, key: &str) -> Result<&Provider, Error> {
        self.providers
            .get(key)
            .ok_or_else(|| Error::UnknownProvider(key.to_string()))
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    pub fn set_providers(&mut self, providers: Vec<Provider>) {
        self.providers = providers.into_iter().map(|p| (p.key.clone(), p)).collect();
    }

    /// Adopts the catalog's entity list. Survivors keep their probe state
    /// (metadata is refreshed); removed identities are discarded.
    pub fn merge_catalog(&mut self, entries: Vec<CatalogEntry>) {
        let mut previous: HashMap<EntityKey, Entity> = self
            .entities
            .drain(..)
            .map(|e| (e.key.clone(), e))
            .collect();
        self.index.clear();
        for entry in entries {
            if self.index.contains_key(&entry.key) {
                continue;
            }
            let entity = match previous.remove(&entry.key) {
                Some(mut kept) => {
                    kept.meta = entry.meta;
                    kept
                }
                None => {
                    let mut fresh = Entity::new(entry, self.config.history_cap, self.epoch);
                    fresh.history.set_cache_enabled(self.cache_enabled);
                    fresh
                }
            };
            self.index.insert(entity.key.clone(), self.entities.len());
            self.entities.push(entity);
        }
        if !previous.is_empty() {
            debug!(removed = previous.len(), "catalog refresh dropped entities");
        }
    }

    /// Pulls providers and entities from the catalog. A failing catalog
    /// leaves the current state untouched.
    pub fn refresh(&mut self, catalog: &dyn Catalog) {
        match catalog.entries() {
            Ok(entries) => {
                self.set_providers(catalog.providers());
                self.merge_catalog(entries);
            }
            Err(e) => warn!(error=%e, "catalog refresh failed, keeping current entities"),
        }
    }

    /// Starts a new round and decides who gets probed.
    pub fn plan_round(&mut self, credentials: &dyn CredentialResolver) -> RoundPlan {
        self.round += 1;
        let round = self.round;
        let mut plan = RoundPlan {
            round,
            ..RoundPlan::default()
        };
        let mut first: Vec<(usize, ProbeJob)> = Vec::new();

        for (i, entity) in self.entities.iter_mut().enumerate() {
            let Some(provider) = self.providers.get(&entity.key.provider) else {
                continue;
            };
            if entity.backoff.is_skipped(round) {
                plan.skipped += 1;
                continue;
            }
            let first_contact = entity.history.is_empty();
            let pass = if first_contact {
                self.config.first_contact
            } else {
                self.config.steady
            };
            let job = ProbeJob {
                key: entity.key.clone(),
                round,
                ticket: entity.guard.issue(),
                target: ProbeTarget {
                    url: provider.url.clone(),
                    model: entity.key.id.clone(),
                    credential: credentials.credential(&provider.key),
                    timeout: pass.timeout,
                },
            };
            if first_contact {
                first.push((i, job));
            } else {
                plan.steady.push(job);
            }
        }

        let entities = &self.entities;
        first.sort_by(|(a, _), (b, _)| entities[*a].meta.priority_cmp(&entities[*b].meta));
        plan.first_contact = first.into_iter().map(|(_, job)| job).collect();
        plan
    }

    /// Applies a finished probe if it is still current.
    pub fn commit(&mut self, done: ProbeDone) -> Commit {
        let Some(&i) = self.index.get(&done.key) else {
            return Commit::Vanished;
        };
        let policy = self.config.backoff;
        let entity = &mut self.entities[i];
        if done.ticket.epoch != self.epoch || !entity.guard.accept(done.ticket) {
            self.stale_drops += 1;
            debug!(entity=%done.key, epoch=done.ticket.epoch, seq=done.ticket.seq, "dropped stale probe result");
            return Commit::Stale;
        }

        let code = done.outcome.code;
        entity.history.push(done.outcome);
        entity.last_code = Some(code);
        entity.status = Status::from_code(code);
        let was_skipping = entity.backoff.skip_until;
        entity.backoff.record(code, done.round, &policy);
        if entity.backoff.skip_until != was_skipping {
            if let Some(until) = entity.backoff.skip_until {
                debug!(entity=%done.key, failures=entity.backoff.failures, until, "entity backing off");
            }
        }
        Commit::Applied(entity.status)
    }

    /// Invalidates everything in flight and starts every entity over.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        for entity in &mut self.entities {
            entity.reset(self.epoch);
        }
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        for entity in &mut self.entities {
            entity.history.set_cache_enabled(enabled);
        }
    }

    /// Verifies every rolling snapshot against a rescan.
    pub fn check_caches(&self) -> Result<(), Error> {
        self.entities
            .iter()
            .try_for_each(|e| e.history.check_consistency())
    }
}
