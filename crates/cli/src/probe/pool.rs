use std::collections::HashMap;
use std::time::Duration;

use common::Error;
use reqwest::{Client, Url};
use tokio::sync::Mutex;

const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_IDLE_PER_ORIGIN: usize = 32;

/// Pool key: one entry per (scheme, host, port).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Origin {
    pub fn parse(url: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;
        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host: host.to_string(),
            port,
        })
    }
}

/// Keep-alive sockets grouped per origin. Each origin gets its own HTTP/1
/// client so a socket only ever carries one in-flight request.
#[derive(Default)]
pub struct KeepAlivePool {
    clients: Mutex<HashMap<Origin, Client>>,
}

impl KeepAlivePool {
    pub async fn client_for(&self, url: &str) -> Result<Client, Error> {
        let origin = Origin::parse(url)?;
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&origin) {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .http1_only()
            .pool_idle_timeout(IDLE_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_ORIGIN)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(scheme=%origin.scheme, host=%origin.host, port=origin.port, "opened keep-alive origin");
        clients.insert(origin, client.clone());
        Ok(client)
    }

    /// Drops every origin and returns how many there were. Idle sockets
    /// close once in-flight requests finish.
    pub async fn destroy(&self) -> usize {
        let mut clients = self.clients.lock().await;
        let closed = clients.len();
        clients.clear();
        closed
    }
}
