use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity of a probed entity: the provider it is served by plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub provider: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.id)
    }
}

/// Quality tier supplied by the catalog. Declaration order is best-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "S+")]
    SPlus,
    #[serde(rename = "S")]
    S,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
}

impl Tier {
    pub const ALL: [Tier; 8] = [
        Tier::SPlus,
        Tier::S,
        Tier::APlus,
        Tier::A,
        Tier::AMinus,
        Tier::BPlus,
        Tier::B,
        Tier::C,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Tier::SPlus => "S+",
            Tier::S => "S",
            Tier::APlus => "A+",
            Tier::A => "A",
            Tier::AMinus => "A-",
            Tier::BPlus => "B+",
            Tier::B => "B",
            Tier::C => "C",
        }
    }

    /// 0 for the best tier.
    pub fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Tier::ALL
            .into_iter()
            .find(|t| t.label() == wanted)
            .ok_or_else(|| format!("unknown tier `{s}`"))
    }
}

/// Display metadata supplied by the catalog; the probing core only reads
/// [`Meta::priority_cmp`] from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub label: String,
    pub tier: Tier,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub context: Option<String>,
}

impl Meta {
    /// Higher-priority entities order first: better tier, then higher score.
    pub fn priority_cmp(&self, other: &Meta) -> Ordering {
        self.tier.cmp(&other.tier).then_with(|| {
            let a = self.score.unwrap_or(0.0);
            let b = other.score.unwrap_or(0.0);
            b.partial_cmp(&a).unwrap_or(Ordering::Equal)
        })
    }
}

/// An endpoint family sharing one base URL and credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub key: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub key: EntityKey,
    pub meta: Meta,
}

/// Classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PingCode {
    Http(u16),
    /// No response status before the deadline; renders as `000`.
    Timeout,
    /// Connection-level failure; renders as `ERR`.
    Error,
}

impl PingCode {
    /// Counts toward uptime and latency.
    pub fn is_ok(self) -> bool {
        self == PingCode::Http(200)
    }

    /// The endpoint answered, even if it refused our credential.
    pub fn is_reachable(self) -> bool {
        matches!(self, PingCode::Http(200) | PingCode::Http(401))
    }
}

impl fmt::Display for PingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingCode::Http(status) => write!(f, "{status:03}"),
            PingCode::Timeout => f.write_str("000"),
            PingCode::Error => f.write_str("ERR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Pending,
    Up,
    NoAuth,
    RateLimit,
    NotFound,
    Unavailable,
    Timeout,
    Down,
}

impl Status {
    pub fn from_code(code: PingCode) -> Status {
        match code {
            PingCode::Http(200) => Status::Up,
            PingCode::Http(401) | PingCode::Http(403) => Status::NoAuth,
            PingCode::Http(429) => Status::RateLimit,
            PingCode::Http(404) => Status::NotFound,
            PingCode::Http(502) | PingCode::Http(503) => Status::Unavailable,
            PingCode::Timeout => Status::Timeout,
            PingCode::Http(_) | PingCode::Error => Status::Down,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Up => "up",
            Status::NoAuth => "noauth",
            Status::RateLimit => "ratelimit",
            Status::NotFound => "notfound",
            Status::Unavailable => "unavailable",
            Status::Timeout => "timeout",
            Status::Down => "down",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of one probe. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingOutcome {
    pub code: PingCode,
    pub elapsed_ms: u64,
    pub diagnostic: Option<String>,
}

impl PingOutcome {
    pub fn new(code: PingCode, elapsed_ms: u64) -> Self {
        Self {
            code,
            elapsed_ms,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_as_three_characters() {
        assert_eq!(PingCode::Http(200).to_string(), "200");
        assert_eq!(PingCode::Timeout.to_string(), "000");
        assert_eq!(PingCode::Error.to_string(), "ERR");
    }

    #[test]
    fn status_table_defaults_to_down() {
        assert_eq!(Status::from_code(PingCode::Http(200)), Status::Up);
        assert_eq!(Status::from_code(PingCode::Http(401)), Status::NoAuth);
        assert_eq!(Status::from_code(PingCode::Http(429)), Status::RateLimit);
        assert_eq!(Status::from_code(PingCode::Http(404)), Status::NotFound);
        assert_eq!(Status::from_code(PingCode::Http(503)), Status::Unavailable);
        assert_eq!(Status::from_code(PingCode::Timeout), Status::Timeout);
        assert_eq!(Status::from_code(PingCode::Http(500)), Status::Down);
        assert_eq!(Status::from_code(PingCode::Http(418)), Status::Down);
        assert_eq!(Status::from_code(PingCode::Error), Status::Down);
    }

    #[test]
    fn only_200_and_401_are_reachable() {
        assert!(PingCode::Http(200).is_reachable());
        assert!(PingCode::Http(401).is_reachable());
        assert!(!PingCode::Http(429).is_reachable());
        assert!(!PingCode::Timeout.is_reachable());
        assert!(PingCode::Http(200).is_ok());
        assert!(!PingCode::Http(401).is_ok());
    }

    #[test]
    fn tier_parses_labels() {
        assert_eq!("s+".parse::<Tier>(), Ok(Tier::SPlus));
        assert_eq!("A-".parse::<Tier>(), Ok(Tier::AMinus));
        assert!("Z".parse::<Tier>().is_err());
        assert!(Tier::SPlus < Tier::C);
    }

    #[test]
    fn priority_prefers_tier_then_score() {
        let meta = |tier, score| Meta {
            label: String::new(),
            tier,
            score,
            context: None,
        };
        assert_eq!(
            meta(Tier::S, Some(10.0)).priority_cmp(&meta(Tier::A, Some(90.0))),
            Ordering::Less
        );
        assert_eq!(
            meta(Tier::A, Some(90.0)).priority_cmp(&meta(Tier::A, Some(10.0))),
            Ordering::Less
        );
    }
}
