use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use uuid::Uuid;

/// Identity of a user of the system, either as a secret owner or as a
/// custodian. It is the identifier used by the messaging transport.
pub type UserId = u64;

/// Opaque, unique identifier of a secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretId(Uuid);

impl SecretId {
    /// Returns a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The first 8 characters, enough to tell secrets of a single owner apart
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SecretId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Lifecycle of a secret. A secret is `Pending` from its creation until all
/// of its shares are assigned, at which point it becomes `Distributed`.
/// `Compromised` is terminal and only reachable through an explicit status
/// update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretStatus {
    Pending,
    Distributed,
    Compromised,
}

impl SecretStatus {
    /// Checks whether a secret may move from this status to `next`
    pub fn can_become(self, next: SecretStatus) -> bool {
        use SecretStatus::*;
        matches!(
            (self, next),
            (Pending, Distributed) | (Pending, Compromised) | (Distributed, Compromised)
        )
    }
}

impl fmt::Display for SecretStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            SecretStatus::Pending => "pending",
            SecretStatus::Distributed => "distributed",
            SecretStatus::Compromised => "compromised",
        };
        f.write_str(s)
    }
}

/// The metadata of a shared secret. The secret itself is never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub secret_id: SecretId,
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    pub total_shares: usize,
    pub threshold: usize,
    pub created_at: DateTime<Utc>,
    pub status: SecretStatus,
}

/// What the owner provides when a secret is recorded.
#[derive(Clone, Debug)]
pub struct NewSecret {
    pub owner_id: UserId,
    pub owner_name: Option<String>,
    pub total_shares: usize,
    pub threshold: usize,
}

/// A party holding shares on behalf of secret owners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Custodian {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The encoded share held for each secret
    #[serde(default)]
    pub shards: BTreeMap<SecretId, String>,
    #[serde(default)]
    pub total_shards_held: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assignment_date: Option<DateTime<Utc>>,
}

impl Custodian {
    pub fn new(id: UserId, username: Option<String>) -> Self {
        Self {
            id,
            username,
            shards: BTreeMap::new(),
            total_shards_held: 0,
            last_assignment_date: None,
        }
    }

    pub fn holds(&self, secret_id: &SecretId) -> bool {
        self.shards.contains_key(secret_id)
    }
}
