use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const SEPARATOR: char = '_';

/// Canonical identifier for the conversation between two participants.
///
/// Derived by normalizing both identities to lowercase hyphenated UUID form,
/// sorting lexicographically, and joining with `_`. The same pair always maps
/// to the same key regardless of which side initiated, so one shared thread
/// row serves both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadKey(String);

impl ThreadKey {
    /// Resolve the key for a pair of already-validated identities.
    pub fn for_pair(a: Uuid, b: Uuid) -> Self {
        let mut parts = [a.to_string(), b.to_string()];
        parts.sort();
        Self(format!("{}{}{}", parts[0], SEPARATOR, parts[1]))
    }

    /// Resolve the key from raw identity tokens, e.g. path or query input
    /// that has not been through typed deserialization yet.
    pub fn parse_pair(a: &str, b: &str) -> AppResult<Self> {
        let a = normalize(a)?;
        let b = normalize(b)?;
        Ok(Self::for_pair(a, b))
    }

    /// Rehydrate a key read back from the store. Stored keys were canonical
    /// at write time, so no re-validation happens here.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two participants encoded in the key, in canonical (sorted) order.
    pub fn participants(&self) -> AppResult<(Uuid, Uuid)> {
        let (a, b) = self
            .0
            .split_once(SEPARATOR)
            .ok_or_else(|| AppError::InvalidIdentity(self.0.clone()))?;
        Ok((normalize(a)?, normalize(b)?))
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(token: &str) -> AppResult<Uuid> {
    Uuid::parse_str(token.trim())
        .map_err(|_| AppError::InvalidIdentity(format!("malformed identity token: {token:?}")))
}
