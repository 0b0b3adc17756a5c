//! Identifier types for the on-ramp.
//!
//! Both identifiers are ULIDs: opaque to callers, unique, and ordered by
//! creation time so storage indexes iterate chronologically.
//!
//! ULIDs minted in the same millisecond are only ordered if they come from
//! one monotonic generator, so every id in the process is drawn from a
//! shared [`ulid::Generator`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock, PoisonError};
use ulid::{Generator, Ulid};

/// Process-wide id source. `last` never moves backwards, so ids and the
/// timestamps handed out with them sort the same way.
struct IdClock {
    generator: Generator,
    last: DateTime<Utc>,
}

impl IdClock {
    fn next(&mut self, now: DateTime<Utc>) -> (Ulid, DateTime<Utc>) {
        let at = now.max(self.last);
        self.last = at;
        let ulid = self
            .generator
            .generate_from_datetime(at.into())
            // 2^80 ids in one millisecond; fall back to an unordered id.
            .unwrap_or_else(|_| Ulid::from_datetime(at.into()));
        (ulid, at)
    }
}

fn next_ulid(now: DateTime<Utc>) -> (Ulid, DateTime<Utc>) {
    static CLOCK: OnceLock<Mutex<IdClock>> = OnceLock::new();
    CLOCK
        .get_or_init(|| {
            Mutex::new(IdClock {
                generator: Generator::new(),
                last: DateTime::<Utc>::MIN_UTC,
            })
        })
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next(now)
}

/// A transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(Ulid);

impl TransactionId {
    /// Generate a new `TransactionId` with the current timestamp.
    #[must_use]
    pub fn generate() -> Self {
        Self::issue(Utc::now()).0
    }

    /// Generate an id along with its creation instant.
    ///
    /// The instant is `now`, raised if needed so that it is never earlier
    /// than one already issued: later ids always carry later-or-equal
    /// instants.
    #[must_use]
    pub fn issue(now: DateTime<Utc>) -> (Self, DateTime<Utc>) {
        let (ulid, at) = next_ulid(now);
        (Self(ulid), at)
    }

    /// Return the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> &Ulid {
        &self.0
    }

    /// Return the bytes of the ULID (16 bytes).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Create a `TransactionId` from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| IdError::InvalidTransactionId(s.to_string()))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0.to_string()
    }
}

/// A payment session identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(Ulid);

impl SessionId {
    /// Generate a new `SessionId` with the current timestamp.
    #[must_use]
    pub fn generate() -> Self {
        Self(next_ulid(Utc::now()).0)
    }

    /// Return the bytes of the ULID (16 bytes).
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_bytes()
    }

    /// Create a `SessionId` from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }
}

impl FromStr for SessionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|_| IdError::InvalidSessionId(s.to_string()))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid transaction id.
    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),

    /// The input is not a valid session id.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_serde_json() {
        let id = TransactionId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: TransactionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn transaction_ids_sort_by_creation() {
        let ids: Vec<_> = (0..1_000).map(|_| TransactionId::generate()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_bytes() < pair[1].to_bytes());
        }
    }

    #[test]
    fn issued_instants_never_go_backwards() {
        let now = Utc::now();
        let (first, first_at) = TransactionId::issue(now);
        let (second, second_at) = TransactionId::issue(now - chrono::Duration::seconds(5));
        assert!(first < second);
        assert!(second_at >= first_at);
    }

    #[test]
    fn ids_from_many_threads_are_unique() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..250)
                        .map(|_| TransactionId::generate())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 1_000);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = "not-a-ulid".parse::<TransactionId>().unwrap_err();
        assert_eq!(err, IdError::InvalidTransactionId("not-a-ulid".into()));
        assert!("also bad".parse::<SessionId>().is_err());
    }
}
