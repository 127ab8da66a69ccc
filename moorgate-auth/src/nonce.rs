//! Nonce issuance and single-use consumption.
//!
//! Every challenge embeds a nonce scoped to the requesting account. The
//! nonce is minted when the challenge is built and burned exactly once
//! when a signed challenge passes validation. Consumption is atomic:
//! under concurrent submission of the same challenge, one caller wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;

/// How long an issued nonce stays consumable.
pub const NONCE_TTL: Duration = Duration::from_secs(300);

/// The nonce store itself failed. Distinct from "nonce not consumable",
/// which is an ordinary `Ok(false)` from [`NonceStore::consume`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum NonceStoreError {
    /// The backing store could not be reached or queried.
    #[error("nonce store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for issued nonces, keyed by (subject, nonce).
///
/// Implementations must make [`consume`](NonceStore::consume) atomic:
/// for a given record, at most one call may ever return `Ok(true)`.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Mints a fresh nonce for `subject` and records it as unused.
    async fn issue(&self, subject: &str) -> Result<String, NonceStoreError>;

    /// Burns the record for (`subject`, `nonce`).
    ///
    /// Returns `Ok(true)` exactly once per live record. Unknown, expired,
    /// and already-used records all return `Ok(false)`; callers must not
    /// distinguish between those cases.
    async fn consume(&self, subject: &str, nonce: &str) -> Result<bool, NonceStoreError>;
}

/// Generates a nonce value: a random 64-bit integer in decimal form.
#[must_use]
pub fn generate_nonce() -> String {
    OsRng.next_u64().to_string()
}

struct NonceRecord {
    issued_at: Instant,
    used: bool,
}

/// In-memory [`NonceStore`] for single-process deployments and tests.
///
/// - Lock-free concurrent access via `DashMap`.
/// - Memory-bounded: expired records are swept every 1000 issuances and
///   a single record is evicted when at capacity.
/// - Atomic consumption via the map's entry API.
pub struct MemoryNonceStore {
    records: DashMap<(String, String), NonceRecord>,
    ttl: Duration,
    max_entries: usize,
    issue_counter: AtomicU64,
}

impl MemoryNonceStore {
    /// Creates a store whose records expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            records: DashMap::with_capacity(max_entries / 4),
            ttl,
            max_entries,
            issue_counter: AtomicU64::new(0),
        }
    }

    /// Drops expired records. Called automatically on a cadence; exposed
    /// for callers that want deterministic sweeps.
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.records
            .retain(|_, r| now.duration_since(r.issued_at) < self.ttl);
    }

    /// Number of live records, used and unused.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn issue(&self, subject: &str) -> Result<String, NonceStoreError> {
        let nonce = generate_nonce();
        let record = NonceRecord {
            issued_at: Instant::now(),
            used: false,
        };
        self.records
            .insert((subject.to_string(), nonce.clone()), record);

        let count = self.issue_counter.fetch_add(1, Ordering::Relaxed);
        if count % 1000 == 0 {
            self.cleanup_expired();
        }
        if self.records.len() > self.max_entries {
            let oldest = self.records.iter().next().map(|e| e.key().clone());
            if let Some(k) = oldest {
                self.records.remove(&k);
            }
        }

        Ok(nonce)
    }

    async fn consume(&self, subject: &str, nonce: &str) -> Result<bool, NonceStoreError> {
        let key = (subject.to_string(), nonce.to_string());
        let now = Instant::now();

        // The entry API holds the shard lock across check and flip, so
        // two racing callers cannot both observe an unused record.
        let consumed = match self.records.entry(key) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if now.duration_since(record.issued_at) >= self.ttl || record.used {
                    false
                } else {
                    record.used = true;
                    true
                }
            }
            Entry::Vacant(_) => false,
        };
        Ok(consumed)
    }
}
