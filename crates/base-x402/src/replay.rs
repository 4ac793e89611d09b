use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::eip3009::unix_now;
use crate::payment::{PaymentPayload, PaymentProof, SchemeKind};

/// Identity of a payment proof for at-most-once use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProofKey {
    TxHash(B256),
    Authorization { from: Address, nonce: B256 },
}

impl ProofKey {
    /// Derive the key from a client payload, plus the unix time after which
    /// the proof can no longer verify. Authorizations expire at `validBefore`;
    /// tx hashes never do. `None` when the payload does not carry a parseable
    /// proof (it will fail verification anyway).
    fn with_expiry(payload: &PaymentPayload) -> Option<(Self, Option<u64>)> {
        let scheme = SchemeKind::resolve(payload.scheme.as_deref())?;
        match payload.proof(scheme).ok()? {
            PaymentProof::TxHash { tx_hash } => {
                Some((Self::TxHash(tx_hash.trim().parse().ok()?), None))
            }
            PaymentProof::Authorization { authorization, .. } => {
                let valid_before: U256 = authorization.valid_before.trim().parse().ok()?;
                let key = Self::Authorization {
                    from: authorization.from.trim().parse().ok()?,
                    nonce: authorization.nonce.trim().parse().ok()?,
                };
                Some((key, Some(u64::try_from(valid_before).unwrap_or(u64::MAX))))
            }
        }
    }
}

/// In-process set of consumed proofs. Lost on restart.
///
/// Authorization keys are dropped by [`purge_expired`](Self::purge_expired)
/// once their `validBefore` has passed, since the signature can no longer
/// verify. Tx-hash keys stay for the life of the process.
#[derive(Debug, Default)]
pub struct ConsumedProofs {
    seen: DashMap<ProofKey, Option<u64>>,
}

impl ConsumedProofs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `key` as used until `expires_at` (unix seconds, `None`
    /// for never). Returns `false` if it already was.
    pub fn claim(&self, key: ProofKey, expires_at: Option<u64>) -> bool {
        match self.seen.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(expires_at);
                true
            }
        }
    }

    /// Claim the proof carried by `payload`. `None` when it has no usable key.
    pub fn claim_payload(&self, payload: &PaymentPayload) -> Option<bool> {
        let (key, expires_at) = ProofKey::with_expiry(payload)?;
        Some(self.claim(key, expires_at))
    }

    /// Drop entries whose expiry is at or before `now`. Returns the number removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let before = self.seen.len();
        self.seen
            .retain(|_, expires_at| !matches!(expires_at, Some(at) if *at <= now));
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Periodically purge expired authorizations from `store`.
pub fn spawn_purge(store: Arc<ConsumedProofs>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired(unix_now());
            if purged > 0 {
                tracing::debug!(purged, remaining = store.len(), "purged expired payment proofs");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::Eip3009Authorization;

    const HASH: &str = "0x6b1b6bfa0e3d23f3e8a1b8a4c3e1d1a2b3c4d5e6f708192a3b4c5d6e7f809102";

    fn authorization(valid_before: &str) -> PaymentPayload {
        let auth = Eip3009Authorization {
            from: "0x2222222222222222222222222222222222222222".into(),
            to: "0x1111111111111111111111111111111111111111".into(),
            value: "100".into(),
            valid_after: "0".into(),
            valid_before: valid_before.into(),
            nonce: format!("0x{}", "ab".repeat(32)),
        };
        PaymentPayload::exact("base", &auth, "0x00")
    }

    #[test]
    fn test_claim_is_at_most_once() {
        let store = ConsumedProofs::new();
        let key = ProofKey::TxHash(HASH.parse().unwrap());
        assert!(store.claim(key.clone(), None));
        assert!(!store.claim(key, None));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let store = Arc::new(ConsumedProofs::new());
        let key = ProofKey::TxHash(HASH.parse().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || store.claim(key, None))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_claim_is_case_insensitive() {
        let store = ConsumedProofs::new();
        let lower = PaymentPayload::tx_hash("base", HASH);
        let upper = PaymentPayload::tx_hash("base", &HASH.to_uppercase().replace("0X", "0x"));
        assert_eq!(store.claim_payload(&lower), Some(true));
        assert_eq!(store.claim_payload(&upper), Some(false));
    }

    #[test]
    fn test_key_from_unknown_scheme_is_none() {
        let mut payload = PaymentPayload::tx_hash("base", HASH);
        payload.scheme = Some("upto".into());
        assert!(ConsumedProofs::new().claim_payload(&payload).is_none());
    }

    #[test]
    fn test_authorization_expires_at_valid_before() {
        let store = ConsumedProofs::new();
        let payload = authorization("1000");
        assert_eq!(store.claim_payload(&payload), Some(true));
        assert_eq!(store.claim_payload(&payload), Some(false));

        assert_eq!(store.purge_expired(999), 0);
        assert_eq!(store.purge_expired(1000), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_tx_hash_survives_purge() {
        let store = ConsumedProofs::new();
        store.claim_payload(&PaymentPayload::tx_hash("base", HASH));
        store.claim_payload(&authorization("10"));

        assert_eq!(store.purge_expired(u64::MAX), 1);
        assert_eq!(
            store.claim_payload(&PaymentPayload::tx_hash("base", HASH)),
            Some(false)
        );
    }

    #[test]
    fn test_oversized_valid_before_never_expires() {
        let store = ConsumedProofs::new();
        store.claim_payload(&authorization(&U256::MAX.to_string()));
        assert_eq!(store.purge_expired(u64::MAX - 1), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_task_drops_expired_entries() {
        let store = Arc::new(ConsumedProofs::new());
        store.claim_payload(&authorization("1"));
        store.claim_payload(&PaymentPayload::tx_hash("base", HASH));

        let task = spawn_purge(store.clone(), Duration::from_millis(10));
        for _ in 0..50 {
            if store.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(store.len(), 1);
    }
}
