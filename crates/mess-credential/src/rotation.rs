//! # Rotation Registry
//!
//! The process-wide versioned secret epoch. Bumping the epoch is the single
//! global action that invalidates every credential minted under an earlier
//! epoch, regardless of its per-student nonce — the blunt path for a
//! suspected system-wide key compromise. (The cheap, targeted path is
//! regenerating one student's nonce; see `mess-credential::secret`.)
//!
//! ## Concurrency
//!
//! The registry is shared (`Arc<RotationRegistry>`) between the admission
//! pipeline and the admin surface. A verification takes one [`snapshot`]
//! at decision entry and never re-reads: a rotation completing mid-decision
//! is observed by the *next* scan, not the in-flight one. Eventual, not
//! immediate, visibility is the contract.
//!
//! [`snapshot`]: RotationRegistry::snapshot

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::secret::SecretKey;

/// The monotonic rotation counter. Tokens embed the epoch they were minted
/// under; verification rejects any token whose epoch is not current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RotationEpoch(pub u64);

impl RotationEpoch {
    /// The epoch a fresh deployment starts at.
    pub const INITIAL: RotationEpoch = RotationEpoch(1);

    /// The inner counter value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The epoch after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for RotationEpoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "epoch:{}", self.0)
    }
}

/// A point-in-time read of the registry: the epoch and key a single
/// admission decision verifies against.
#[derive(Debug, Clone)]
pub struct KeySnapshot {
    /// The epoch current when the snapshot was taken.
    pub epoch: RotationEpoch,
    /// The active secret key.
    pub key: SecretKey,
}

struct RegistryState {
    epoch: RotationEpoch,
    key: SecretKey,
}

/// Process-wide mutable `{epoch, key}` state, injected into the admission
/// pipeline and the admin surface at construction. There are no ambient
/// lookups: rotation is an explicit, test-visible call.
pub struct RotationRegistry {
    state: RwLock<RegistryState>,
}

impl RotationRegistry {
    /// Create a registry at [`RotationEpoch::INITIAL`] with the given key.
    pub fn new(key: SecretKey) -> Self {
        Self::with_epoch(key, RotationEpoch::INITIAL)
    }

    /// Create a registry at a specific epoch (restarts, fixtures).
    pub fn with_epoch(key: SecretKey, epoch: RotationEpoch) -> Self {
        Self {
            state: RwLock::new(RegistryState { epoch, key }),
        }
    }

    /// The current epoch.
    pub fn current_epoch(&self) -> RotationEpoch {
        self.state.read().epoch
    }

    /// Read the epoch and key together, atomically.
    ///
    /// This is the only read path the admission pipeline uses: one snapshot
    /// per decision, taken at entry.
    pub fn snapshot(&self) -> KeySnapshot {
        let guard = self.state.read();
        KeySnapshot {
            epoch: guard.epoch,
            key: guard.key.clone(),
        }
    }

    /// Atomically increment the epoch, invalidating every credential minted
    /// under the previous one. Returns the new epoch.
    pub fn rotate(&self) -> RotationEpoch {
        let mut guard = self.state.write();
        guard.epoch = guard.epoch.next();
        tracing::warn!(epoch = guard.epoch.value(), "rotation epoch bumped; all outstanding credentials invalidated");
        guard.epoch
    }
}

impl std::fmt::Debug for RotationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationRegistry")
            .field("epoch", &self.state.read().epoch)
            .field("key", &"<redacted>")
            .finish()
    }
}
