// ID Provider Port (for deterministic testing)

use crate::domain::TransactionId;

/// ID provider interface (allows deterministic ids in tests)
pub trait IdProvider: Send + Sync {
    /// Generate a new globally unique transaction id
    fn next_id(&self) -> TransactionId;
}

/// UUID v4 provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn next_id(&self) -> TransactionId {
        TransactionId::from_uuid(uuid::Uuid::new_v4())
    }
}

/// Counter-based provider for deterministic tests
pub struct SequentialIdProvider(std::sync::atomic::AtomicU64);

impl SequentialIdProvider {
    pub fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(1))
    }
}

impl Default for SequentialIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdProvider for SequentialIdProvider {
    fn next_id(&self) -> TransactionId {
        let counter = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        TransactionId::from_uuid(uuid::Uuid::from_u128(counter as u128))
    }
}
