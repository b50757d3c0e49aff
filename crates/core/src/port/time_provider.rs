// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Fixed-clock provider for deterministic tests
pub struct FixedTimeProvider(pub std::sync::atomic::AtomicI64);

impl FixedTimeProvider {
    pub fn new(now_millis: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(now_millis))
    }

    pub fn advance(&self, delta_millis: i64) {
        self.0
            .fetch_add(delta_millis, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
