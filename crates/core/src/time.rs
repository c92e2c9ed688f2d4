use chrono::{DateTime, Duration, Utc};

/// Time source injected into cache services.
///
/// Freshness decisions (TTL checks, snapshot timestamps) go through a
/// `Clock` instead of `Utc::now()` so they can be pinned in tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    /// Real system time.
    #[default]
    System,
    /// Frozen at a specific instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock backed by the system time.
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    /// Returns a clock frozen at `at`.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// The current instant according to this clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Moves a fixed clock forward by `delta`. No effect on `System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(at) = self {
            *at += delta;
        }
    }
}

/// Deterministic instant for tests (2024-09-01T08:00:00Z).
///
/// # Panics
///
/// Panics if the constant timestamp is unrepresentable, which it is not.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_725_177_600, 0).expect("constant timestamp is valid")
}
