use std::time::Duration;

/*----- */
// Backoff
/*----- */
// Exponential delay policy shared by socket reconnects and venue bootstrap retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial_ms: u64,
    pub multiplier: u64,
    pub max_ms: u64,
}

impl Backoff {
    /// Socket reconnect: 1s doubling to 30s.
    pub const RECONNECT: Backoff = Backoff {
        initial_ms: 1_000,
        multiplier: 2,
        max_ms: 30_000,
    };

    /// Venue bootstrap retry: 15s doubling to 5min.
    pub const BOOTSTRAP: Backoff = Backoff {
        initial_ms: 15_000,
        multiplier: 2,
        max_ms: 300_000,
    };

    /// Delay before retry number `attempt` (zero based).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let factor = self.multiplier.saturating_pow(attempt);
        self.initial_ms.saturating_mul(factor).min(self.max_ms)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms(attempt))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_backoff_delays() {
        struct TestCase {
            name: &'static str,
            policy: Backoff,
            attempt: u32,
            expected_ms: u64,
        }

        let cases = vec![
            TestCase {
                name: "first reconnect",
                policy: Backoff::RECONNECT,
                attempt: 0,
                expected_ms: 1_000,
            },
            TestCase {
                name: "doubling",
                policy: Backoff::RECONNECT,
                attempt: 3,
                expected_ms: 8_000,
            },
            TestCase {
                name: "reconnect cap",
                policy: Backoff::RECONNECT,
                attempt: 5,
                expected_ms: 30_000,
            },
            TestCase {
                name: "huge attempt does not overflow",
                policy: Backoff::RECONNECT,
                attempt: 200,
                expected_ms: 30_000,
            },
            TestCase {
                name: "bootstrap second retry",
                policy: Backoff::BOOTSTRAP,
                attempt: 1,
                expected_ms: 30_000,
            },
            TestCase {
                name: "bootstrap cap",
                policy: Backoff::BOOTSTRAP,
                attempt: 6,
                expected_ms: 300_000,
            },
        ];

        for case in cases {
            assert_eq!(
                case.policy.delay_ms(case.attempt),
                case.expected_ms,
                "{}",
                case.name
            );
        }
    }
}
