use std::time::Duration;

/// Delay schedule for transient-overload retries.
///
/// Two call classes exist, each with its own deliberate policy: the
/// general path uses short fixed delays in increasing order and carries
/// a fallback model, while the narrow no-fallback path uses a doubling
/// schedule starting higher because its calls are rarer and can afford
/// to wait out longer overload windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn fixed(delays: &[Duration]) -> Self {
        Self {
            delays: delays.to_vec(),
        }
    }

    /// General call path: 100 ms, 400 ms, 600 ms.
    pub fn general() -> Self {
        Self::fixed(&[
            Duration::from_millis(100),
            Duration::from_millis(400),
            Duration::from_millis(600),
        ])
    }

    /// Doubling schedule from an initial delay.
    pub fn exponential(initial: Duration, retries: usize) -> Self {
        let delays = (0..retries).map(|i| initial * 2u32.pow(i as u32)).collect();
        Self { delays }
    }

    /// Narrow call path: 400 ms doubling. Selected for configurations
    /// without a fallback model, which must wait out overload windows
    /// on their own.
    pub fn narrow() -> Self {
        Self::exponential(Duration::from_millis(400), 3)
    }

    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }

    /// Delay before retry number `retry_index` (0-based), or `None`
    /// once the schedule is exhausted.
    pub fn delay(&self, retry_index: usize) -> Option<Duration> {
        self.delays.get(retry_index).copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::general()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_schedule() {
        let policy = RetryPolicy::general();

        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.delay(0), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(600)));
        assert_eq!(policy.delay(3), None);
    }

    #[test]
    fn test_exponential_schedule_doubles() {
        let policy = RetryPolicy::exponential(Duration::from_millis(400), 3);

        assert_eq!(policy.delay(0), Some(Duration::from_millis(400)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(800)));
        assert_eq!(policy.delay(2), Some(Duration::from_millis(1600)));
        assert_eq!(policy.delay(3), None);
    }
}
