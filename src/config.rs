//! Pool configuration options

use std::time::Duration;

/// Smallest allowed delay between two trim passes.
pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a single instance pool
///
/// # Examples
///
/// ```
/// use esox_instancepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_count(16)
///     .with_prepare_count(4)
///     .with_interval(Duration::from_secs(2));
///
/// assert_eq!(config.max_count, 16);
/// assert_eq!(config.prepare_count, 4);
/// assert_eq!(config.interval, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfiguration {
    /// Upper bound on live instances. `0` means unbounded.
    pub max_count: usize,

    /// Number of instances trimming shrinks the pool towards
    pub prepare_count: usize,

    /// Delay between trim passes, never below [`MIN_INTERVAL`]
    pub interval: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_count: 0,
            prepare_count: 0,
            interval: Duration::from_secs(1),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live instances (`0` for unbounded)
    pub fn with_max_count(mut self, count: usize) -> Self {
        self.max_count = count;
        self
    }

    /// Set the count idle trimming keeps
    pub fn with_prepare_count(mut self, count: usize) -> Self {
        self.prepare_count = count;
        self
    }

    /// Set the trim interval
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_instancepool::{PoolConfiguration, MIN_INTERVAL};
    /// use std::time::Duration;
    ///
    /// let config = PoolConfiguration::new().with_interval(Duration::ZERO);
    /// assert_eq!(config.interval, MIN_INTERVAL);
    /// ```
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = clamp_interval(interval);
        self
    }

    /// Set the trim interval from fractional seconds
    pub fn with_interval_secs(self, seconds: f32) -> Self {
        let interval = Duration::try_from_secs_f32(seconds.max(0.0)).unwrap_or(Duration::MAX);
        self.with_interval(interval)
    }

    /// Copy of this configuration with the interval clamped.
    ///
    /// Public fields can be written directly, so pools normalize on entry.
    pub(crate) fn normalized(mut self) -> Self {
        self.interval = clamp_interval(self.interval);
        self
    }
}

pub(crate) fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_count, 0);
        assert_eq!(config.prepare_count, 0);
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_interval_clamped() {
        assert_eq!(PoolConfiguration::new().with_interval_secs(0.0).interval, MIN_INTERVAL);
        assert_eq!(PoolConfiguration::new().with_interval_secs(-3.0).interval, MIN_INTERVAL);
        assert_eq!(
            PoolConfiguration::new().with_interval_secs(0.5).interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_normalized_fixes_direct_writes() {
        let config = PoolConfiguration {
            interval: Duration::from_millis(1),
            ..Default::default()
        };
        assert_eq!(config.normalized().interval, MIN_INTERVAL);
    }
}
