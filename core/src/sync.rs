//! Drift detection against an external clock
//!
//! Audio or video players report the frame they are presenting. When that
//! runs too far ahead of the geometry, the player skips forward to catch up.

/// Default allowed lead of the external clock, in frames
pub const DEFAULT_DRIFT_THRESHOLD: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftMonitor {
    threshold: u32,
}

impl Default for DriftMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_DRIFT_THRESHOLD)
    }
}

impl DriftMonitor {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Frame to skip to when `reported` leads `loaded` by more than the threshold.
    pub fn check(&self, reported: u32, loaded: i64) -> Option<u32> {
        (reported as i64 - loaded > self.threshold as i64).then_some(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_threshold() {
        let monitor = DriftMonitor::default();
        assert_eq!(monitor.check(15, 0), None);
        assert_eq!(monitor.check(30, 20), None);
    }

    #[test]
    fn test_beyond_threshold() {
        let monitor = DriftMonitor::default();
        assert_eq!(monitor.check(16, 0), Some(16));
        assert_eq!(monitor.check(15, -1), Some(15));
    }

    #[test]
    fn test_external_clock_behind_is_ignored() {
        let monitor = DriftMonitor::new(2);
        assert_eq!(monitor.check(3, 40), None);
    }
}
