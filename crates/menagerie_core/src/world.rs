//! World readiness tracking.

use log::info;

/// Counts world-load events until every expected world is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldLoadTracker {
    expected: usize,
    loaded: usize,
}

impl WorldLoadTracker {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            loaded: 0,
        }
    }

    /// Records one world load. Returns `true` exactly on the load that
    /// completes the expected set.
    pub fn world_loaded(&mut self) -> bool {
        self.loaded += 1;
        let completed = self.loaded == self.expected;
        if completed {
            info!(
                "event=worlds_loaded module=world status=ok worlds={}",
                self.expected
            );
        }
        completed
    }

    pub fn all_loaded(&self) -> bool {
        self.loaded >= self.expected
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn expected(&self) -> usize {
        self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::WorldLoadTracker;

    #[test]
    fn completes_once_on_the_last_expected_world() {
        let mut tracker = WorldLoadTracker::new(3);
        assert!(!tracker.world_loaded());
        assert!(!tracker.world_loaded());
        assert!(!tracker.all_loaded());
        assert!(tracker.world_loaded());
        assert!(tracker.all_loaded());
        assert!(!tracker.world_loaded());
        assert_eq!(tracker.loaded(), 4);
    }

    #[test]
    fn zero_expected_worlds_are_loaded_immediately() {
        let tracker = WorldLoadTracker::new(0);
        assert!(tracker.all_loaded());
        assert_eq!(tracker.expected(), 0);
    }
}
