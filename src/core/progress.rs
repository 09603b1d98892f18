//! Per-iteration progress evaluation and stall counting.

/// Completion deltas observed across one iteration.
///
/// `items_added` covers remediation items appended during verification;
/// discovering new work counts as progress even when nothing completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressDelta {
    pub completed_before: usize,
    pub completed_after: usize,
    pub items_added: usize,
}

impl ProgressDelta {
    pub fn made_progress(self) -> bool {
        self.completed_after > self.completed_before || self.items_added > 0
    }
}

/// Consecutive-failure counter driving escalation.
///
/// Resets to zero on any iteration with progress, otherwise increments by
/// exactly one; crossing the threshold pauses the loop for an explicit
/// continue/abort decision.
#[derive(Debug, Clone)]
pub struct StallCounter {
    consecutive: u32,
    threshold: u32,
}

impl StallCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Record one iteration's outcome; returns true when the threshold is
    /// reached.
    pub fn record(&mut self, progressed: bool) -> bool {
        if progressed {
            self.consecutive = 0;
            return false;
        }
        self.consecutive += 1;
        self.consecutive >= self.threshold
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_new_completion_or_new_items() {
        let stalled = ProgressDelta {
            completed_before: 2,
            completed_after: 2,
            items_added: 0,
        };
        assert!(!stalled.made_progress());

        let completed = ProgressDelta {
            completed_after: 3,
            ..stalled
        };
        assert!(completed.made_progress());

        let discovered = ProgressDelta {
            items_added: 2,
            ..stalled
        };
        assert!(discovered.made_progress());
    }

    #[test]
    fn counter_increments_by_one_and_resets_on_progress() {
        let mut counter = StallCounter::new(3);
        assert!(!counter.record(false));
        assert!(!counter.record(false));
        assert_eq!(counter.consecutive(), 2);

        assert!(!counter.record(true));
        assert_eq!(counter.consecutive(), 0);

        assert!(!counter.record(false));
        assert!(!counter.record(false));
        assert!(counter.record(false));
        assert_eq!(counter.consecutive(), 3);
    }

    #[test]
    fn reset_clears_the_streak_after_escalation() {
        let mut counter = StallCounter::new(1);
        assert!(counter.record(false));
        counter.reset();
        assert_eq!(counter.consecutive(), 0);
        assert!(counter.record(false));
    }
}
