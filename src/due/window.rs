pub const SECONDS_PER_DAY: i64 = 86_400;

/// How far before and after an anchor a note stays visible, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    pub days_before: i64,
    pub days_after: i64,
}

impl Tolerance {
    pub const fn new(days_before: i64, days_after: i64) -> Self {
        Self {
            days_before,
            days_after,
        }
    }

    /// Closed interval `[anchor - before, anchor + after]` in unix seconds.
    pub fn window(&self, anchor: i64) -> (i64, i64) {
        (
            anchor - self.days_before * SECONDS_PER_DAY,
            anchor + self.days_after * SECONDS_PER_DAY,
        )
    }

    pub fn contains(&self, anchor: i64, now: i64) -> bool {
        let (start, end) = self.window(anchor);
        start <= now && now <= end
    }
}

/// The current-cycle anchor and its neighbours one period either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleAnchors {
    pub previous: i64,
    pub current: i64,
    pub next: i64,
}

impl CycleAnchors {
    pub fn around(current: i64, period_days: i64) -> Self {
        let period = period_days * SECONDS_PER_DAY;
        Self {
            previous: current - period,
            current,
            next: current + period,
        }
    }
}

/// First anchor, in previous/current/next order, whose window contains `now`.
pub fn matching_anchor(now: i64, anchors: CycleAnchors, tolerance: Tolerance) -> Option<i64> {
    [anchors.previous, anchors.current, anchors.next]
        .into_iter()
        .find(|anchor| tolerance.contains(*anchor, now))
}

pub fn is_within_repeat_window(now: i64, anchors: CycleAnchors, tolerance: Tolerance) -> bool {
    matching_anchor(now, anchors, tolerance).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = SECONDS_PER_DAY;
    const ANCHOR: i64 = 1_000 * DAY;

    #[test]
    fn bounds_are_inclusive() {
        let tol = Tolerance::new(3, 7);
        let anchors = CycleAnchors::around(ANCHOR, 365);
        assert!(is_within_repeat_window(ANCHOR - 3 * DAY, anchors, tol));
        assert!(!is_within_repeat_window(ANCHOR - 3 * DAY - 1, anchors, tol));
        assert!(is_within_repeat_window(ANCHOR + 7 * DAY, anchors, tol));
        assert!(!is_within_repeat_window(ANCHOR + 7 * DAY + 1, anchors, tol));
    }

    #[test]
    fn neighbouring_cycles_are_checked() {
        let tol = Tolerance::new(1, 3);
        let anchors = CycleAnchors::around(ANCHOR, 30);
        assert_eq!(
            matching_anchor(ANCHOR + 29 * DAY, anchors, tol),
            Some(ANCHOR + 30 * DAY)
        );
        assert_eq!(
            matching_anchor(ANCHOR - 28 * DAY, anchors, tol),
            Some(ANCHOR - 30 * DAY)
        );
        assert_eq!(matching_anchor(ANCHOR + 10 * DAY, anchors, tol), None);
    }

    #[test]
    fn overlapping_windows_prefer_the_earliest_cycle() {
        // Long annual view: the current and next windows overlap right after the anchor.
        let tol = Tolerance::new(365, 7);
        let anchors = CycleAnchors::around(ANCHOR, 365);
        assert_eq!(matching_anchor(ANCHOR + 2 * DAY, anchors, tol), Some(ANCHOR));
        assert_eq!(
            matching_anchor(ANCHOR - 363 * DAY, anchors, tol),
            Some(ANCHOR - 365 * DAY)
        );
    }
}
