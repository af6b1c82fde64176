//! Progress notification
//!
//! Operations report integer percentages in `0..=100`. Any `FnMut(u8)` is a
//! sink, so callers usually pass a closure.

/// Receives percent-complete notifications.
pub trait ProgressSink {
    fn report(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn report(&mut self, percent: u8) {
        self(percent)
    }
}

/// Forwards only strictly increasing percentages, clamped to 100.
///
/// Wrapping a caller's sink in a tracker makes the sequence it observes
/// non-decreasing with no duplicates, whatever the stages report.
pub struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    /// Returns a sink that maps a sub-operation's `0..=100` onto `from..=to`.
    pub fn stage(&mut self, from: u8, to: u8) -> Stage<'_, 'a> {
        Stage {
            tracker: self,
            from,
            to: to.max(from),
        }
    }

    pub fn finish(&mut self) {
        self.report(100);
    }
}

impl ProgressSink for ProgressTracker<'_> {
    fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_none_or(|last| percent > last) {
            self.last = Some(percent);
            self.sink.report(percent);
        }
    }
}

/// A slice of the overall progress range, see [`ProgressTracker::stage`].
pub struct Stage<'t, 'a> {
    tracker: &'t mut ProgressTracker<'a>,
    from: u8,
    to: u8,
}

impl ProgressSink for Stage<'_, '_> {
    fn report(&mut self, percent: u8) {
        let span = u16::from(self.to - self.from);
        let scaled = u16::from(self.from) + span * u16::from(percent.min(100)) / 100;
        self.tracker.report(scaled as u8);
    }
}

/// Percentage of `done` out of `total`, with an empty total counting as complete.
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    ((done as u128 * 100) / total as u128) as u8
}
