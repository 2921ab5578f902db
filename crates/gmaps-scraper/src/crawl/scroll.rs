//! Bookkeeping for the infinite-scroll link discovery loop.
//!
//! The tracker itself never touches the page. Each scroll cycle feeds it the
//! feed's scroll extent, the links rendered so far and whether the
//! end-of-list marker is showing; it answers whether to keep scrolling.

use std::collections::HashSet;

/// Result of one scroll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOutcome {
    Continue,
    /// `max_places` links are known; the list has been trimmed to that size.
    LimitReached,
    EndOfList,
    /// Neither the scroll extent nor the link set changed for the configured
    /// number of consecutive cycles.
    Stalled,
}

/// Insertion-ordered set of discovered place links plus the no-progress
/// counter.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    links: Vec<String>,
    seen: HashSet<String>,
    last_height: Option<u64>,
    idle_cycles: u32,
    max_idle_cycles: u32,
    max_places: Option<usize>,
}

impl ScrollTracker {
    #[must_use]
    pub fn new(initial_height: Option<u64>, max_places: Option<usize>, max_idle_cycles: u32) -> Self {
        Self {
            links: Vec::new(),
            seen: HashSet::new(),
            last_height: initial_height,
            idle_cycles: 0,
            max_idle_cycles,
            max_places,
        }
    }

    /// Records one cycle's observations and decides what happens next.
    ///
    /// The place limit is checked first, then the end marker. A cycle that
    /// changes the scroll extent or adds a link resets the no-progress
    /// counter.
    pub fn observe<I>(&mut self, height: Option<u64>, links: I, end_marker_visible: bool) -> ScrollOutcome
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.links.len();
        for link in links {
            if self.seen.insert(link.clone()) {
                self.links.push(link);
            }
        }
        let found_new = self.links.len() > before;

        if let Some(max) = self.max_places {
            if self.links.len() >= max {
                self.links.truncate(max);
                return ScrollOutcome::LimitReached;
            }
        }

        if end_marker_visible {
            return ScrollOutcome::EndOfList;
        }

        if height != self.last_height || found_new {
            self.last_height = height;
            self.idle_cycles = 0;
            return ScrollOutcome::Continue;
        }

        self.idle_cycles += 1;
        tracing::debug!(
            idle_cycles = self.idle_cycles,
            max_idle_cycles = self.max_idle_cycles,
            "scroll made no progress"
        );
        if self.idle_cycles >= self.max_idle_cycles {
            ScrollOutcome::Stalled
        } else {
            ScrollOutcome::Continue
        }
    }

    #[must_use]
    pub fn links(&self) -> &[String] {
        &self.links
    }

    #[must_use]
    pub fn into_links(self) -> Vec<String> {
        self.links
    }

    #[must_use]
    pub fn idle_cycles(&self) -> u32 {
        self.idle_cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("https://maps.test/maps/place/{n}")).collect()
    }

    #[test]
    fn five_idle_cycles_stall() {
        let mut tracker = ScrollTracker::new(Some(1000), None, 5);
        for cycle in 1..=4 {
            assert_eq!(tracker.observe(Some(1000), vec![], false), ScrollOutcome::Continue);
            assert_eq!(tracker.idle_cycles(), cycle);
        }
        assert_eq!(tracker.observe(Some(1000), vec![], false), ScrollOutcome::Stalled);
    }

    #[test]
    fn height_change_resets_idle_counter() {
        let mut tracker = ScrollTracker::new(Some(1000), None, 5);
        tracker.observe(Some(1000), vec![], false);
        tracker.observe(Some(1000), vec![], false);
        assert_eq!(tracker.idle_cycles(), 2);
        tracker.observe(Some(1500), vec![], false);
        assert_eq!(tracker.idle_cycles(), 0);
    }

    #[test]
    fn new_links_reset_idle_counter_even_without_height_change() {
        let mut tracker = ScrollTracker::new(Some(1000), None, 5);
        tracker.observe(Some(1000), links(&["a"]), false);
        assert_eq!(tracker.idle_cycles(), 0);
        tracker.observe(Some(1000), links(&["a"]), false);
        assert_eq!(tracker.idle_cycles(), 1);
        tracker.observe(Some(1000), links(&["a", "b"]), false);
        assert_eq!(tracker.idle_cycles(), 0);
    }

    #[test]
    fn limit_trims_to_earliest_links() {
        let mut tracker = ScrollTracker::new(None, Some(3), 5);
        assert_eq!(tracker.observe(Some(1), links(&["a", "b"]), false), ScrollOutcome::Continue);
        assert_eq!(
            tracker.observe(Some(2), links(&["a", "b", "c", "d", "e"]), false),
            ScrollOutcome::LimitReached
        );
        assert_eq!(tracker.links(), links(&["a", "b", "c"]).as_slice());
    }

    #[test]
    fn end_marker_stops_scrolling() {
        let mut tracker = ScrollTracker::new(Some(10), None, 5);
        assert_eq!(tracker.observe(Some(20), links(&["a"]), true), ScrollOutcome::EndOfList);
        assert_eq!(tracker.into_links(), links(&["a"]));
    }

    #[test]
    fn duplicates_keep_first_seen_order() {
        let mut tracker = ScrollTracker::new(None, None, 5);
        tracker.observe(Some(1), links(&["b", "a"]), false);
        tracker.observe(Some(2), links(&["a", "c", "b"]), false);
        assert_eq!(tracker.links(), links(&["b", "a", "c"]).as_slice());
    }
}
