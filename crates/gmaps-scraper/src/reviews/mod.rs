//! Review ranking, sampling and parsing.
//!
//! Raw entries come straight from the review RPC and stay unparsed until
//! [`process_and_select_reviews`] has ranked them and drawn the subset worth
//! materializing. A place with thousands of reviews therefore costs one sort
//! over cheap keys plus at most [`SELECTION_COUNT`] full parses.

mod parse;
mod rank;

use gmaps_core::ReviewRecord;
use rand::Rng;

use crate::tree::TreeValue;

pub use parse::{parse_review, parse_reviews};
pub use rank::{
    rank_reviews, review_sort_key, select_reviews, ReviewSortKey, CANDIDATE_POOL_SIZE,
    PLACEHOLDER_NAMES, SELECTION_COUNT,
};

/// Paths inside a review record (the node at index 0 of a raw entry).
pub(crate) mod paths {
    pub const AUTHOR_NAME: &[usize] = &[1, 4, 5, 0];
    pub const PROFILE_PICTURE: &[usize] = &[1, 4, 5, 1];
    pub const RELATIVE_TIME: &[usize] = &[1, 1];
    pub const RATING: &[usize] = &[2, 0, 0];
    pub const DESCRIPTION: &[usize] = &[2, 15, 0, 0];
    pub const DATE_PARTS: &[usize] = &[2, 2, 0, 1, 21, 6, 8];
    pub const IMAGES: &[usize] = &[2, 2, 0, 1, 21, 7];
}

/// One element of the RPC review list, kept opaque until selected.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReviewEntry(TreeValue);

impl RawReviewEntry {
    #[must_use]
    pub fn new(value: TreeValue) -> Self {
        Self(value)
    }

    /// The nested review record, or `None` when the slot is missing or empty.
    #[must_use]
    pub fn review(&self) -> Option<&TreeValue> {
        self.0
            .at(&[0])
            .filter(|r| r.as_list().is_some_and(|items| !items.is_empty()))
    }
}

impl From<TreeValue> for RawReviewEntry {
    fn from(value: TreeValue) -> Self {
        Self(value)
    }
}

/// Ranks `raw`, draws the final subset and parses only that subset.
///
/// Returns at most [`SELECTION_COUNT`] reviews. Entries whose author name is
/// missing are dropped during parsing, so the result can be shorter than the
/// selection.
pub fn process_and_select_reviews<R>(raw: &[RawReviewEntry], rng: &mut R) -> Vec<ReviewRecord>
where
    R: Rng + ?Sized,
{
    if raw.is_empty() {
        return Vec::new();
    }

    let ranked = rank_reviews(raw);
    let selected = select_reviews(ranked, rng);
    let parsed = parse_reviews(selected.iter().copied());

    tracing::debug!(
        total = raw.len(),
        selected = selected.len(),
        parsed = parsed.len(),
        "selected reviews for parsing"
    );
    parsed
}
