use rand::seq::index;
use rand::Rng;

use super::parse::absolute_date;
use super::{paths, RawReviewEntry};

/// Number of top-ranked entries the final selection is drawn from.
pub const CANDIDATE_POOL_SIZE: usize = 300;
/// Maximum number of reviews returned per place.
pub const SELECTION_COUNT: usize = 100;

/// Author names that carry no information about the reviewer, compared
/// case-insensitively.
pub const PLACEHOLDER_NAMES: [&str; 4] = ["google user", "anonymous user", "unknown", "profile name"];

/// Quality key used to rank reviews. Fields compare in declaration order, so
/// description length dominates and the flags only break ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReviewSortKey {
    pub description_chars: usize,
    pub has_profile_picture: bool,
    pub has_absolute_date: bool,
    pub has_real_name: bool,
}

/// Computes the sort key from the raw review record without parsing it.
#[must_use]
pub fn review_sort_key(review: &crate::tree::TreeValue) -> ReviewSortKey {
    let description_chars = review
        .at(paths::DESCRIPTION)
        .and_then(|v| v.as_str())
        .map_or(0, |s| s.chars().count());

    let has_profile_picture = review
        .at(paths::PROFILE_PICTURE)
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty());

    let has_real_name = review
        .at(paths::AUTHOR_NAME)
        .and_then(|v| v.as_str())
        .is_none_or(|name| {
            let lowered = name.to_lowercase();
            !PLACEHOLDER_NAMES.contains(&lowered.as_str())
        });

    ReviewSortKey {
        description_chars,
        has_profile_picture,
        has_absolute_date: absolute_date(review).is_some(),
        has_real_name,
    }
}

/// Orders entries best-first. Entries without a review record are dropped;
/// ties keep their input order.
#[must_use]
pub fn rank_reviews(raw: &[RawReviewEntry]) -> Vec<&RawReviewEntry> {
    let mut keyed: Vec<(ReviewSortKey, &RawReviewEntry)> = raw
        .iter()
        .filter_map(|entry| entry.review().map(|r| (review_sort_key(r), entry)))
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.into_iter().map(|(_, entry)| entry).collect()
}

/// Keeps the top [`CANDIDATE_POOL_SIZE`] ranked entries, then draws
/// [`SELECTION_COUNT`] of them uniformly without replacement.
///
/// A pool no larger than the selection size is returned whole. The drawn
/// subset keeps its ranked order.
pub fn select_reviews<'a, R>(mut ranked: Vec<&'a RawReviewEntry>, rng: &mut R) -> Vec<&'a RawReviewEntry>
where
    R: Rng + ?Sized,
{
    ranked.truncate(CANDIDATE_POOL_SIZE);
    if ranked.len() <= SELECTION_COUNT {
        return ranked;
    }

    let mut picked = index::sample(rng, ranked.len(), SELECTION_COUNT).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|i| ranked[i]).collect()
}
