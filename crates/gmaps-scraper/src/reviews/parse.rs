use gmaps_core::ReviewRecord;

use super::{paths, RawReviewEntry};
use crate::tree::{Scalar, TreeValue};

/// Placeholder `when` for reviews with neither an absolute nor a relative date.
const UNKNOWN_WHEN: &str = "N/A";

/// Parses every entry in `entries`, dropping the ones that cannot produce a
/// review. Output order follows input order.
pub fn parse_reviews<'a, I>(entries: I) -> Vec<ReviewRecord>
where
    I: IntoIterator<Item = &'a RawReviewEntry>,
{
    entries.into_iter().filter_map(parse_review).collect()
}

/// Builds a [`ReviewRecord`] from a raw RPC entry.
///
/// Returns `None` when the entry has no review record or no author name.
#[must_use]
pub fn parse_review(entry: &RawReviewEntry) -> Option<ReviewRecord> {
    let review = entry.review()?;

    let name = review
        .at(paths::AUTHOR_NAME)
        .and_then(TreeValue::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();

    let profile_picture = review
        .at(paths::PROFILE_PICTURE)
        .and_then(TreeValue::as_str)
        .map(unescape_literal)
        .unwrap_or_default();

    let when = absolute_date(review)
        .or_else(|| {
            review
                .at(paths::RELATIVE_TIME)
                .and_then(TreeValue::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_WHEN.to_string());

    Some(ReviewRecord {
        name,
        profile_picture,
        rating: review.at(paths::RATING).and_then(TreeValue::as_f64),
        description: review
            .at(paths::DESCRIPTION)
            .and_then(TreeValue::as_str)
            .map(str::to_string),
        when,
        images: review_images(review),
    })
}

/// Formats the `[year, month, day, ...]` parts as `YYYY-MM-DD`.
///
/// Needs at least three parts, each a number or a numeric string.
pub(crate) fn absolute_date(review: &TreeValue) -> Option<String> {
    let parts = review.at(paths::DATE_PARTS)?.as_list()?;
    if parts.len() < 3 {
        return None;
    }
    let year = integer_part(&parts[0])?;
    let month = integer_part(&parts[1])?;
    let day = integer_part(&parts[2])?;
    Some(format!("{year}-{month:02}-{day:02}"))
}

#[allow(clippy::cast_possible_truncation)]
fn integer_part(value: &TreeValue) -> Option<i64> {
    match value {
        TreeValue::Scalar(Scalar::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        TreeValue::Scalar(Scalar::Text(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Review photo URLs; protocol-relative ones get an `https:` scheme.
fn review_images(review: &TreeValue) -> Vec<String> {
    let Some(items) = review.at(paths::IMAGES).and_then(TreeValue::as_list) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(TreeValue::as_str)
        .filter(|url| !url.is_empty())
        .map(|url| {
            if url.starts_with("//") {
                format!("https:{url}")
            } else {
                url.to_string()
            }
        })
        .collect()
}

/// Decodes JSON-style escapes such as `\u003d` left in avatar URLs. Falls
/// back to the raw text when it does not decode cleanly.
fn unescape_literal(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
