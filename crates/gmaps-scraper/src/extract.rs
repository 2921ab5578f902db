//! Maps a decoded place blob onto a [`PlaceRecord`].
//!
//! Every field lives at a fixed position in the blob. The positions below are
//! part of the compatibility surface with the page format and change only
//! when Maps ships a new layout.

use gmaps_core::{
    AttributeOption, AttributeSection, Coordinates, OpenHours, PlaceImage, PlaceRecord,
    PlaceStatus,
};
use rand::Rng;

use crate::envelope::decode_place_blob;
use crate::reviews::{process_and_select_reviews, RawReviewEntry};
use crate::tree::TreeValue;

mod paths {
    pub const NAME: &[usize] = &[11];
    pub const PLACE_ID: &[usize] = &[10];
    pub const LATITUDE: &[usize] = &[9, 2];
    pub const LONGITUDE: &[usize] = &[9, 3];
    pub const ADDRESS_PARTS: &[usize] = &[2];
    pub const RATING: &[usize] = &[4, 7];
    pub const REVIEWS_COUNT: &[usize] = &[4, 8];
    pub const WEBSITE: &[usize] = &[7, 0];
    pub const CATEGORIES: &[usize] = &[13];
    pub const THUMBNAIL: &[usize] = &[72, 0, 1, 6, 0];
    pub const PRICE_RANGE: &[usize] = &[4, 2];
    pub const ABOUT: &[usize] = &[32, 1, 1];
    pub const STATUS: &[usize] = &[34, 4, 4];
    pub const OPEN_HOURS: &[usize] = &[34, 1];
    pub const IMAGES: &[usize] = &[171, 0];
    pub const ATTRIBUTES: &[usize] = &[100, 1];

    // Relative to one image item.
    pub const IMAGE_TITLE: &[usize] = &[2];
    pub const IMAGE_URL: &[usize] = &[3, 0, 6, 0];

    // Relative to one attribute option.
    pub const OPTION_NAME: &[usize] = &[1];
    pub const OPTION_FLAG: &[usize] = &[2, 1, 0, 0];
}

/// Substring of the icon URL that marks the phone row.
const PHONE_ICON_MARKER: &str = "call_googblue";

/// Lower-case phrases that mark a listing as closed.
const CLOSED_PHRASES: [&str; 4] = [
    "permanently closed",
    "temporarily closed",
    "closed permanently",
    "closed temporarily",
];

/// Decodes `html` and extracts the place, attaching a ranked selection of
/// `raw_reviews`.
///
/// Returns `None` when the page carries no decodable place blob.
pub fn extract_place_data<R>(
    html: &str,
    raw_reviews: &[RawReviewEntry],
    rng: &mut R,
) -> Option<PlaceRecord>
where
    R: Rng + ?Sized,
{
    let blob = decode_place_blob(html)?;
    let mut record = extract_place_fields(&blob);
    record.user_reviews = process_and_select_reviews(raw_reviews, rng);
    Some(record)
}

/// Reads every place field from an already decoded blob. `user_reviews` is
/// left empty and `link` unset.
#[must_use]
pub fn extract_place_fields(blob: &TreeValue) -> PlaceRecord {
    PlaceRecord {
        name: text_at(blob, paths::NAME),
        place_id: text_at(blob, paths::PLACE_ID),
        coordinates: coordinates(blob),
        address: address(blob),
        rating: blob.at(paths::RATING).and_then(TreeValue::as_f64),
        reviews_count: blob.at(paths::REVIEWS_COUNT).and_then(TreeValue::as_u64),
        categories: categories(blob),
        website: text_at(blob, paths::WEBSITE),
        phone: find_phone(blob),
        price_range: text_at(blob, paths::PRICE_RANGE),
        thumbnail: text_at(blob, paths::THUMBNAIL),
        open_hours: open_hours(blob),
        images: images(blob),
        about: text_at(blob, paths::ABOUT),
        attributes: attributes(blob),
        user_reviews: Vec::new(),
        status: classify_status(blob.at(paths::STATUS).and_then(TreeValue::as_str)),
        link: None,
    }
}

/// `Closed` when `raw` contains any closure phrase, ignoring case.
#[must_use]
pub fn classify_status(raw: Option<&str>) -> PlaceStatus {
    let Some(raw) = raw else {
        return PlaceStatus::Open;
    };
    let lowered = raw.to_lowercase();
    if CLOSED_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        PlaceStatus::Closed
    } else {
        PlaceStatus::Open
    }
}

/// Searches the whole blob for the phone row: a list whose first item is an
/// icon URL containing the phone marker and whose second item is the number.
///
/// Returns digits only. A matching row with no digits does not end the search.
#[must_use]
pub fn find_phone(blob: &TreeValue) -> Option<String> {
    blob.find_map(|node| {
        let items = node.as_list()?;
        let icon = items.first()?.as_str()?;
        if !icon.contains(PHONE_ICON_MARKER) {
            return None;
        }
        let digits: String = items
            .get(1)?
            .as_str()?
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        (!digits.is_empty()).then_some(digits)
    })
}

fn text_at(blob: &TreeValue, path: &[usize]) -> Option<String> {
    blob.at(path).and_then(TreeValue::as_str).map(str::to_string)
}

fn coordinates(blob: &TreeValue) -> Option<Coordinates> {
    let latitude = blob.at(paths::LATITUDE)?.as_f64()?;
    let longitude = blob.at(paths::LONGITUDE)?.as_f64()?;
    Some(Coordinates {
        latitude,
        longitude,
    })
}

fn address(blob: &TreeValue) -> Option<String> {
    let parts = blob.at(paths::ADDRESS_PARTS)?.as_list()?;
    let joined = parts
        .iter()
        .filter_map(TreeValue::as_str)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

fn categories(blob: &TreeValue) -> Option<Vec<String>> {
    let items = blob.at(paths::CATEGORIES)?.as_list()?;
    Some(
        items
            .iter()
            .filter_map(TreeValue::as_str)
            .map(str::to_string)
            .collect(),
    )
}

fn open_hours(blob: &TreeValue) -> Option<OpenHours> {
    let rows = blob.at(paths::OPEN_HOURS)?.as_list()?;
    let mut hours = OpenHours::new();
    for row in rows {
        let Some(day) = row.at(&[0]).and_then(TreeValue::as_str).filter(|d| !d.is_empty()) else {
            continue;
        };
        let Some(times) = row.at(&[1]).and_then(TreeValue::as_list) else {
            continue;
        };
        let ranges = times
            .iter()
            .filter_map(TreeValue::as_str)
            .map(str::to_string)
            .collect();
        hours.insert(day.to_string(), ranges);
    }
    (!hours.is_empty()).then_some(hours)
}

fn images(blob: &TreeValue) -> Option<Vec<PlaceImage>> {
    let items = blob.at(paths::IMAGES)?.as_list()?;
    let images: Vec<PlaceImage> = items
        .iter()
        .filter_map(|item| {
            let title = item.at(paths::IMAGE_TITLE)?.as_str().filter(|s| !s.is_empty())?;
            let url = item.at(paths::IMAGE_URL)?.as_str().filter(|s| !s.is_empty())?;
            Some(PlaceImage {
                title: title.to_string(),
                url: url.to_string(),
            })
        })
        .collect();
    (!images.is_empty()).then_some(images)
}

fn attributes(blob: &TreeValue) -> Option<Vec<AttributeSection>> {
    let sections = blob.at(paths::ATTRIBUTES)?.as_list()?;
    let parsed: Vec<AttributeSection> = sections.iter().filter_map(attribute_section).collect();
    (!parsed.is_empty()).then_some(parsed)
}

fn attribute_section(section: &TreeValue) -> Option<AttributeSection> {
    let id = section.at(&[0])?.as_str().filter(|s| !s.is_empty())?;
    let name = section.at(&[1])?.as_str().filter(|s| !s.is_empty())?;
    let options: Vec<AttributeOption> = section
        .at(&[2])?
        .as_list()?
        .iter()
        .filter_map(|option| {
            let name = option.at(paths::OPTION_NAME)?.as_str().filter(|s| !s.is_empty())?;
            #[allow(clippy::float_cmp)]
            let enabled = option
                .at(paths::OPTION_FLAG)
                .and_then(TreeValue::as_f64)
                .is_some_and(|flag| flag == 1.0);
            Some(AttributeOption {
                name: name.to_string(),
                enabled,
            })
        })
        .collect();

    if options.is_empty() {
        return None;
    }
    Some(AttributeSection {
        id: id.to_string(),
        name: name.to_string(),
        options,
    })
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
