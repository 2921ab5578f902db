use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One business listing extracted from a place page.
///
/// Every `Option` field is omitted from serialized output when absent, so
/// consumers never see `null` for data the page did not carry. `user_reviews`
/// and `status` are always present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlaceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Digits only; punctuation and the leading `+` are stripped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_hours: Option<OpenHours>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<PlaceImage>>,
    /// Short free-text description from the "About" tab.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    /// Structured "About" attributes (accessibility, offerings, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeSection>>,
    pub user_reviews: Vec<ReviewRecord>,
    pub status: PlaceStatus,
    /// The place URL the record was scraped from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceImage {
    pub title: String,
    #[serde(rename = "image")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSection {
    pub id: String,
    pub name: String,
    pub options: Vec<AttributeOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOption {
    pub name: String,
    pub enabled: bool,
}

/// Business status derived from the raw status line on the place page.
///
/// Serialized as `"open"` / `"close"`, the literal values downstream
/// consumers of this output already match on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceStatus {
    #[default]
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "close")]
    Closed,
}

impl std::fmt::Display for PlaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaceStatus::Open => write!(f, "open"),
            PlaceStatus::Closed => write!(f, "close"),
        }
    }
}

/// Opening hours keyed by day label, in the order the page lists them.
///
/// Serializes as a JSON object. A repeated day replaces the earlier entry in
/// place rather than appending a duplicate key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenHours(Vec<(String, Vec<String>)>);

impl OpenHours {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, day: String, ranges: Vec<String>) {
        if let Some(slot) = self.0.iter_mut().find(|(d, _)| *d == day) {
            slot.1 = ranges;
        } else {
            self.0.push((day, ranges));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(d, _)| d.as_str())
    }
}

impl Serialize for OpenHours {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (day, ranges) in &self.0 {
            map.serialize_entry(day, ranges)?;
        }
        map.end()
    }
}

/// A single user review attached to a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub name: String,
    /// Empty string when the reviewer has no avatar.
    pub profile_picture: String,
    pub rating: Option<f64>,
    pub description: Option<String>,
    /// `YYYY-MM-DD` when the absolute date is known, otherwise the relative
    /// phrase shown on the page (e.g. `"a month ago"`), otherwise `"N/A"`.
    pub when: String,
    pub images: Vec<String>,
}
