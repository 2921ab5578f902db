//! Locates and unwraps the place data blob embedded in a rendered place page.
//!
//! The page assigns a JSON literal to `window.APP_INITIALIZATION_STATE`. Inside
//! it, a build-specific container holds a *string* that is itself JSON,
//! prefixed with the anti-XSSI marker `)]}'` and a newline. The place blob is
//! the list at index 6 of that inner document.
//!
//! ```text
//! APP_INITIALIZATION_STATE[3]            map  -> ["<L>f"][6]   (L in A..=Z)
//!                                        list -> [6]           (older builds)
//!   ")]}'\n[ ..., ..., ..., ..., ..., ..., <blob>, ... ]"
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::tree::{resolve, PathKey, TreeValue};

/// Anti-XSSI marker that prefixes every framed payload.
pub const FRAMING_MARKER: &str = ")]}'";

static APP_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s);window\.APP_INITIALIZATION_STATE\s*=\s*(.*?);window\.APP_FLAGS")
        .expect("valid regex")
});

/// Top-level index of the application state container.
const APP_STATE_INDEX: usize = 3;
/// Index of the framed payload string inside the container.
const PAYLOAD_INDEX: usize = 6;
/// Index of the place blob inside the inner document.
const BLOB_INDEX: usize = 6;

/// Reasons a decode can fail, one per step. Only used for diagnostics; the
/// public entry point collapses all of them to `None`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DecodeError {
    #[error("APP_INITIALIZATION_STATE assignment not found")]
    EnvelopeNotFound,
    #[error("captured state does not start with '[' or '{{'")]
    NotJson,
    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("no container with a framed payload under the application state")]
    ContainerMissing,
    #[error("payload lacks the framing marker")]
    FramingMissing,
    #[error("inner document has no list at the blob index")]
    BlobNotList,
}

/// Decodes the place blob from raw page markup.
///
/// Returns `None` when any step fails; a partially decoded blob is never
/// returned. The failing step is logged at debug level.
#[must_use]
pub fn decode_place_blob(html: &str) -> Option<TreeValue> {
    match try_decode(html) {
        Ok(blob) => Some(blob),
        Err(err) => {
            tracing::debug!(error = %err, "place blob decode failed");
            None
        }
    }
}

pub(crate) fn try_decode(html: &str) -> Result<TreeValue, DecodeError> {
    let state_json = capture_app_state(html)?;
    let state = TreeValue::parse(state_json).map_err(|source| DecodeError::Json {
        context: "application state",
        source,
    })?;

    let container = state
        .at(&[APP_STATE_INDEX])
        .ok_or(DecodeError::ContainerMissing)?;

    match container {
        TreeValue::Map(_) => decode_from_keyed_container(container),
        TreeValue::List(items) if items.len() > PAYLOAD_INDEX => {
            let payload = container
                .at(&[PAYLOAD_INDEX])
                .and_then(TreeValue::as_str)
                .ok_or(DecodeError::ContainerMissing)?;
            decode_payload(payload)
        }
        _ => Err(DecodeError::ContainerMissing),
    }
}

/// Extracts the JSON text assigned to `APP_INITIALIZATION_STATE`.
fn capture_app_state(html: &str) -> Result<&str, DecodeError> {
    let captured = APP_STATE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or(DecodeError::EnvelopeNotFound)?
        .as_str()
        .trim();

    if captured.starts_with('[') || captured.starts_with('{') {
        Ok(captured)
    } else {
        Err(DecodeError::NotJson)
    }
}

/// Tries `Af` through `Zf` in order. A key that is present but does not hold
/// a framed payload is skipped; the first key that yields a blob wins.
fn decode_from_keyed_container(container: &TreeValue) -> Result<TreeValue, DecodeError> {
    for letter in 'A'..='Z' {
        let key = format!("{letter}f");
        let Some(payload) = resolve(container, &[PathKey::Key(&key), PathKey::Index(PAYLOAD_INDEX)])
            .and_then(TreeValue::as_str)
        else {
            continue;
        };
        if !payload.starts_with(FRAMING_MARKER) {
            continue;
        }
        match decode_payload(payload) {
            Ok(blob) => {
                tracing::debug!(key = %key, "found place blob under dynamic key");
                return Ok(blob);
            }
            Err(DecodeError::BlobNotList) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(DecodeError::ContainerMissing)
}

/// Strips the framing prefix from `payload`, parses the remainder and
/// returns the blob list.
fn decode_payload(payload: &str) -> Result<TreeValue, DecodeError> {
    let inner_json = strip_framing(payload).ok_or(DecodeError::FramingMissing)?;
    let inner = TreeValue::parse(inner_json).map_err(|source| DecodeError::Json {
        context: "inner payload",
        source,
    })?;

    match inner.at(&[BLOB_INDEX]) {
        Some(blob @ TreeValue::List(_)) => Ok(blob.clone()),
        _ => Err(DecodeError::BlobNotList),
    }
}

/// Removes exactly the marker and the newline that follows it.
///
/// Returns `None` when `payload` does not begin with `)]}'\n`.
#[must_use]
pub fn strip_framing(payload: &str) -> Option<&str> {
    payload.strip_prefix(FRAMING_MARKER)?.strip_prefix('\n')
}
