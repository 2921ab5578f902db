use thiserror::Error;

use crate::browser::BrowserError;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("neither the consent dialog nor the results feed appeared after {attempts} attempts")]
    Consent { attempts: u32 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} lacks the framing prefix")]
    FramingMissing { url: String },

    #[error("no place data could be decoded from {url}")]
    Extraction { url: String },
}
