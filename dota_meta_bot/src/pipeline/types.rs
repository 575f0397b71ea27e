use std::fmt::Display;

use thiserror::Error;

/// One character's (or item's) aggregated performance figure.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRecord {
    pub name: String,
    /// Win rate in percent.
    pub metric_value: f64,
    /// Popularity in percent, if the source has it.
    pub secondary_value: Option<f64>,
    pub image_url: Option<String>,
}

/// A character name normalized into the slug form upstream URLs use.
///
/// `"Storm  Spirit "` becomes `"storm-spirit"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    /// Normalize free text into a slug. Returns `None` if nothing is left.
    pub fn new(text: &str) -> Option<Self> {
        let slug = normalize(text);
        if slug.is_empty() {
            None
        } else {
            Some(Self(slug))
        }
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Turn the slug back into something presentable: `"storm-spirit"`
    /// becomes `"Storm Spirit"`.
    pub fn title(&self) -> String {
        self.0
            .split('-')
            .filter(|x| !x.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Lowercase, trim, and collapse every run of whitespace into one hyphen.
///
/// Running this on its own output changes nothing.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// What the fetcher got back, so the extractor doesn't have to sniff it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json,
}

/// Raw body of a successful upstream response.
#[derive(Debug, Clone)]
pub struct Payload {
    pub kind: ContentKind,
    pub body: String,
}

impl Payload {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Html,
            body: body.into(),
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Json,
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure: {0}")]
    NetworkFailure(#[source] reqwest::Error),
    #[error("upstream returned HTTP status {0}")]
    HttpStatus(u16),
    #[error("upstream timed out")]
    Timeout,
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if let Some(status) = value.status() {
            Self::HttpStatus(status.as_u16())
        } else {
            Self::NetworkFailure(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("expected markup or schema is missing")]
    MarkupChanged,
    #[error("no usable rows")]
    EmptyResult,
    #[error("malformed field: {0}")]
    MalformedField(String),
}

/// Anything that can go wrong between fetching and formatting.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}
