use html_escape::encode_text;
use url::Url;

use super::{
    ranking::rank_and_format,
    types::{ExtractError, PipelineError, StatRecord},
    SourceSpec,
};

pub const UNAVAILABLE: &str = "❌ Data is temporarily unavailable. Try again later.";
pub const LAYOUT_CHANGED: &str =
    "❌ Couldn't read the data. The source may have changed its layout.";
pub const NOT_FOUND: &str = concat!(
    "🤷 No data found for that query.\n",
    "Check the hero name, for example: <code>sven</code>, <code>lion</code>, ",
    "<code>storm spirit</code>."
);

/// An inline button under a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyButton {
    Link { caption: String, url: Url },
    Callback { caption: String, data: String },
}

/// A reply, ready to send with HTML parse mode.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub text: String,
    /// One button per row.
    pub buttons: Vec<ReplyButton>,
}

impl DisplayMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_button(mut self, button: ReplyButton) -> Self {
        self.buttons.push(button);
        self
    }

    #[cfg(test)]
    pub fn is_failure(&self) -> bool {
        [UNAVAILABLE, LAYOUT_CHANGED, NOT_FOUND].contains(&self.text.as_str())
    }
}

/// The user-facing text for a failure. Never includes technical detail.
pub fn failure_text(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::Fetch(_) => UNAVAILABLE,
        PipelineError::Extract(ExtractError::MarkupChanged) => LAYOUT_CHANGED,
        // A malformed field only gets here if it emptied the whole result.
        PipelineError::Extract(ExtractError::EmptyResult | ExtractError::MalformedField(_)) => {
            NOT_FOUND
        }
    }
}

/// Turn a pipeline outcome into something to reply with.
///
/// `source_url` becomes a button on successful item build replies.
pub fn respond(
    source: &SourceSpec,
    outcome: Result<Vec<StatRecord>, PipelineError>,
    top_n: usize,
    source_url: Option<Url>,
) -> DisplayMessage {
    let records = match outcome {
        Ok(records) => records,
        Err(e) => return DisplayMessage::plain(failure_text(&e)),
    };

    let lines = rank_and_format(records, top_n);
    if lines.is_empty() {
        return DisplayMessage::plain(NOT_FOUND);
    }

    let title = match source {
        SourceSpec::MetaLeaderboard => format!("🔥 Top {} heroes right now:", lines.len()),
        SourceSpec::HeroItemPage(query) => {
            format!("⚔️ Items for {}:", encode_text(&query.title()))
        }
        SourceSpec::StatsApiHeroList => {
            format!("🏆 Top {} heroes in pro matches:", lines.len())
        }
    };

    let message = DisplayMessage::plain(format!("{}\n\n{}", title, lines.join("\n")));

    match (source, source_url) {
        (SourceSpec::HeroItemPage(_), Some(url)) => message.with_button(ReplyButton::Link {
            caption: "📊 Full item stats".to_string(),
            url,
        }),
        _ => message,
    }
}
