//! Single-answer lookups that don't need ranking: finding a hero in the
//! stats API directory, and web search via instant answers.

use html_escape::encode_text;
use serde::Deserialize;

use crate::pipeline::{
    fetcher::Fetcher,
    responder::{failure_text, DisplayMessage},
    types::{ContentKind, ExtractError, PipelineError, Query},
};

pub const HERO_NOT_FOUND: &str = "❌ Hero not found. Check the spelling, maybe?";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeroInfo {
    pub id: u32,
    /// Internal name, like `npc_dota_hero_storm_spirit`.
    pub name: String,
    pub localized_name: String,
}

impl HeroInfo {
    /// `npc_dota_hero_storm_spirit` becomes `storm-spirit`.
    pub fn short_name(&self) -> String {
        self.name
            .strip_prefix("npc_dota_hero_")
            .unwrap_or(&self.name)
            .replace('_', "-")
    }

    fn matches(&self, query: &Query) -> bool {
        self.short_name() == query.as_str()
            || crate::pipeline::types::normalize(&self.localized_name) == query.as_str()
    }
}

/// Find `query` in a hero directory body.
pub fn find_hero(body: &str, query: &Query) -> Result<Option<HeroInfo>, ExtractError> {
    let Ok(serde_json::Value::Array(entries)) = serde_json::from_str::<serde_json::Value>(body)
    else {
        return Err(ExtractError::MarkupChanged);
    };

    Ok(entries
        .into_iter()
        .filter_map(|x| serde_json::from_value::<HeroInfo>(x).ok())
        .find(|x| x.matches(query)))
}

pub async fn lookup_hero(fetcher: &Fetcher, query: &Query) -> DisplayMessage {
    let url = fetcher.sources().hero_directory_api.clone();

    let outcome: Result<Option<HeroInfo>, PipelineError> =
        match fetcher.fetch_url(url, ContentKind::Json).await {
            Ok(payload) => find_hero(&payload.body, query).map_err(Into::into),
            Err(e) => Err(e.into()),
        };

    match outcome {
        Ok(Some(hero)) => DisplayMessage::plain(format!(
            "🦸 Hero found!\n\nID: {}\nName: {}\nAPI name: <code>{}</code>",
            hero.id,
            encode_text(&hero.localized_name),
            encode_text(&hero.name)
        )),
        Ok(None) => DisplayMessage::plain(HERO_NOT_FOUND),
        Err(e) => {
            log::warn!("Hero lookup for {} failed: {}", query, e);
            DisplayMessage::plain(failure_text(&e))
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<serde_json::Value>,
}

/// The best text out of an instant answer body, if any.
pub fn pick_search_answer(body: &str) -> Result<Option<String>, ExtractError> {
    let answer: InstantAnswer =
        serde_json::from_str(body).map_err(|_| ExtractError::MarkupChanged)?;

    if !answer.abstract_text.trim().is_empty() {
        return Ok(Some(answer.abstract_text.trim().to_string()));
    }

    // Topic groups don't have "Text" at the top, so they're skipped.
    Ok(answer
        .related_topics
        .iter()
        .filter_map(|x| x.get("Text")?.as_str())
        .map(str::trim)
        .find(|x| !x.is_empty())
        .map(str::to_string))
}

pub async fn web_search(fetcher: &Fetcher, topic: &str) -> DisplayMessage {
    let mut url = fetcher.sources().search_api.clone();
    url.query_pairs_mut()
        .append_pair("q", topic)
        .append_pair("format", "json")
        .append_pair("no_redirect", "1")
        .append_pair("no_html", "1");

    let outcome: Result<Option<String>, PipelineError> =
        match fetcher.fetch_url(url, ContentKind::Json).await {
            Ok(payload) => pick_search_answer(&payload.body).map_err(Into::into),
            Err(e) => Err(e.into()),
        };

    match outcome {
        Ok(Some(text)) => DisplayMessage::plain(format!(
            "🌐 Here's what I found:\n\n{}",
            encode_text(&text)
        )),
        Ok(None) => DisplayMessage::plain(format!(
            "😕 Nothing found for <b>{}</b>.",
            encode_text(topic)
        )),
        Err(e) => {
            log::warn!("Search for {:?} failed: {}", topic, e);
            DisplayMessage::plain(failure_text(&e))
        }
    }
}
