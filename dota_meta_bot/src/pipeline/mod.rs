//! Fetch → extract → rank → reply, one linear pass per request.
//!
//! Nothing in here keeps state between calls, so any number of requests
//! can run through one [`Pipeline`] at once.

pub mod extractor;
pub mod fetcher;
pub mod ranking;
pub mod responder;
pub mod types;

use extractor::{extract, ExtractOptions};
use fetcher::Fetcher;
use responder::{respond, DisplayMessage};
use types::{ContentKind, PipelineError, Query, StatRecord};

use crate::config::BotConfig;

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    MetaLeaderboard,
    HeroItemPage(Query),
    StatsApiHeroList,
}

/// How to read what was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Leaderboard,
    ItemBuild,
    ApiHeroStats,
}

impl SourceSpec {
    pub fn content_kind(&self) -> ContentKind {
        match self {
            Self::MetaLeaderboard | Self::HeroItemPage(_) => ContentKind::Html,
            Self::StatsApiHeroList => ContentKind::Json,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::MetaLeaderboard => Mode::Leaderboard,
            Self::HeroItemPage(_) => Mode::ItemBuild,
            Self::StatsApiHeroList => Mode::ApiHeroStats,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    fetcher: Fetcher,
    min_picks: u64,
    top_n: usize,
}

impl Pipeline {
    pub fn new(config: &BotConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            fetcher: Fetcher::new(config)?,
            min_picks: config.min_picks,
            top_n: config.top_n.get(),
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetch and extract, without presenting anything.
    pub async fn records(&self, source: &SourceSpec) -> Result<Vec<StatRecord>, PipelineError> {
        let payload = self.fetcher.fetch(source).await?;

        let options = ExtractOptions {
            min_picks: self.min_picks,
            base_url: Some(self.fetcher.url_for(source)),
        };

        Ok(extract(&payload, source.mode(), &options)?)
    }

    /// The whole thing. Never fails; failures become a friendly message.
    pub async fn run(&self, source: &SourceSpec) -> DisplayMessage {
        let outcome = self.records(source).await;

        match &outcome {
            Ok(records) => log::debug!("{:?} gave {} records", source, records.len()),
            Err(e) => log::warn!("{:?} failed: {}", source, e),
        }

        respond(
            source,
            outcome,
            self.top_n,
            Some(self.fetcher.url_for(source)),
        )
    }
}
