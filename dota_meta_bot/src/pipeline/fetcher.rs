use reqwest::{header, Client};
use url::Url;

use super::{
    types::{ContentKind, FetchError, Payload},
    SourceSpec,
};
use crate::config::{BotConfig, Sources};

/// Does exactly one GET per call. No retries: if upstream changed its
/// layout, asking again won't help.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    sources: Sources,
}

impl Fetcher {
    pub fn new(config: &BotConfig) -> Result<Self, reqwest::Error> {
        // Default policy is to follow up to 10 redirects.
        let client = Client::builder()
            .user_agent(config.sources.user_agent.as_str())
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            sources: config.sources.clone(),
        })
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Where `source` lives.
    pub fn url_for(&self, source: &SourceSpec) -> Url {
        match source {
            SourceSpec::MetaLeaderboard => self.sources.leaderboard.clone(),
            SourceSpec::HeroItemPage(query) => {
                let mut url = self.sources.hero_pages.clone();
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push(query.as_str()).push("items");
                }
                url
            }
            SourceSpec::StatsApiHeroList => self.sources.hero_stats_api.clone(),
        }
    }

    pub async fn fetch(&self, source: &SourceSpec) -> Result<Payload, FetchError> {
        self.fetch_url(self.url_for(source), source.content_kind()).await
    }

    /// GET `url` and hand back its body tagged as `kind`.
    pub async fn fetch_url(&self, url: Url, kind: ContentKind) -> Result<Payload, FetchError> {
        log::debug!("Fetching {}", url);

        let accept = match kind {
            ContentKind::Html => "text/html,application/xhtml+xml",
            ContentKind::Json => "application/json",
        };

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("{} answered with {}", url, status);
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(Payload { kind, body })
    }
}
