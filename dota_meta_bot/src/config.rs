use std::{num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not get the bot token: {0}")]
    Token(#[from] std::io::Error),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Where to fetch things from.
#[derive(Debug, Clone)]
pub struct Sources {
    pub leaderboard: Url,
    /// Item pages live at `<this>/<hero slug>/items`.
    pub hero_pages: Url,
    pub hero_stats_api: Url,
    pub hero_directory_api: Url,
    pub search_api: Url,
    pub user_agent: String,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            leaderboard: Url::parse("https://www.dotabuff.com/heroes/meta")
                .expect("URL will always be valid"),
            hero_pages: Url::parse("https://www.dotabuff.com/heroes/")
                .expect("URL will always be valid"),
            hero_stats_api: Url::parse("https://api.opendota.com/api/heroStats")
                .expect("URL will always be valid"),
            hero_directory_api: Url::parse("https://api.opendota.com/api/heroes")
                .expect("URL will always be valid"),
            search_api: Url::parse("https://api.duckduckgo.com/")
                .expect("URL will always be valid"),
            user_agent: String::from(concat!(
                "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) ",
                "Gecko/20100101 Firefox/128.0"
            )),
        }
    }
}

/// Images in the stats API are paths relative to this.
pub const STATS_API_IMAGE_BASE: &str = "https://cdn.cloudflare.steamstatic.com";

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Url,
    pub port: u16,
}

/// Everything the bot is configured with. Built once in `entry` and
/// shared by `Arc` from there on.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    pub top_n: NonZeroUsize,
    pub request_timeout: Duration,
    pub min_picks: u64,
    pub admin_password: Option<String>,
    pub transcript_path: PathBuf,
    pub transcript_cap: NonZeroUsize,
    pub webhook: Option<WebhookConfig>,
    pub sources: Sources,
}

impl BotConfig {
    pub const DEFAULT_TOP_N: usize = 10;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
    pub const DEFAULT_MIN_PICKS: u64 = 20;
    pub const DEFAULT_TRANSCRIPT_CAP: usize = 500;
    pub const DEFAULT_PORT: u16 = 10000;

    pub fn from_env() -> Result<Self, ConfigError> {
        let token = bot_commons::read_bot_key("BOT_TOKEN")?;
        Self::from_lookup(token, |var| std::env::var(var).ok())
    }

    /// Build the config with `lookup` standing in for the environment.
    /// Empty values count as unset.
    pub fn from_lookup(
        token: String,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|x| x.trim().to_string())
                .filter(|x| !x.is_empty())
        };

        let top_n = parse_var(&get, "TOP_N")?
            .unwrap_or(NonZeroUsize::new(Self::DEFAULT_TOP_N).expect("Default is nonzero"));
        let timeout_secs: u64 =
            parse_var(&get, "REQUEST_TIMEOUT_SECS")?.unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: timeout_secs.to_string(),
            });
        }
        let min_picks = parse_var(&get, "MIN_PICKS")?.unwrap_or(Self::DEFAULT_MIN_PICKS);
        let transcript_cap = parse_var(&get, "TRANSCRIPT_CAP")?.unwrap_or(
            NonZeroUsize::new(Self::DEFAULT_TRANSCRIPT_CAP).expect("Default is nonzero"),
        );

        let webhook_url = match (get("WEBHOOK_URL"), get("RENDER_EXTERNAL_HOSTNAME")) {
            (Some(url), _) => Some(("WEBHOOK_URL", url)),
            (None, Some(host)) => Some(("RENDER_EXTERNAL_HOSTNAME", format!("https://{}", host))),
            (None, None) => None,
        };

        let webhook = match webhook_url {
            Some((var, url)) => {
                let base = Url::parse(&url).map_err(|_| ConfigError::Invalid {
                    var,
                    value: url.clone(),
                })?;
                // Telegram only knows where to send updates if the path is set,
                // and the listener serves on that same path.
                let url = base.join("webhook").map_err(|_| ConfigError::Invalid {
                    var,
                    value: url.clone(),
                })?;
                let port = parse_var(&get, "PORT")?.unwrap_or(Self::DEFAULT_PORT);
                Some(WebhookConfig { url, port })
            }
            None => None,
        };

        Ok(Self {
            token,
            top_n,
            request_timeout: Duration::from_secs(timeout_secs),
            min_picks,
            admin_password: get("ADMIN_PASSWORD"),
            transcript_path: get("TRANSCRIPT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("transcript.json")),
            transcript_cap,
            webhook,
            sources: Sources::default(),
        })
    }

    /// Checks a password against the admin one. Always false if there's none.
    pub fn is_admin_password(&self, password: &str) -> bool {
        self.admin_password
            .as_deref()
            .is_some_and(|x| x == password.trim())
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = get(var) else {
        return Ok(None);
    };

    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { var, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{BotConfig, ConfigError};

    fn config_with(vars: &[(&str, &str)]) -> Result<BotConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup("123:abc".to_string(), |var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.top_n.get(), 10);
        assert_eq!(config.request_timeout.as_secs(), 15);
        assert_eq!(config.min_picks, 20);
        assert_eq!(config.transcript_cap.get(), 500);
        assert!(config.admin_password.is_none());
        assert!(config.webhook.is_none());
        assert!(!config.is_admin_password(""));
    }

    #[test]
    fn overrides() {
        let config = config_with(&[
            ("TOP_N", "5"),
            ("REQUEST_TIMEOUT_SECS", " 10 "),
            ("MIN_PICKS", "0"),
            ("ADMIN_PASSWORD", "hunter2"),
            ("RENDER_EXTERNAL_HOSTNAME", "meta-bot.onrender.com"),
        ])
        .unwrap();
        assert_eq!(config.top_n.get(), 5);
        assert_eq!(config.request_timeout.as_secs(), 10);
        assert_eq!(config.min_picks, 0);
        assert!(config.is_admin_password("hunter2"));
        assert!(!config.is_admin_password("hunter3"));

        let webhook = config.webhook.unwrap();
        assert_eq!(
            webhook.url.as_str(),
            "https://meta-bot.onrender.com/webhook"
        );
        assert_eq!(webhook.port, 10000);
    }

    #[test]
    fn bad_values() {
        assert!(matches!(
            config_with(&[("TOP_N", "0")]),
            Err(ConfigError::Invalid { var: "TOP_N", .. })
        ));
        assert!(matches!(
            config_with(&[("TOP_N", "ten")]),
            Err(ConfigError::Invalid { var: "TOP_N", .. })
        ));
        assert!(matches!(
            config_with(&[("REQUEST_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config_with(&[("WEBHOOK_URL", "not a url")]),
            Err(ConfigError::Invalid { var: "WEBHOOK_URL", .. })
        ));
    }
}
