use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use url::Url;

/// Browser identity presented to origin CDNs
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Default upstream request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Sample live DASH channel served at `/index.mpd` in dev mode
const DEV_CHANNEL: (&str, &str) = (
    "index.mpd",
    "https://cdn-uw2-prod.tsv2.amagi.tv/linear/amg01006-abs-cbn-abscbn-gma-x7-dash-abscbnono/7c693236-e0c1-40a3-8bd0-bb25e43f5bfc/index.mpd",
);

/// Path segments owned by built-in routes; presets cannot shadow them.
const RESERVED_NAMES: [&str; 4] = ["health", "metrics", "playlist", "segment"];

/// Application configuration loaded from environment variables.
///
/// Built once at startup and shared read-only by every handler.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Public prefix for rewritten links; empty means same-origin relative links
    pub base_url: String,
    pub is_dev: bool,
    /// Preset channel name -> manifest URL, served at `/{name}`
    pub channels: BTreeMap<String, Url>,
    /// Bound on each upstream request, body included
    pub upstream_timeout: Duration,
    pub user_agent: String,
    /// Reject loopback/private IP literals in user-supplied `url` params
    pub block_private_targets: bool,
}

impl Config {
    /// Load configuration from environment variables.
    /// In DEV mode a sample channel is preconfigured and private targets are allowed.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let base_url = env::var("BASE_URL").unwrap_or_default();
        if !base_url.is_empty() {
            Url::parse(&base_url).map_err(|e| format!("BASE_URL is not a valid URL: {e}"))?;
        }

        let channels = match env::var("CHANNELS") {
            Ok(spec) => parse_channels(&spec)?,
            Err(_) if is_dev => {
                let mut channels = BTreeMap::new();
                channels.insert(DEV_CHANNEL.0.to_string(), Url::parse(DEV_CHANNEL.1)?);
                channels
            }
            Err(_) => BTreeMap::new(),
        };

        let timeout_secs: u64 = match env::var("UPSTREAM_TIMEOUT_SECS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err("UPSTREAM_TIMEOUT_SECS must be greater than zero".into());
        }

        let user_agent = env::var("USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let block_private_targets = env::var("BLOCK_PRIVATE_TARGETS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(!is_dev);

        Ok(Config {
            port,
            base_url,
            is_dev,
            channels,
            upstream_timeout: Duration::from_secs(timeout_secs),
            user_agent,
            block_private_targets,
        })
    }
}

/// Parse a `name=url,name=url` preset list.
///
/// Names must be a single non-reserved path segment; URLs must be absolute
/// http(s). Empty entries are skipped.
pub fn parse_channels(spec: &str) -> Result<BTreeMap<String, Url>, String> {
    let mut channels = BTreeMap::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, raw_url) = entry
            .split_once('=')
            .ok_or_else(|| format!("Channel entry '{entry}' must be name=url"))?;
        let name = name.trim();

        if name.is_empty() || name.contains('/') {
            return Err(format!("Invalid channel name '{name}'"));
        }
        if RESERVED_NAMES.contains(&name) {
            return Err(format!("Channel name '{name}' is reserved"));
        }

        let url = Url::parse(raw_url.trim())
            .map_err(|e| format!("Channel '{name}' has an invalid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("Channel '{name}' must use http or https"));
        }

        if channels.insert(name.to_string(), url).is_some() {
            return Err(format!("Channel '{name}' is defined twice"));
        }
    }

    Ok(channels)
}
