use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub visits: VisitsConfig,
    pub request: RequestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Visit tracking settings.
///
/// `tracking_method` and `reset_minutes` stay as raw strings here; they are
/// validated once when the [`Recorder`](crate::tracker::Recorder) is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitsConfig {
    /// Transformer names, applied in order before a visit is recorded
    #[serde(default)]
    pub transformers: Vec<String>,

    /// Attach the tracking middleware to every route
    pub track_all_pages: bool,

    /// One of `ip_address`, `session_id` or `user_id`
    pub tracking_method: String,

    /// Session key holding the logged-in user ID
    pub user_source: String,

    /// Minutes before a repeat visit counts as new instead of adding a view.
    /// Zero records every page view separately.
    pub reset_minutes: String,

    /// Skip requests sent with `X-Requested-With: XMLHttpRequest`
    pub ignore_ajax: bool,

    /// Literal URIs or regex patterns that are never tracked
    #[serde(default)]
    pub exclude_uris: Vec<String>,
}

impl Default for VisitsConfig {
    fn default() -> Self {
        Self {
            transformers: Vec::new(),
            track_all_pages: true,
            tracking_method: "ip_address".to_string(),
            user_source: "logged_in".to_string(),
            reset_minutes: "60".to_string(),
            ignore_ajax: true,
            exclude_uris: Vec::new(),
        }
    }
}

/// How the host request is turned into a visit context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Scheme used when the request URI carries none
    pub default_scheme: String,
    /// Cookie read by the demo session middleware
    pub session_cookie_name: String,
    pub trusted_proxy_mode: TrustedProxyMode,
    /// CIDR ranges of proxies allowed to set forwarding headers
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// Fixed number of proxies in front of the server (overrides `trusted_proxies`)
    pub num_trusted_proxies: Option<usize>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_scheme: "http".to_string(),
            session_cookie_name: "visits_session".to_string(),
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    None,
    /// Honor `Forwarded` and `X-Forwarded-For`
    Standard,
    /// Honor `CF-Connecting-IP`
    Cloudflare,
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl VisitsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            transformers: env_list("VISITS_TRANSFORMERS"),
            track_all_pages: env_bool("VISITS_TRACK_ALL_PAGES", defaults.track_all_pages),
            tracking_method: std::env::var("VISITS_TRACKING_METHOD")
                .unwrap_or(defaults.tracking_method),
            user_source: std::env::var("VISITS_USER_SOURCE").unwrap_or(defaults.user_source),
            reset_minutes: std::env::var("VISITS_RESET_MINUTES")
                .unwrap_or(defaults.reset_minutes),
            ignore_ajax: env_bool("VISITS_IGNORE_AJAX", defaults.ignore_ajax),
            exclude_uris: env_list("VISITS_EXCLUDE_URIS"),
        }
    }
}

impl RequestConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        Ok(Self {
            default_scheme: std::env::var("DEFAULT_SCHEME").unwrap_or(defaults.default_scheme),
            session_cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or(defaults.session_cookie_name),
            trusted_proxy_mode,
            trusted_proxies: env_list("TRUSTED_PROXIES"),
            num_trusted_proxies,
        })
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./visits.db?mode=rwc".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid port number")?;

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            visits: VisitsConfig::from_env(),
            request: RequestConfig::from_env()?,
        })
    }
}
