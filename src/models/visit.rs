use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// A stored visit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Visit {
    pub id: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<i32>,
    pub path: String,
    pub query: Option<String>,
    pub views: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Candidate visit built from the current request, before it is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVisit {
    pub session_id: String,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<i32>,
    pub path: String,
    pub query: Option<String>,
}

impl NewVisit {
    /// Start a candidate from the components of a full URL.
    pub fn from_url(url: &url::Url) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port().map(i32::from),
            path: url.path().to_string(),
            query: url.query().map(str::to_string),
            ..Self::default()
        }
    }

    /// Value of the column used to correlate this visitor.
    pub fn tracking_value(&self, method: TrackingMethod) -> Option<&str> {
        match method {
            TrackingMethod::IpAddress => self.ip_address.as_deref(),
            TrackingMethod::SessionId => Some(self.session_id.as_str()),
            TrackingMethod::UserId => self.user_id.as_deref(),
        }
    }
}

/// Column used to decide whether two requests come from the same visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMethod {
    IpAddress,
    SessionId,
    UserId,
}

impl TrackingMethod {
    pub const fn column(self) -> &'static str {
        match self {
            TrackingMethod::IpAddress => "ip_address",
            TrackingMethod::SessionId => "session_id",
            TrackingMethod::UserId => "user_id",
        }
    }
}

impl fmt::Display for TrackingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for TrackingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ip_address" => Ok(TrackingMethod::IpAddress),
            "session_id" => Ok(TrackingMethod::SessionId),
            "user_id" => Ok(TrackingMethod::UserId),
            other => Err(other.to_string()),
        }
    }
}

/// Aggregated views for one page
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TopPath {
    pub host: String,
    pub path: String,
    pub visits: i64,
    pub views: i64,
}
