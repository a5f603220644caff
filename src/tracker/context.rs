//! Framework-independent view of the current request.

use serde_json::Value;
use std::collections::HashMap;

/// How the current code path was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Http,
    Cli,
}

/// Session state supplied by the host application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub id: String,
    pub data: HashMap<String, Value>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Read a user ID stored under `key`. Strings and numbers are accepted;
    /// null, empty strings and other JSON types count as absent.
    pub fn user_id(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Everything the recorder needs to know about the request being served.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub invocation: Invocation,
    /// Full URL of the current request
    pub url: url::Url,
    pub is_ajax: bool,
    pub session: Option<Session>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl RequestContext {
    pub fn http(url: url::Url) -> Self {
        Self {
            invocation: Invocation::Http,
            url,
            is_ajax: false,
            session: None,
            user_agent: None,
            ip_address: None,
        }
    }

    pub fn is_cli(&self) -> bool {
        self.invocation == Invocation::Cli
    }

    pub fn session_id(&self) -> &str {
        self.session.as_ref().map(|s| s.id.as_str()).unwrap_or_default()
    }
}
