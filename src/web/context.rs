use axum::extract::ConnectInfo;
use axum::http::{header, request::Parts, HeaderMap};
use std::net::SocketAddr;
use tracing::warn;

use super::ip_extractor::ClientIpExtractor;
use crate::tracker::{RequestContext, Session};

/// Builds a [`RequestContext`] from an incoming axum request
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    extractor: ClientIpExtractor,
    default_scheme: String,
}

impl ContextBuilder {
    pub fn new(extractor: ClientIpExtractor, default_scheme: impl Into<String>) -> Self {
        Self {
            extractor,
            default_scheme: default_scheme.into(),
        }
    }

    /// Returns `None` when no valid URL can be rebuilt from the request.
    pub fn build(&self, parts: &Parts) -> Option<RequestContext> {
        let headers = &parts.headers;
        let url = self.current_url(parts)?;

        let socket_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let mut ctx = RequestContext::http(url);
        ctx.is_ajax = is_ajax(headers);
        ctx.session = parts.extensions.get::<Session>().cloned();
        ctx.user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        ctx.ip_address = self
            .extractor
            .extract(headers, socket_ip)
            .map(|ip| ip.to_string());

        Some(ctx)
    }

    fn current_url(&self, parts: &Parts) -> Option<url::Url> {
        let headers = &parts.headers;

        let scheme = parts
            .uri
            .scheme_str()
            .or_else(|| self.extractor.forwarded_proto(headers))
            .unwrap_or(self.default_scheme.as_str());

        let host = parts
            .uri
            .authority()
            .map(|a| a.as_str())
            .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()))
            .unwrap_or("localhost");

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let raw = format!("{scheme}://{host}{path_and_query}");
        match url::Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(url = %raw, error = %err, "could not rebuild request URL");
                None
            }
        }
    }
}

/// Matches the `X-Requested-With: XMLHttpRequest` convention
pub fn is_ajax(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
}
