//! Client IP extraction from HTTP headers with trust validation
//!
//! - `Forwarded` (RFC 7239) is preferred over `X-Forwarded-For`
//! - Forwarding chains are walked right to left, skipping trusted proxies
//! - Cloudflare mode reads `CF-Connecting-IP`
//! - Everything falls back to the socket address

use anyhow::Context;
use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{RequestConfig, TrustedProxyMode};

#[derive(Debug, Clone)]
pub struct ClientIpExtractor {
    mode: TrustedProxyMode,
    trusted: Vec<IpNet>,
    num_trusted: Option<usize>,
}

impl ClientIpExtractor {
    pub fn from_config(config: &RequestConfig) -> anyhow::Result<Self> {
        let trusted = config
            .trusted_proxies
            .iter()
            .map(|entry| parse_net(entry))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            mode: config.trusted_proxy_mode,
            trusted,
            num_trusted: config.num_trusted_proxies,
        })
    }

    /// Extract the client IP according to the trust configuration.
    /// Returns `None` only when neither headers nor the socket provide one.
    pub fn extract(&self, headers: &HeaderMap, socket_addr: Option<IpAddr>) -> Option<IpAddr> {
        match self.mode {
            TrustedProxyMode::None => socket_addr,
            TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).or_else(|| {
                warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
                socket_addr
            }),
            TrustedProxyMode::Standard => {
                // Forwarding headers from an untrusted peer are ignored
                if let Some(peer) = socket_addr {
                    if !self.trusted.is_empty() && !self.is_trusted(peer) {
                        return Some(peer);
                    }
                }
                self.extract_standard_ip(headers).or(socket_addr)
            }
        }
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted.iter().any(|net| net.contains(&ip))
    }

    fn extract_standard_ip(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let chain = forwarded_chain(headers)
            .filter(|c| !c.is_empty())
            .or_else(|| x_forwarded_for_chain(headers))?;

        self.pick_from_chain(&chain)
    }

    fn pick_from_chain(&self, chain: &[IpAddr]) -> Option<IpAddr> {
        if let Some(num_trusted) = self.num_trusted {
            if chain.len() > num_trusted {
                return Some(chain[chain.len() - num_trusted - 1]);
            }
            // Not enough hops, return the leftmost
            return chain.first().copied();
        }

        if !self.trusted.is_empty() {
            return chain
                .iter()
                .rev()
                .find(|ip| !self.is_trusted(**ip))
                .or_else(|| chain.first())
                .copied();
        }

        chain.last().copied()
    }

    /// `X-Forwarded-Proto` value, honored only behind a proxy
    pub fn forwarded_proto<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        if self.mode == TrustedProxyMode::None {
            return None;
        }
        headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim())
            .filter(|s| matches!(*s, "http" | "https"))
    }
}

fn parse_net(entry: &str) -> anyhow::Result<IpNet> {
    let entry = entry.trim();
    if let Ok(net) = entry.parse::<IpNet>() {
        return Ok(net);
    }
    entry
        .parse::<IpAddr>()
        .map(IpNet::from)
        .with_context(|| format!("invalid trusted proxy '{entry}'"))
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// `for=` addresses of the RFC 7239 `Forwarded` header, in header order
fn forwarded_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    let chain = forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("for") {
                return None;
            }
            parse_node(value)
        })
        .collect();

    Some(chain)
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    (!chain.is_empty()).then_some(chain)
}

/// Parse a node like `192.0.2.60`, `192.0.2.60:8080`, `"[2001:db8::1]:4711"`
fn parse_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    value.rsplit_once(':')?.0.parse().ok()
}
