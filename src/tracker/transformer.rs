//! Pluggable hooks run on a candidate visit before it is recorded.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use super::context::RequestContext;
use super::error::ConfigurationError;
use crate::models::NewVisit;

pub trait Transformer: Send + Sync {
    /// Name used to select this transformer in configuration
    fn name(&self) -> &str;

    /// Return the (possibly modified) visit, or `None` to skip recording.
    fn transform(&self, visit: NewVisit, ctx: &RequestContext) -> Option<NewVisit>;
}

/// Transformers available for selection by name
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, Arc<dyn Transformer>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the transformers shipped in this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AnonymizeIp));
        registry.register(Arc::new(StripQuery));
        registry
    }

    pub fn register(&mut self, transformer: Arc<dyn Transformer>) {
        self.transformers
            .insert(transformer.name().to_string(), transformer);
    }

    /// Build the ordered pipeline for the given names
    pub fn pipeline<S: AsRef<str>>(&self, names: &[S]) -> Result<Pipeline, ConfigurationError> {
        let steps = names
            .iter()
            .map(|name| {
                let name = name.as_ref().trim();
                self.transformers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigurationError::UnknownTransformer(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Pipeline { steps })
    }
}

/// Ordered transformers, each fed the previous one's output
#[derive(Clone, Default)]
pub struct Pipeline {
    steps: Vec<Arc<dyn Transformer>>,
}

pub enum PipelineOutcome {
    Keep(NewVisit),
    /// Name of the transformer that rejected the visit
    Vetoed(String),
}

impl Pipeline {
    pub fn apply(&self, visit: NewVisit, ctx: &RequestContext) -> PipelineOutcome {
        let mut current = visit;
        for step in &self.steps {
            match step.transform(current, ctx) {
                Some(next) => current = next,
                None => return PipelineOutcome::Vetoed(step.name().to_string()),
            }
        }
        PipelineOutcome::Keep(current)
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Truncates IPv4 addresses to /24 and IPv6 addresses to /48
pub struct AnonymizeIp;

impl Transformer for AnonymizeIp {
    fn name(&self) -> &str {
        "anonymize_ip"
    }

    fn transform(&self, mut visit: NewVisit, _ctx: &RequestContext) -> Option<NewVisit> {
        visit.ip_address = visit
            .ip_address
            .as_deref()
            .and_then(|ip| ip.parse::<IpAddr>().ok())
            .map(|ip| anonymize_ip(ip).to_string());
        Some(visit)
    }
}

/// Drops the query string so that `/page?a=1` and `/page?a=2` look alike
pub struct StripQuery;

impl Transformer for StripQuery {
    fn name(&self) -> &str {
        "strip_query"
    }

    fn transform(&self, mut visit: NewVisit, _ctx: &RequestContext) -> Option<NewVisit> {
        visit.query = None;
        Some(visit)
    }
}

pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            // keep the first 48 bits
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}
