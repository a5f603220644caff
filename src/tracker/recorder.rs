use std::sync::Arc;
use tracing::debug;

use super::clock::Clock;
use super::context::RequestContext;
use super::error::{ConfigurationError, VisitsResult};
use super::exclusion::ExcludeRules;
use super::transformer::{Pipeline, PipelineOutcome, TransformerRegistry};
use crate::config::VisitsConfig;
use crate::models::{NewVisit, TrackingMethod, Visit};
use crate::storage::{SimilarQuery, Storage, VISITS_TABLE};

/// Result of a call to [`Recorder::record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Created(Visit),
    Incremented(Visit),
    Skipped(SkipReason),
}

impl RecordOutcome {
    pub fn visit(&self) -> Option<&Visit> {
        match self {
            RecordOutcome::Created(visit) | RecordOutcome::Incremented(visit) => Some(visit),
            RecordOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RecordOutcome::Skipped(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Cli,
    Ajax,
    Excluded,
    /// Carries the name of the transformer that rejected the visit
    Vetoed(String),
}

/// Records page visits, adding views to a recent visit from the same visitor
/// instead of creating a new row.
///
/// Lookup and write are not atomic: two simultaneous first requests from one
/// visitor can both insert a row.
pub struct Recorder {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    tracking_method: TrackingMethod,
    reset_minutes: u32,
    user_source: String,
    ignore_ajax: bool,
    exclusions: ExcludeRules,
    pipeline: Pipeline,
}

impl Recorder {
    /// Validate the configuration and environment once, up front.
    pub async fn new(
        config: &VisitsConfig,
        storage: Arc<dyn Storage>,
        registry: &TransformerRegistry,
        clock: Arc<dyn Clock>,
    ) -> VisitsResult<Self> {
        if !storage.table_exists().await? {
            return Err(ConfigurationError::MissingTable(VISITS_TABLE.to_string()).into());
        }

        let tracking_method = parse_tracking_method(&config.tracking_method)?;
        let reset_minutes = parse_reset_minutes(&config.reset_minutes)?;
        let exclusions = ExcludeRules::compile(&config.exclude_uris)?;
        let pipeline = registry.pipeline(&config.transformers)?;

        Ok(Self {
            storage,
            clock,
            tracking_method,
            reset_minutes,
            user_source: config.user_source.clone(),
            ignore_ajax: config.ignore_ajax,
            exclusions,
            pipeline,
        })
    }

    pub fn tracking_method(&self) -> TrackingMethod {
        self.tracking_method
    }

    pub fn reset_minutes(&self) -> u32 {
        self.reset_minutes
    }

    /// Add a new visit, or increase the view count on a recent similar one.
    pub async fn record(&self, ctx: &RequestContext) -> VisitsResult<RecordOutcome> {
        if ctx.is_cli() {
            return Ok(RecordOutcome::Skipped(SkipReason::Cli));
        }

        if self.ignore_ajax && ctx.is_ajax {
            debug!(url = %ctx.url, "skipping AJAX request");
            return Ok(RecordOutcome::Skipped(SkipReason::Ajax));
        }

        let candidate = self.build_candidate(ctx);

        if self.exclusions.is_excluded(&ctx.url) {
            debug!(url = %ctx.url, "skipping excluded URI");
            return Ok(RecordOutcome::Skipped(SkipReason::Excluded));
        }

        let candidate = match self.pipeline.apply(candidate, ctx) {
            PipelineOutcome::Keep(visit) => visit,
            PipelineOutcome::Vetoed(name) => {
                debug!(url = %ctx.url, transformer = %name, "visit vetoed by transformer");
                return Ok(RecordOutcome::Skipped(SkipReason::Vetoed(name)));
            }
        };

        let now = self.clock.now();

        if let Some(similar) = self.find_similar(&candidate, now).await? {
            if let Some(visit) = self.storage.increment_views(similar.id, now).await? {
                debug!(id = visit.id, views = visit.views, "incremented visit");
                return Ok(RecordOutcome::Incremented(visit));
            }
        }

        let visit = self.storage.insert(&candidate, now).await?;
        debug!(id = visit.id, path = %visit.path, "recorded new visit");
        Ok(RecordOutcome::Created(visit))
    }

    fn build_candidate(&self, ctx: &RequestContext) -> NewVisit {
        NewVisit {
            session_id: ctx.session_id().to_string(),
            user_id: ctx
                .session
                .as_ref()
                .and_then(|s| s.user_id(&self.user_source)),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone().unwrap_or_default(),
            ..NewVisit::from_url(&ctx.url)
        }
    }

    /// A reset window of zero disables matching entirely.
    async fn find_similar(&self, candidate: &NewVisit, now: i64) -> VisitsResult<Option<Visit>> {
        if self.reset_minutes == 0 {
            return Ok(None);
        }

        let query = SimilarQuery {
            method: self.tracking_method,
            value: candidate.tracking_value(self.tracking_method),
            host: &candidate.host,
            path: &candidate.path,
            since: now - i64::from(self.reset_minutes) * 60,
        };

        Ok(self.storage.find_similar(&query).await?)
    }
}

fn parse_tracking_method(raw: &str) -> Result<TrackingMethod, ConfigurationError> {
    if raw.trim().is_empty() {
        return Err(ConfigurationError::NoTrackingMethod);
    }
    raw.parse()
        .map_err(ConfigurationError::UnknownTrackingMethod)
}

fn parse_reset_minutes(raw: &str) -> Result<u32, ConfigurationError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigurationError::InvalidResetMinutes(raw.to_string()))
}
