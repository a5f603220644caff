//! Visit recording.
//!
//! The [`Recorder`] turns a [`RequestContext`] into at most one write: either
//! a new visit row or one more view on a recent visit by the same visitor.

pub mod clock;
pub mod context;
pub mod error;
pub mod exclusion;
pub mod recorder;
pub mod transformer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{Invocation, RequestContext, Session};
pub use error::{ConfigurationError, VisitsError, VisitsResult};
pub use exclusion::{ExcludeRule, ExcludeRules};
pub use recorder::{RecordOutcome, Recorder, SkipReason};
pub use transformer::{Pipeline, PipelineOutcome, Transformer, TransformerRegistry};
