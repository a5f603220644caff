mod visit;

pub use visit::{NewVisit, TopPath, TrackingMethod, Visit};
