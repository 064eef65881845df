//! Observability module
//!
//! Logging, metrics, and the structured event stream used to follow trials
//! as they run.

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventEmitter, EventObserver};
pub use logging::{LogFormat, init_logging};
pub use metrics::init_metrics;
