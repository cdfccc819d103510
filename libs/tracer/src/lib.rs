//! Bounded capture sessions.
//!
//! A [`Tracer`] subscribes through a [`capture_api::PubSubClient`] and appends
//! every message inside its time window to one trace partition.
//! [`run_trace`] drives a tracer from validation to final counts.

mod error;
mod run;
mod tracer;

pub use error::{TraceError, TracerError};
pub use run::{TraceOptions, run_trace};
pub use tracer::Tracer;
