//! Structured logging bootstrap, shared by all three workers.
//!
//! Mirrors the shape of the teacher's `trace::init` (env-filter driven
//! `tracing_subscriber` registry): a worker calls [`init`] once at startup
//! with the filter directive from [`crate::config::PipelineConfig::log_filter`].

use tracing_subscriber::{fmt, EnvFilter};

pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .ok();
}
