//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Balance cache and operation state machine produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (daemon only, opt-in)
//! ```

pub mod logging;
pub mod metrics;
