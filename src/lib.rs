//! Typed TypeScript client bindings generated from OpenAPI v2/v3 documents.
//!
//! The pipeline loads a document into a canonical schema graph, resolves the
//! persisted endpoint selection against it, collects one
//! [`collector::ParameterSet`] per confirmed operation, emits type modules
//! and a registry module as syntax trees, merges pinned entries out of the
//! previous registry, and writes everything through a signature-cached
//! idempotent writer.

pub mod collector;
pub mod document;
pub mod emitter;
pub mod error;
pub mod graph;
pub mod loader;
pub mod pipeline;
pub mod selection;
pub mod synthesizer;
pub mod writer;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes tracing from `BINDGEN_LOG`.
///
/// A bare level name (`debug`) applies to this crate only; anything
/// containing `=` or `,` is taken as a full filter spec.
pub fn init_tracing() {
    let spec = std::env::var("BINDGEN_LOG").unwrap_or_else(|_| "warn".to_string());
    let filter = if spec.contains('=') || spec.contains(',') {
        EnvFilter::new(spec)
    } else {
        EnvFilter::new(format!("openapi_bindgen={spec}"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
