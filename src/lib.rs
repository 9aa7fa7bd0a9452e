pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{context, orchestrator, supervisor};
pub use domain::types;
pub use infrastructure::{model, server, toolserver};

use tracing_subscriber::{EnvFilter, fmt};

/// Install the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
