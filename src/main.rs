//! ==============================================================================
//! main.rs - pipeline monitor entry point
//! ==============================================================================
//!
//! purpose:
//!     boots the console: configuration, logging, the persisted key-value
//!     store, the application context (session rehydration happens here) and
//!     finally the web server.
//!
//! responsibilities:
//!     - read monitor.toml (or fall back to defaults)
//!     - set up tracing from `[logging] level`, RUST_LOG wins when set
//!     - open the store and build the shared context
//!     - serve until the process is stopped
//!
//! relationships:
//!     - uses: config.rs, context.rs, server.rs
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                     pipeline-monitor                     │
//!     │  ┌────────────┐   ┌─────────────┐   ┌─────────────────┐  │
//!     │  │ key-value  │──>│ app context │<──│   web server    │  │
//!     │  │   store    │   │ (RwLock)    │   │ (gate + routes) │  │
//!     │  └────────────┘   └──────┬──────┘   └────────┬────────┘  │
//!     │                          │ watch              │ sse      │
//!     │                   ┌──────┴──────┐             │          │
//!     │                   │ telemetry   │─────────────┘          │
//!     │                   │ feeds       │  (one per open view)   │
//!     │                   └─────────────┘                        │
//!     └──────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pipeline_monitor::config::{ConfigOrigin, HostConfig};
use pipeline_monitor::context::{open_store, AppContext};
use pipeline_monitor::server;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration (its origin is logged once the subscriber is up)
    let (config, origin) = match std::env::args().nth(1) {
        Some(path) => (HostConfig::load(&path)?, ConfigOrigin::file(&path)),
        None => HostConfig::load_or_default(),
    };

    // step 2: logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level)));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    tracing::info!("===========================================================");
    tracing::info!("  69-BH12-NER Pipeline Monitor");
    tracing::info!("===========================================================");
    origin.log();
    config.log_summary();

    // step 3: store + context
    let store = open_store(&config.storage);
    let bind = config.server.bind.clone();
    let ctx = AppContext::new(config, store).shared();
    tracing::info!("[STARTUP] context ready");

    // step 4: serve
    if let Err(e) = server::serve(ctx, &bind).await {
        tracing::error!("[ERROR] Web server error: {:#}", e);
        return Err(e);
    }
    Ok(())
}
