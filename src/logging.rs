//! Logging setup for the `kh` binary.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over `[logging] level` in the config file:
//!
//! ```bash
//! RUST_LOG=knowledge_harness_core=debug kh retrieve "opening hours"
//! ```

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Install the global subscriber. Only the first call takes effect.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}
