//! Structured logging.
//!
//! # Responsibilities
//! - Install the tracing subscriber for hosts that do not bring their own
//!
//! # Design Decisions
//! - `RUST_LOG` wins; the caller's directive applies only when it is unset
//! - Installing twice is reported, not fatal

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "revproxy_conf=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `default_directive`.
pub fn init_logging(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
