//! Optional log output for hosts without a Rust subscriber.
//!
//! The crate only emits `tracing` events. A host that already installs a
//! subscriber gets them for free; a C host can call [`init_logging`]
//! (`netbridge_init_logging`) to print them to stderr.

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Filter used when none is given and `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "netbridge=info";

// ============================================================================
// Functions
// ============================================================================

/// Installs a global fmt subscriber.
///
/// `filter` uses `EnvFilter` syntax (`"netbridge=debug,warn"`). With `None`,
/// `RUST_LOG` is used, falling back to [`DEFAULT_FILTER`]. Succeeds without
/// doing anything if a global subscriber is already installed.
///
/// # Errors
///
/// Returns [`Error::Config`] if `filter` does not parse.
pub fn init_logging(filter: Option<&str>) -> Result<()> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)
            .map_err(|e| Error::config(format!("invalid log filter '{directives}': {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok();

    if !installed {
        debug!("Global subscriber already installed");
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
