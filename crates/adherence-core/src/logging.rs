//! Tracing subscriber setup for host applications and tools.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "adherence_core=info";

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Adherence core v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
    installed
}
