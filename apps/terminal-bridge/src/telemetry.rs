//! Tracing setup.
//!
//! Console subscriber with `RUST_LOG`-style filtering. The bridge logs
//! structured fields (tickets, symbols, retcodes) so the hosting process can
//! grep a single order's life from submission to verification.
//!
//! # Usage
//!
//! ```rust,ignore
//! use terminal_bridge::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry();
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// Respects `RUST_LOG`; defaults to `info`. Safe to call once per process;
/// a second call is a no-op so embedding hosts that already installed a
/// subscriber keep theirs.
pub fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
