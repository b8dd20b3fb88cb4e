//! Logging facilities for Horizon Canopy.
//!
//! # Tracing Integration
//!
//! Horizon Canopy uses the `tracing` crate for instrumentation and never
//! installs a subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("horizon_canopy::router=debug")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Every log statement in the workspace names its target explicitly, so the
//! constants in [`targets`] can be used directly in filter directives.

/// Span names used throughout Horizon Canopy for tracing.
pub mod span_names {
    /// Signal emission span.
    pub const SIGNAL: &str = "horizon_canopy::signal";
    /// Notification routing span.
    pub const ROUTE: &str = "horizon_canopy::route";
    /// Children resolution span.
    pub const RESOLVE_CHILDREN: &str = "horizon_canopy::resolve_children";
    /// Root resolution span.
    pub const RESOLVE_ROOT: &str = "horizon_canopy::resolve_root";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_canopy_core::signal";
    /// Deferred queue target.
    pub const QUEUE: &str = "horizon_canopy_core::queue";
    /// Store adapter and capability probing.
    pub const STORE: &str = "horizon_canopy::store";
    /// Children cache.
    pub const CHILDREN: &str = "horizon_canopy::children";
    /// Change router.
    pub const ROUTER: &str = "horizon_canopy::router";
    /// Root resolver.
    pub const ROOT: &str = "horizon_canopy::root";
    /// Model facade.
    pub const MODEL: &str = "horizon_canopy::model";
}
