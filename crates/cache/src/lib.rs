//! Caches: memoized per-model vertex streams and short-lived panel surfaces.
//!
//! # Invariants
//! - Cache entries are keyed by stable integer handles, never by object identity.
//! - A scene reload clears the model cache wholesale; no entry survives it.
//! - Panel resources unused for more than the idle threshold are dropped at frame end.

mod model;
mod panel;

pub use model::{CachedVertexData, MAX_MODEL_HANDLES, ModelCache, ModelCacheStats, ModelHandle};
pub use panel::{DEFAULT_PANEL_MAX_IDLE, PanelCache, PanelEntry};

pub fn crate_info() -> &'static str {
    "isoraster-cache v0.1.0"
}
