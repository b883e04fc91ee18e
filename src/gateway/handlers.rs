//! HTTP handlers
//!
//! - [`wallet`]: user endpoints (JWT)
//! - [`webhook`]: provider callbacks (always acknowledged)
//! - [`admin`]: operator endpoints (`X-Internal-Secret`)
//! - [`health`]: liveness

pub mod admin;
pub mod health;
pub mod wallet;
pub mod webhook;

// Globs carry the `__path_*` items `#[utoipa::path]` generates
pub use admin::*;
pub use health::*;
pub use wallet::*;
pub use webhook::*;
