//! Read-only HTTP query surface over the snapshot cache and the fruit database.
//!
//! **Feature flag:** `server`
//!
//! Every endpoint answers `{ "status": 200, ... }` on success. When the requested data is
//! not available the response is HTTP 500 with `{ "status": 500, "error": "..." }`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::Cli;
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
