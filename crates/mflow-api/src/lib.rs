//! Axum HTTP surface for Mediaflow.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use auth::{AuthVia, Identity};
pub use config::{ApiConfig, AuthConfig, AuthMode};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, RunningJobs};
