pub mod auth;
pub mod configuration;
pub mod error;
pub mod middleware;
pub mod store;
pub mod telemetry;
pub mod validators;

pub use auth::{AccessClaims, AuthService, RefreshOutcome, TokenPair};
pub use error::AppError;
