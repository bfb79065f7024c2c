mod auth;
mod client;
mod fetch;

pub use auth::{
    AuthClient, AuthOutcome, Registration, validate_email, validate_password, validate_username,
};
pub use client::{ApiClient, ApiError, ApiResult, SensorPayload, TimeRange};
pub use fetch::{FetchEvent, FetchTask, spawn_explorer_fetch};
