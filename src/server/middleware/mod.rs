pub mod auth;

pub use auth::monitor_token_middleware;
