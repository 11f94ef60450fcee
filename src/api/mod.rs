//! HTTP API for the goal planner.
//!
//! Public routes cover the health check, the OAuth login flow, user
//! registration and the planning endpoints. Routes that read or write a
//! user's saved plan sit behind [`auth::require_auth`].

mod auth;
mod chat;
mod data;
mod routes;
pub mod types;

pub use auth::AuthUser;
pub use routes::{router, serve, AppState};
