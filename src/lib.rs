//! # Goal Reacher
//!
//! Backend for a goal-tracking planner.
//!
//! This library provides:
//! - An HTTP API that turns a free-text goal into a status, milestones,
//!   missions and a calendar schedule with the help of a language model
//! - Persistence of users, milestones and scheduled tasks in Supabase
//! - Recurrence expansion of saved tasks into concrete calendar events
//!
//! ## Flow
//! 1. The client logs in through the OAuth provider
//! 2. Planning endpoints call the model step by step
//! 3. `save-data` validates every schedule with the expander and stores it
//! 4. `load-data` expands stored tasks over a date window
//!
//! ## Modules
//! - `schedule`: RRULE parsing and lazy occurrence expansion
//! - `planner`: prompt-driven generation on top of `llm`
//! - `store`: persistence seam with Supabase and in-memory backends
//! - `identity`: bearer-token verification and the OAuth code flow

pub mod api;
pub mod config;
pub mod identity;
pub mod llm;
pub mod planner;
pub mod schedule;
pub mod store;

pub use config::Config;
