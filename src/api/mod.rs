//! JSON HTTP API.
//!
//! Identity comes from a trusted header set by the login gateway; every
//! handler acts on behalf of that user only.

pub mod forms;
mod server;

pub use server::{AppState, CurrentUser, build_router, start_server};
