//! Taskbridge Web
//!
//! HTTP transport for the task boundary: an axum server in front of the
//! dispatcher and a reqwest client implementing `TaskInvoker`.

pub mod client;
pub mod server;

pub use client::{BoundaryClient, DEFAULT_BOUNDARY_URL};
pub use server::{BoundaryServer, BoundaryState};
