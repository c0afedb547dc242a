//! Taskbridge CLI
//!
//! Launches the browser suite and exposes the task boundary from the
//! command line.

pub mod commands;
pub mod output;
