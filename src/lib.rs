//! appssh library
//!
//! Shell and tunnel access to deployed application instances. Exposed as a
//! library for the binary and the integration tests.

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod ssh;

pub(crate) mod security_log;
