//! # Configuration Modules
//!
//! Process configuration for the mediation server, read from the command
//! line, the environment and an optional `.env` file.

/// Provides the server configuration and its validation.
pub mod config_app;
