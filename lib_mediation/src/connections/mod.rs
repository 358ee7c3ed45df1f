//! # Connections Module
//!
//! This module handles the persistent connection to PostgreSQL, the only
//! external service the mediation engines depend on.

/// Module for PostgreSQL connection pooling and the priority store.
pub mod db_postgres;

/// Module for building the parameterized stale-network delete.
pub mod sql_builder;
