//! # Priority Lists
//!
//! Data model, store capability and the engines built on top of it.

/// Closed error taxonomy shared by every engine.
pub mod error;
/// Lists, networks and request/response shapes.
pub mod models;
/// The storage capability the engines are generic over.
pub mod store;
/// Transaction-staging in-memory store.
pub mod memory;
/// Replacement upsert engine (write path).
pub mod upsert;
/// Contextual selection engine (read path).
pub mod selection;
/// Read-side grouping for the dashboard.
pub mod dashboard;
/// Bundles the engines over one shared store.
pub mod service;
