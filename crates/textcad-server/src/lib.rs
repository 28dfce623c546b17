//! textcad HTTP server library
//!
//! Exposes the router and its collaborators for tests and embedding.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod render;
pub mod storage;
