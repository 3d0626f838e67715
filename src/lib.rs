//! firdesk - waste transport document (FIR) scanning and management service.
//!
//! Accepts scanned PDF manifests, drives an external page classifier,
//! streams processing progress to the browser, and persists one record per
//! recognized document group to a hosted store.

pub mod cli;
pub mod compose;
pub mod config;
pub mod manifest;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;
