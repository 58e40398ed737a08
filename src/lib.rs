//! stream-relay: a CORS-friendly reverse proxy for live HLS and DASH streams.
//!
//! Manifests are fetched from their origin, every media reference is
//! rewritten to come back through `/segment`, and segments are streamed
//! through without buffering.

pub mod config;
pub mod error;
pub mod manifest;
pub mod metrics;
pub mod server;
pub mod upstream;
