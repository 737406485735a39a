//! # dualnode-server
//!
//! Coordinator library for the dualnode field-station system.
//!
//! This library provides the API handlers, WebSocket fan-out, and state
//! management for the coordinator binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
