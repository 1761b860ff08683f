//! forumd - real-time presence and direct chat for the forum.
//!
//! This library exposes the daemon's modules for the binary and for
//! integration testing.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod metrics;
pub mod network;
pub mod routing;
pub mod server;
pub mod state;

pub use server::Server;
