//! Portico - virtual-host static file server
//!
//! Core library: request parsing, virtual host resolution, the custom
//! handler chain and the zero-copy file streamer.

pub mod config;
pub mod files;
pub mod handler;
pub mod http;
pub mod server;
pub mod vhost;
