// ABOUTME: Root library module for the chat service and its CLI
// ABOUTME: Provides access to config, storage, auth, HTTP server and client commands

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod paths;
pub mod server;
pub mod store;

// Re-export the chat core for convenience
pub use portal_chat_core as core;
