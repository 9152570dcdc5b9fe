// ABOUTME: Library root for hopgate - policy-gated command execution via an SSH gateway.
// ABOUTME: The main binary is in main.rs.

pub mod broker;
pub mod config;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod secret;
pub mod ssh;
