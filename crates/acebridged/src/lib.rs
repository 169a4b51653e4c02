//! AceBridge daemon library - exposes modules for testing.

pub mod adapter;
pub mod config;
pub mod poller;
pub mod printer_client;
