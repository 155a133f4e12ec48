// Library crate for integration tests.
// main.rs has its own mod declarations; this re-exports all modules.

pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod hub;
pub mod log_capture;
pub mod parsers;
pub mod remote;
pub mod replay;
pub mod routes;
pub mod server;
pub mod state;
