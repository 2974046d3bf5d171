// Library root: re-exports all modules so integration tests and external
// consumers can access the crate's public API.

pub mod config;
pub mod protocol;
pub mod rating;
pub mod stats;
pub mod ws_server;
