// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod difficulty;
pub mod evaluate;
pub mod protocol;
pub mod router;
pub mod runtime;
pub mod session;
pub mod session_log;
pub mod stats;
pub mod sweep;
