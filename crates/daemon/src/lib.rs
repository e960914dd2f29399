// Service modules (HTTP server, configuration, lifecycle)
pub mod config;
pub mod http_server;
pub mod process;
pub mod state;

// Re-exports for consumers (integration tests, main)
pub use config::{Config, ConfigError};
pub use state::ServiceState;
