pub mod config;
pub mod error;
pub mod report;
pub mod tmux;

pub use config::SentinelConfig;
pub use error::SentinelError;
