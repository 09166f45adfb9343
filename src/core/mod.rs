pub mod backend;
pub mod config;

pub use backend::{Backend, SessionHandle};
pub use config::{Config, DatabaseConfig, LogConfig, SeleniumConfig};
