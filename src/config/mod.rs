pub mod env;
mod loader;

pub use env::{AppConfig, DirectoryConfig, SessionConfig};
pub use loader::load_config;
