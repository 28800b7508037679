// Configuration management module
// TOML settings for the embedding service, chunking and index locations

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, IndexConfig, OllamaConfig};
