pub mod cli;
pub mod load_config;
pub mod publish;
pub mod store;
pub mod text_generation;

pub use cli::{run, Cli, Commands};
