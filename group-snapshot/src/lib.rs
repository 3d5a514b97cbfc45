pub mod blob;
pub mod cli;
pub mod context;
pub mod graph;
pub mod load_config;

pub use cli::{run, Cli, Commands};
