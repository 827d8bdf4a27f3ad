/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{CacheArg, Cli, Commands};
pub use commands::{handle_command, handle_init, open_cache};
