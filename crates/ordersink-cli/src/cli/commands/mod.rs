//! CLI command handlers, one per file.

mod config;
mod insert;
mod load;
mod serve;

pub use config::run_config;
pub use insert::run_insert;
pub use load::run_load;
pub use serve::run_serve;
