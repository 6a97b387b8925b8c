pub mod config;
pub mod logging;

pub mod control;
pub mod driver;
pub mod operation;
pub mod retry;
pub mod store;
