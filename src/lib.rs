pub mod apis;
pub mod cleaning;
pub mod config;
#[cfg(feature = "db")]
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;
