pub mod error;
pub mod types;
pub mod config;
pub mod util;
pub mod channel;
pub mod provider;
pub mod tool;
pub mod gateway;
pub mod agent;
pub mod identity;
pub mod session;
pub mod calendar;
pub mod runtime;
pub mod service;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
