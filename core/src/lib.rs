pub mod config;
pub mod error;
pub mod ids;
pub mod urls;

pub use config::Config;
pub use error::{Error, GatewayError, Result};
