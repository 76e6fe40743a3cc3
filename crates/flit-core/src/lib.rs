pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::Config;
pub use error::{FlitError, Result};
