pub mod config;
pub mod error;

pub use config::LinkwheelConfig;
pub use error::{LinkwheelError, Result};
