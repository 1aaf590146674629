pub mod config;
pub mod error;

pub use config::EnvsealConfig;
pub use error::{EnvsealError, EnvsealResult};
