#[macro_use]
extern crate log;

pub mod gateway;
pub mod route;
pub mod runtime_config;
pub mod upstream;

pub use crate::gateway::{serve, Gateway};
pub use crate::runtime_config::RuntimeConfig;
