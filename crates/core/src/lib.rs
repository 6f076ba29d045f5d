#![deny(rust_2018_idioms)]

pub mod commands;
pub mod config;
pub mod messages;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
