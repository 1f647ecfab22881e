#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod actions;
pub mod commands;
pub mod config;
pub mod error;

pub use commands::{Cli, CliCommands, okms_main};

#[cfg(test)]
mod tests;
