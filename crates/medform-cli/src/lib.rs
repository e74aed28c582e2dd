//! medform-cli library root.
//!
//! The binary is a thin clap layer over [`app`]; config and start-up wiring
//! live here so integration tests can drive them without a terminal.

pub mod app;
pub mod config;
pub mod render;
