//! # Scooter
//!
//! HTTP API, CLI and configuration around [`scooter_core`].

pub mod api;
pub mod cli;
pub mod config;
