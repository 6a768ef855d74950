//! Common functionality for the local energy community simulator.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod agent;
pub mod area;
pub mod carrier;
pub mod cli;
pub mod data;
pub mod error;
pub mod horizon;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod settings;
pub mod simulation;
pub mod trade;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory in which program configuration files are stored
pub fn get_lecsim_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform, so fall back to the current directory
        return PathBuf::default();
    };

    config_dir.push("lecsim");
    config_dir
}
