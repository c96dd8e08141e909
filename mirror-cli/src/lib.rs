//! # mirror-cli: headless device mirroring client
//!
//! Loads a TOML config, picks a device through adb, runs one mirroring
//! session and forwards console lines to the device as control input.

pub mod config;
pub mod devices;
pub mod input;
