//! Diagnose flaky USB devices: correlate the enumerated device topology with kernel log history and report likely cable, hub, power and driver problems.
//!
//! The core is a pure pipeline over fully materialised inputs: [`classify`] turns raw lines into [`classify::LogEntry`]s, [`correlate`] attributes them to [`device::Device`]s, [`analyzer`] counts and applies heuristics and [`diagnose`] ties it together. [`sysfs`], [`names`] and [`logsource`] supply the inputs on a real system; [`report`] and [`display`] render the result.
#![warn(missing_docs)]
use simple_logger::SimpleLogger;

pub mod analyzer;
pub mod classify;
pub mod colour;
mod command;
pub mod config;
pub mod correlate;
pub mod device;
pub mod diagnose;
pub mod display;
pub mod error;
pub mod logsource;
pub mod names;
pub mod path;
pub mod report;
pub mod sysfs;

/// Set usbwhy module and binary log level
pub fn set_log_level(debug: u8) -> crate::error::Result<()> {
    match debug {
        // just use env if not passed
        0 => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Error.to_level_filter())
            .env(),
        1 => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Info.to_level_filter()),
        2 => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Debug.to_level_filter()),
        _ => SimpleLogger::new()
            .with_utc_timestamps()
            .with_level(log::Level::Trace.to_level_filter()),
    }
    .init()
    .map_err(|e| {
        crate::error::Error::new(
            crate::error::ErrorKind::Other("simple_logger"),
            &format!("Failed to set log level: {}", e),
        )
    })?;

    Ok(())
}

// run any Rust code as doctest
#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
