//! Tie classification, correlation and analysis together for one run
//!
//! No I/O happens here: devices and log lines are fully materialised by the caller. Every input device gets an analysis, in input order, even with no entries. Devices from the known-device history that are not currently enumerated but receive entries are "ghosts" (probably unplugged) and are appended after the current devices.
//!
//! ```
//! use usbwhy::device::Device;
//! use usbwhy::diagnose::diagnose;
//!
//! let mut device = Device::new("1-1.2").with_ids("1234", "5678");
//! device.device_class = Some("ff".into());
//! let lines = [
//!     "usb 1-1.2: reset",
//!     "usb 1-1.2: reset",
//!     "usb 1-1.2: reset",
//!     "usb 1-1.2: over-current detected",
//! ];
//! let devices = [device];
//! let diagnosis = diagnose(&devices, &lines);
//! let analysis = &diagnosis.analyses[0];
//! assert_eq!(analysis.issues.len(), 3);
//! assert!(analysis.issues[0].starts_with("Multiple resets/reconnects (3 occurrences)"));
//! assert!(diagnosis.unmatched.is_empty());
//! ```
use std::collections::HashSet;

use crate::analyzer::DeviceAnalysis;
use crate::classify::{filter_usb_entries, LogEntry};
use crate::correlate::correlate;
use crate::device::Device;

/// Outcome of a run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnosis<'d> {
    /// Current devices in input order, then ghosts in order of first log association
    pub analyses: Vec<DeviceAnalysis<'d>>,
    /// Entries matched to no device, in log order
    pub unmatched: Vec<LogEntry>,
    current: usize,
}

impl<'d> Diagnosis<'d> {
    /// Analyses of currently enumerated devices
    pub fn current(&self) -> &[DeviceAnalysis<'d>] {
        let end = self.current.min(self.analyses.len());
        &self.analyses[..end]
    }

    /// Analyses of devices only seen in logs
    pub fn ghosts(&self) -> &[DeviceAnalysis<'d>] {
        self.analyses.get(self.current..).unwrap_or(&[])
    }

    /// Is the analysis at `index` a ghost
    pub fn is_ghost(&self, index: usize) -> bool {
        index >= self.current
    }

    /// Number of analyses, ghosts included
    pub fn total_devices(&self) -> usize {
        self.analyses.len()
    }

    /// Number of analyses with at least one issue
    pub fn devices_with_issues(&self) -> usize {
        self.analyses.iter().filter(|a| a.has_issues()).count()
    }
}

/// Builder for a diagnosis run over a fixed device list
#[derive(Debug, Clone, Copy)]
pub struct Diagnoser<'a> {
    devices: &'a [Device],
    known_devices: &'a [Device],
}

impl<'a> Diagnoser<'a> {
    /// Diagnose `devices`, the currently enumerated device list
    pub fn new(devices: &'a [Device]) -> Self {
        Diagnoser {
            devices,
            known_devices: &[],
        }
    }

    /// Also correlate against previously seen devices so log entries for unplugged devices are not lost
    pub fn with_known_devices(mut self, known_devices: &'a [Device]) -> Self {
        self.known_devices = known_devices;
        self
    }

    /// Classify and gate raw lines, then [`Diagnoser::diagnose`]
    pub fn diagnose_lines<S: AsRef<str>>(&self, raw_lines: &[S]) -> Diagnosis<'a> {
        let entries = filter_usb_entries(raw_lines);
        self.diagnose(&entries)
    }

    /// Run correlation and analysis over already classified entries
    pub fn diagnose(&self, entries: &[LogEntry]) -> Diagnosis<'a> {
        let current_ids: HashSet<&'a str> = self.devices.iter().map(|d| d.device_id.as_str()).collect();
        let history = self
            .known_devices
            .iter()
            .filter(|d| !current_ids.contains(d.device_id.as_str()));

        let correlation = correlate(self.devices.iter().chain(history), entries);

        let mut analyses: Vec<DeviceAnalysis<'a>> = self
            .devices
            .iter()
            .map(|device| {
                let mut analysis = DeviceAnalysis::new(device);
                for entry in correlation.entries_for(&device.device_id) {
                    analysis.add_entry((*entry).clone());
                }
                analysis.analyze();
                analysis
            })
            .collect();
        let current = analyses.len();

        for (device, device_entries) in correlation.targets() {
            if current_ids.contains(device.device_id.as_str()) {
                continue;
            }
            log::info!("{} only seen in logs, probably disconnected", device);
            let mut analysis = DeviceAnalysis::new(*device);
            for entry in device_entries {
                analysis.add_entry((*entry).clone());
            }
            analysis.analyze();
            analyses.push(analysis);
        }

        let unmatched: Vec<LogEntry> = correlation.unmatched().iter().map(|e| (*e).clone()).collect();

        log::debug!(
            "Diagnosed {} devices ({} ghosts), {} unmatched entries",
            analyses.len(),
            analyses.len() - current,
            unmatched.len()
        );

        Diagnosis {
            analyses,
            unmatched,
            current,
        }
    }
}

/// Diagnose `devices` from raw kernel log lines without any device history
pub fn diagnose<'d, S: AsRef<str>>(devices: &'d [Device], raw_lines: &[S]) -> Diagnosis<'d> {
    Diagnoser::new(devices).diagnose_lines(raw_lines)
}
