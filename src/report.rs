//! Structured report of a [`Diagnosis`], serialised with serde
//!
//! Optional device fields are always present in the output (as `null`) so consumers can rely on a fixed shape.
use chrono::{DateTime, Local, SecondsFormat};
use serde::{Serialize, Serializer};

use crate::analyzer::DeviceAnalysis;
use crate::classify::{Category, LogEntry};
use crate::diagnose::Diagnosis;
use crate::error::Result;

/// Top level report
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    /// One per analysis, ghosts last
    pub devices: Vec<DeviceReport<'a>>,
    /// Entries matched to no device
    pub unmatched_logs: Vec<EntryReport<'a>>,
    /// Counts over `devices`
    pub summary: Summary,
}

/// Device and issue counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Devices analysed, ghosts included
    pub total_devices: usize,
    /// Devices with at least one issue
    pub devices_with_issues: usize,
}

/// Per category counts for one device
#[derive(Debug, Serialize)]
pub struct LogSummary {
    /// All entries including info
    pub total_entries: usize,
    /// Reset entries
    pub reset_count: usize,
    /// Disconnect entries
    pub disconnect_count: usize,
    /// Generic error entries
    pub error_count: usize,
    /// Warning entries
    pub warning_count: usize,
    /// Over-current entries
    pub over_current_count: usize,
    /// Timeout entries
    pub timeout_count: usize,
    /// Descriptor read error entries
    pub descriptor_error_count: usize,
    /// Enumeration failure entries
    pub enumeration_error_count: usize,
}

impl From<&DeviceAnalysis<'_>> for LogSummary {
    fn from(a: &DeviceAnalysis<'_>) -> Self {
        LogSummary {
            total_entries: a.total_entries(),
            reset_count: a.count(Category::Reset),
            disconnect_count: a.count(Category::Disconnect),
            error_count: a.count(Category::Error),
            warning_count: a.count(Category::Warning),
            over_current_count: a.count(Category::OverCurrent),
            timeout_count: a.count(Category::Timeout),
            descriptor_error_count: a.count(Category::DescriptorError),
            enumeration_error_count: a.count(Category::EnumerationError),
        }
    }
}

fn rfc3339<S: Serializer>(ts: &Option<DateTime<Local>>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match ts {
        Some(t) => s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, false)),
        None => s.serialize_none(),
    }
}

/// A log entry as reported
#[derive(Debug, Serialize)]
pub struct EntryReport<'a> {
    /// Message without the source prefix
    pub message: &'a str,
    /// Category string form
    pub category: Category,
    /// Bus-path found in the line
    pub device_id: Option<&'a str>,
    /// vendor:product found in the line
    pub vendor_product: Option<&'a str>,
    /// RFC 3339 or null
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: Option<DateTime<Local>>,
}

impl<'a> From<&'a LogEntry> for EntryReport<'a> {
    fn from(e: &'a LogEntry) -> Self {
        EntryReport {
            message: &e.message,
            category: e.category(),
            device_id: e.device_id.as_deref(),
            vendor_product: e.vendor_product.as_deref(),
            timestamp: e.timestamp,
        }
    }
}

/// A device with its issues, counts and entries
#[derive(Debug, Serialize)]
pub struct DeviceReport<'a> {
    /// Bus-path
    pub device_id: &'a str,
    /// idVendor
    pub vendor_id: Option<&'a str>,
    /// idProduct
    pub product_id: Option<&'a str>,
    /// Vendor name
    pub vendor_name: Option<&'a str>,
    /// Product name
    pub product_name: Option<&'a str>,
    /// bDeviceClass
    pub device_class: Option<&'a str>,
    /// Speed in Mbit/s
    pub speed: Option<&'a str>,
    /// Bound driver
    pub driver: Option<&'a str>,
    /// Bus number
    pub busnum: Option<&'a str>,
    /// Device number
    pub devnum: Option<&'a str>,
    /// Parent hub bus-path
    pub parent_id: Option<&'a str>,
    /// Only in logs, not currently enumerated
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ghost: bool,
    /// Issues found, in rule order
    pub issues: &'a [String],
    /// Counts
    pub log_summary: LogSummary,
    /// Every entry attributed to the device
    pub log_entries: Vec<EntryReport<'a>>,
}

impl<'a> DeviceReport<'a> {
    fn new(analysis: &'a DeviceAnalysis<'_>, ghost: bool) -> Self {
        let d = analysis.device;
        DeviceReport {
            device_id: &d.device_id,
            vendor_id: d.vendor_id.as_deref(),
            product_id: d.product_id.as_deref(),
            vendor_name: d.vendor_name.as_deref(),
            product_name: d.product_name.as_deref(),
            device_class: d.device_class.as_deref(),
            speed: d.speed.as_deref(),
            driver: d.driver.as_deref(),
            busnum: d.bus_number.as_deref(),
            devnum: d.device_number.as_deref(),
            parent_id: d.parent_id.as_deref(),
            ghost,
            issues: &analysis.issues,
            log_summary: LogSummary::from(analysis),
            log_entries: analysis.log_entries.iter().map(EntryReport::from).collect(),
        }
    }
}

impl<'a> Report<'a> {
    /// Build a report borrowing from `diagnosis`
    pub fn new(diagnosis: &'a Diagnosis<'_>) -> Self {
        Report {
            devices: diagnosis
                .analyses
                .iter()
                .enumerate()
                .map(|(i, a)| DeviceReport::new(a, diagnosis.is_ghost(i)))
                .collect(),
            unmatched_logs: diagnosis.unmatched.iter().map(EntryReport::from).collect(),
            summary: Summary {
                total_devices: diagnosis.total_devices(),
                devices_with_issues: diagnosis.devices_with_issues(),
            },
        }
    }

    /// Report with no devices and no logs
    pub fn empty() -> Report<'static> {
        Report {
            devices: Vec::new(),
            unmatched_logs: Vec::new(),
            summary: Summary::default(),
        }
    }

    /// Pretty printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::diagnose::{diagnose, Diagnoser};
    use assert_json_diff::{assert_json_eq, assert_json_include};
    use serde_json::json;

    #[test]
    fn test_empty_report() {
        let value = serde_json::to_value(Report::empty()).unwrap();
        assert_json_eq!(
            value,
            json!({"devices": [], "unmatched_logs": [], "summary": {"total_devices": 0, "devices_with_issues": 0}})
        );
    }

    #[test]
    fn test_device_report_shape() {
        let mut device = Device::new("1-1.2").with_ids("1234", "5678");
        device.device_class = Some("ff".into());
        device.bus_number = Some("1".into());
        let lines = [
            "usb 1-1.2: reset",
            "usb 1-1.2: over-current detected",
            "usb 7-7: disconnect",
        ];
        let devices = [device];
        let diagnosis = diagnose(&devices, &lines);
        let value = serde_json::to_value(Report::new(&diagnosis)).unwrap();

        assert_json_include!(
            actual: value.clone(),
            expected: json!({
                "devices": [{
                    "device_id": "1-1.2",
                    "vendor_id": "1234",
                    "product_id": "5678",
                    "vendor_name": null,
                    "driver": null,
                    "busnum": "1",
                    "devnum": null,
                    "log_summary": {
                        "total_entries": 2,
                        "reset_count": 1,
                        "over_current_count": 1,
                        "error_count": 0
                    },
                    "log_entries": [
                        {"message": "reset", "category": "reset", "device_id": "1-1.2", "vendor_product": null, "timestamp": null},
                        {"category": "over_current"}
                    ]
                }],
                "unmatched_logs": [{"category": "disconnect", "device_id": "7-7"}],
                "summary": {"total_devices": 1, "devices_with_issues": 1}
            })
        );
        assert!(value["devices"][0].get("ghost").is_none());
        assert_eq!(value["devices"][0]["issues"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_ghost_flag() {
        let current = vec![Device::new("1-1").with_ids("1111", "2222")];
        let known = vec![Device::new("2-3").with_ids("0bda", "8153")];
        let lines = ["r8152 0bda:8153 timeout"];
        let diagnosis = Diagnoser::new(&current)
            .with_known_devices(&known)
            .diagnose_lines(&lines);
        let value = serde_json::to_value(Report::new(&diagnosis)).unwrap();
        assert_eq!(value["devices"][1]["ghost"], json!(true));
        assert_eq!(value["summary"]["total_devices"], json!(2));
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let device = Device::new("1-1");
        let lines = ["2024-03-01T10:20:30+00:00 host kernel: usb 1-1: reset"];
        let devices = [device];
        let diagnosis = diagnose(&devices, &lines);
        let value = serde_json::to_value(Report::new(&diagnosis)).unwrap();
        let ts = value["devices"][0]["log_entries"][0]["timestamp"]
            .as_str()
            .unwrap();
        let parsed = DateTime::parse_from_rfc3339(ts).unwrap();
        assert_eq!(parsed.timestamp(), 1709288430);
    }
}
