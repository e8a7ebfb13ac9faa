//! Per-device aggregation of log categories and the heuristic rules run over them
//!
//! Each rule in [`RULES`] either checks a category count against a threshold or inspects the device record for a missing driver. All rules are evaluated in table order and each contributes at most one issue.
use std::collections::BTreeMap;

use crate::classify::{Category, LogEntry};
use crate::device::Device;

/// Device classes that do not identify a function a driver could bind to
const UNKNOWN_CLASSES: &[&str] = &["00", "0", "ff"];

/// A threshold and the message emitted when it is reached; `{count}` is replaced with the count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Fires when the count is at least this
    pub at_least: usize,
    /// Message template
    pub message: &'static str,
}

/// One heuristic rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Sum counts of `categories` and emit the first tier (highest first) that is reached
    Count {
        /// Categories summed
        categories: &'static [Category],
        /// Ordered highest threshold first; only one tier fires
        tiers: &'static [Tier],
    },
    /// Device has a class but no bound driver
    MissingDriver,
}

/// The rule set, in evaluation and display order
pub const RULES: &[Rule] = &[
    Rule::Count {
        categories: &[Category::Reset, Category::Disconnect],
        tiers: &[
            Tier {
                at_least: 5,
                message: "Frequent resets/reconnects ({count} occurrences) - possible cable, port, or power problem",
            },
            Tier {
                at_least: 3,
                message: "Multiple resets/reconnects ({count} occurrences) - check cable and port connection",
            },
        ],
    },
    Rule::Count {
        categories: &[Category::OverCurrent],
        tiers: &[Tier {
            at_least: 1,
            message: "Over-current detected ({count} times) - device may be drawing too much power or hub has power issue",
        }],
    },
    Rule::Count {
        categories: &[Category::DescriptorError],
        tiers: &[Tier {
            at_least: 1,
            message: "Device descriptor read errors ({count} times) - possible hardware connection problem",
        }],
    },
    Rule::Count {
        categories: &[Category::EnumerationError],
        tiers: &[Tier {
            at_least: 1,
            message: "Enumeration failed ({count} times) - device may not be responding properly",
        }],
    },
    Rule::Count {
        categories: &[Category::Timeout],
        tiers: &[Tier {
            at_least: 1,
            message: "USB timeouts ({count} times) - device may be slow or unresponsive",
        }],
    },
    Rule::MissingDriver,
    Rule::Count {
        categories: &[Category::Error],
        tiers: &[Tier {
            at_least: 3,
            message: "Multiple errors detected ({count} times) - device may be malfunctioning",
        }],
    },
];

impl Rule {
    /// Evaluate against an analysis; `None` when the rule does not fire
    pub fn evaluate(&self, analysis: &DeviceAnalysis<'_>) -> Option<String> {
        match self {
            Rule::Count { categories, tiers } => {
                let count: usize = categories.iter().map(|c| analysis.count(*c)).sum();
                tiers
                    .iter()
                    .find(|t| count >= t.at_least)
                    .map(|t| t.message.replace("{count}", &count.to_string()))
            }
            Rule::MissingDriver => {
                let device = analysis.device;
                match (&device.driver, &device.device_class) {
                    (None, Some(class)) if UNKNOWN_CLASSES.contains(&class.as_str()) => Some(format!(
                        "No driver bound - device class {} is unknown or vendor specific, driver may not be available",
                        class
                    )),
                    (None, Some(class)) => Some(format!(
                        "No driver bound - device class {} may not have a matching kernel module",
                        class
                    )),
                    _ => None,
                }
            }
        }
    }
}

/// Analysis of one device: its log entries, per-category counts and the issues found
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceAnalysis<'d> {
    /// The device analysed, borrowed from the enumerated list
    pub device: &'d Device,
    /// Entries in log order
    pub log_entries: Vec<LogEntry>,
    /// Count per counted category; [`Category::Info`] is only in the total
    pub counts: BTreeMap<Category, usize>,
    /// Human readable issues, filled by [`DeviceAnalysis::analyze`]
    pub issues: Vec<String>,
}

impl<'d> DeviceAnalysis<'d> {
    /// New empty analysis for `device`
    pub fn new(device: &'d Device) -> Self {
        DeviceAnalysis {
            device,
            log_entries: Vec::new(),
            counts: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    /// Append an entry and count its category
    pub fn add_entry(&mut self, entry: LogEntry) {
        if entry.category().is_counted() {
            *self.counts.entry(entry.category()).or_insert(0) += 1;
        }
        self.log_entries.push(entry);
    }

    /// Count for `category`; zero if never seen
    pub fn count(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Total entries, including [`Category::Info`]
    pub fn total_entries(&self) -> usize {
        self.log_entries.len()
    }

    /// Run [`RULES`] and replace `issues`; calling again gives the same result
    pub fn analyze(&mut self) {
        let issues: Vec<String> = RULES.iter().filter_map(|r| r.evaluate(self)).collect();
        self.issues = issues;
    }

    /// True if any rule fired
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// The last `n` entries, oldest first
    pub fn recent_entries(&self, n: usize) -> &[LogEntry] {
        let start = self.log_entries.len().saturating_sub(n);
        &self.log_entries[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, sample_line};

    fn entry(category: Category) -> LogEntry {
        classify(sample_line(category))
    }

    fn analysis_with<'d>(device: &'d Device, categories: &[(Category, usize)]) -> DeviceAnalysis<'d> {
        let mut a = DeviceAnalysis::new(device);
        for (c, n) in categories {
            for _ in 0..*n {
                a.add_entry(entry(*c));
            }
        }
        a.analyze();
        a
    }

    fn driver_bound(id: &str) -> Device {
        let mut d = Device::new(id);
        d.driver = Some("usbhid".into());
        d
    }

    #[test]
    fn test_counts_skip_info() {
        let bound = driver_bound("1-1");
        let a = analysis_with(
            &bound,
            &[(Category::Info, 2), (Category::Reset, 1), (Category::Error, 2)],
        );
        assert_eq!(a.total_entries(), 5);
        assert_eq!(a.count(Category::Info), 0);
        assert_eq!(a.count(Category::Reset), 1);
        assert_eq!(a.count(Category::Error), 2);
        assert!(!a.counts.contains_key(&Category::Info));
        assert!(a.issues.is_empty());
    }

    #[test]
    fn test_reset_tiers_are_exclusive() {
        let bound = driver_bound("1-1");
        let a = analysis_with(
            &bound,
            &[(Category::Reset, 2), (Category::Disconnect, 2)],
        );
        assert_eq!(a.issues.len(), 1);
        assert!(a.issues[0].starts_with("Multiple resets/reconnects (4 occurrences)"));

        let a = analysis_with(&bound, &[(Category::Reset, 5)]);
        assert_eq!(a.issues.len(), 1);
        assert!(a.issues[0].starts_with("Frequent resets/reconnects (5 occurrences)"));

        let a = analysis_with(&bound, &[(Category::Disconnect, 2)]);
        assert!(a.issues.is_empty());
    }

    #[test]
    fn test_single_occurrence_rules() {
        let bound = driver_bound("1-1");
        let a = analysis_with(
            &bound,
            &[
                (Category::OverCurrent, 2),
                (Category::DescriptorError, 1),
                (Category::EnumerationError, 3),
                (Category::Timeout, 1),
            ],
        );
        assert_eq!(
            a.issues,
            vec![
                "Over-current detected (2 times) - device may be drawing too much power or hub has power issue",
                "Device descriptor read errors (1 times) - possible hardware connection problem",
                "Enumeration failed (3 times) - device may not be responding properly",
                "USB timeouts (1 times) - device may be slow or unresponsive",
            ]
        );
    }

    #[test]
    fn test_error_threshold() {
        let bound = driver_bound("1-1");
        let a = analysis_with(&bound, &[(Category::Error, 2)]);
        assert!(a.issues.is_empty());
        let a = analysis_with(&bound, &[(Category::Error, 3)]);
        assert_eq!(
            a.issues,
            vec!["Multiple errors detected (3 times) - device may be malfunctioning"]
        );
    }

    #[test]
    fn test_missing_driver() {
        let mut dev = Device::new("1-1");
        dev.device_class = Some("03".into());
        let a = analysis_with(&dev, &[]);
        assert_eq!(
            a.issues,
            vec!["No driver bound - device class 03 may not have a matching kernel module"]
        );

        for class in ["00", "0", "ff"] {
            let mut dev = Device::new("1-1");
            dev.device_class = Some(class.into());
            let a = analysis_with(&dev, &[]);
            assert_eq!(a.issues.len(), 1);
            assert!(a.issues[0].contains("unknown or vendor specific"), "{}", class);
        }

        // no class, no opinion
        let dev = Device::new("1-1");
        let a = analysis_with(&dev, &[]);
        assert!(a.issues.is_empty());
    }

    #[test]
    fn test_rules_co_occur_in_table_order() {
        let mut dev = Device::new("1-1");
        dev.device_class = Some("ff".into());
        let a = analysis_with(
            &dev,
            &[
                (Category::Error, 4),
                (Category::Timeout, 1),
                (Category::Reset, 6),
            ],
        );
        assert_eq!(a.issues.len(), 4);
        assert!(a.issues[0].starts_with("Frequent"));
        assert!(a.issues[1].starts_with("USB timeouts"));
        assert!(a.issues[2].starts_with("No driver bound"));
        assert!(a.issues[3].starts_with("Multiple errors detected (4 times)"));
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let bound = driver_bound("1-1");
        let mut a = analysis_with(&bound, &[(Category::OverCurrent, 1)]);
        let first = a.issues.clone();
        a.analyze();
        a.analyze();
        assert_eq!(a.issues, first);
    }

    #[test]
    fn test_recent_entries() {
        let bound = driver_bound("1-1");
        let a = analysis_with(&bound, &[(Category::Reset, 3), (Category::Error, 1)]);
        let recent = a.recent_entries(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].category(), Category::Error);
        assert_eq!(a.recent_entries(10).len(), 4);
    }
}
