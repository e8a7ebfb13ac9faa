//! Turn raw kernel log lines into typed, device attributed [`LogEntry`]s
//!
//! Classification is a fixed, ordered set of case-insensitive substring tests over the whole raw line; the first test to match decides the [`Category`]. Device identifiers are then pulled out of the same raw line: a bus-path like `1-1.2`, overridden by a `vvvv:pppp` pair when one is present.
//!
//! ```
//! use usbwhy::classify::{classify, Category};
//!
//! let entry = classify("[ 1234.567890] usb 1-1.2: reset high-speed USB device number 5 using xhci_hcd");
//! assert_eq!(entry.category(), Category::Reset);
//! assert_eq!(entry.device_id.as_deref(), Some("1-1.2"));
//! assert_eq!(entry.message, "usb 1-1.2: reset high-speed USB device number 5 using xhci_hcd");
//! ```
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

lazy_static! {
    static ref BUS_PATH: Regex =
        Regex::new(r"(?i)(?:usb\s+)?(\d+-\d+(?:\.\d+)*)[\s:]").expect("valid bus-path pattern");
    static ref VENDOR_PRODUCT: Regex = Regex::new(r"(\w{4}):(\w{4})").expect("valid vendor:product pattern");
    static ref ISO_TIMESTAMP: Regex = Regex::new(
        r"^(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}:\d{2})(?:\.\d+)?(Z|[+-]\d{2}:?\d{2})?"
    )
    .expect("valid iso timestamp pattern");
    static ref DMESG_TIMESTAMP: Regex =
        Regex::new(r"^\[(\w{3}\s+\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}\s+\d{4})\]")
            .expect("valid dmesg -T timestamp pattern");
}

/// Lowercase substrings; a line containing any of them is USB relevant
pub const USB_KEYWORDS: &[&str] = &[
    "usb",
    "over-current",
    "overcurrent",
    "reset",
    "disconnect",
    "descriptor read",
    "cannot enumerate",
    "enumeration failed",
    "timeout",
];

/// What kind of event a log line describes
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    /// Nothing more specific matched
    #[default]
    Info,
    /// Generic error or failure
    Error,
    /// Warning
    Warning,
    /// Device reset by the host
    Reset,
    /// Device disconnected
    Disconnect,
    /// Port or hub reported over-current
    OverCurrent,
    /// Transfer or control message timed out
    Timeout,
    /// Reading the device descriptor failed
    DescriptorError,
    /// Device could not be enumerated
    EnumerationError,
}

impl Category {
    /// Categories that get a dedicated counter in [`crate::analyzer::DeviceAnalysis`]; [`Category::Info`] is only in the total
    pub fn is_counted(&self) -> bool {
        !matches!(self, Category::Info)
    }
}

/// One classification test: all of `all` must be present and at least one of `any`
struct CategoryRule {
    category: Category,
    any: &'static [&'static str],
    all: &'static [&'static str],
}

/// First match wins so order matters: over-current lines often also mention reset
const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::OverCurrent,
        any: &["over-current", "overcurrent"],
        all: &[],
    },
    CategoryRule {
        category: Category::Reset,
        any: &["reset"],
        all: &["usb"],
    },
    CategoryRule {
        category: Category::Disconnect,
        any: &["disconnect"],
        all: &["usb"],
    },
    CategoryRule {
        category: Category::Error,
        any: &["error", "failed"],
        all: &[],
    },
    CategoryRule {
        category: Category::Timeout,
        any: &["timeout"],
        all: &[],
    },
    CategoryRule {
        category: Category::DescriptorError,
        any: &["descriptor read"],
        all: &[],
    },
    CategoryRule {
        category: Category::EnumerationError,
        any: &["cannot enumerate", "enumeration failed"],
        all: &[],
    },
    CategoryRule {
        category: Category::Warning,
        any: &["warning", "warn"],
        all: &[],
    },
];

impl CategoryRule {
    fn is_match(&self, lower: &str) -> bool {
        self.any.iter().any(|w| lower.contains(w)) && self.all.iter().all(|w| lower.contains(w))
    }
}

/// Assign a [`Category`] to a raw line
///
/// ```
/// use usbwhy::classify::{categorize, Category};
///
/// assert_eq!(categorize("usb 1-1: USB disconnect, device number 3"), Category::Disconnect);
/// // rule order: over-current wins over reset
/// assert_eq!(categorize("usb 1-1-port2: over-current condition, reset USB"), Category::OverCurrent);
/// // a reset without "usb" is not a USB reset
/// assert_eq!(categorize("e1000e: Reset adapter"), Category::Info);
/// ```
pub fn categorize(raw_line: &str) -> Category {
    let lower = raw_line.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|r| r.is_match(&lower))
        .map(|r| r.category)
        .unwrap_or_default()
}

/// Is the line relevant to USB at all; case-insensitive match against [`USB_KEYWORDS`]
pub fn is_usb_relevant(line: &str) -> bool {
    let lower = line.to_lowercase();
    USB_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Strip the log source prefix (timestamp, host, facility) to get the kernel message
///
/// ```
/// use usbwhy::classify::strip_prefix;
///
/// assert_eq!(strip_prefix("[Mon Jan  1 12:00:00 2024] usb 1-1: new device"), "usb 1-1: new device");
/// assert_eq!(strip_prefix("Jan 01 12:00:00 host kernel: hub 1-0:1.0: USB hub found"), "USB hub found");
/// assert_eq!(strip_prefix("no prefix at all"), "no prefix at all");
/// ```
pub fn strip_prefix(line: &str) -> &str {
    let message = if let Some((_, rest)) = line.split_once("] ") {
        rest
    } else if let Some((_, rest)) = line.rsplit_once(": ") {
        rest
    } else {
        line
    };
    message.trim()
}

/// Best-effort timestamp from the start of a raw line
///
/// Understands ISO-8601 (`journalctl -o short-iso`, syslog RFC 3339) and `dmesg -T` prefixes. Monotonic `[  12.345]` stamps and syslog `Jan 01 12:00:00` without a year give `None`.
pub fn parse_timestamp(line: &str) -> Option<DateTime<Local>> {
    if let Some(caps) = ISO_TIMESTAMP.captures(line) {
        let naive = format!("{}T{}", &caps[1], &caps[2]);
        return match caps.get(3).map(|m| m.as_str()) {
            Some("Z") => NaiveDateTime::parse_from_str(&naive, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|n| n.and_utc().with_timezone(&Local)),
            Some(offset) => {
                DateTime::parse_from_str(&format!("{}{}", naive, offset.replace(':', "")), "%Y-%m-%dT%H:%M:%S%z")
                    .ok()
                    .map(|dt| dt.with_timezone(&Local))
            }
            None => NaiveDateTime::parse_from_str(&naive, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .and_then(|n| Local.from_local_datetime(&n).single()),
        };
    }

    if let Some(caps) = DMESG_TIMESTAMP.captures(line) {
        let collapsed = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
        return NaiveDateTime::parse_from_str(&collapsed, "%a %b %d %H:%M:%S %Y")
            .ok()
            .and_then(|n| Local.from_local_datetime(&n).single());
    }

    None
}

/// A kernel log line classified and attributed to a device where possible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Kernel message with the source prefix stripped
    pub message: String,
    /// Line exactly as read from the source
    pub raw_line: String,
    /// Timestamp if one could be parsed from the line
    pub timestamp: Option<DateTime<Local>>,
    /// Bus-path found in the line
    pub device_id: Option<String>,
    /// `vendor:product` found in the line; when set `device_id` is always `None`
    pub vendor_product: Option<String>,
    /// Assigned once at classification
    category: Category,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

impl LogEntry {
    /// The [`Category`] assigned when the line was classified
    pub fn category(&self) -> Category {
        self.category
    }

    /// Has the entry got any identifier that [`crate::correlate`] could match
    pub fn has_identifier(&self) -> bool {
        self.device_id.is_some() || self.vendor_product.is_some()
    }
}

/// Extract `(device_id, vendor_product)`; a vendor:product pair anywhere clears the bus-path
fn extract_identifiers(raw_line: &str) -> (Option<String>, Option<String>) {
    let device_id = BUS_PATH.captures(raw_line).map(|c| c[1].to_string());

    match VENDOR_PRODUCT.captures(raw_line) {
        Some(c) => (None, Some(format!("{}:{}", &c[1], &c[2]))),
        None => (device_id, None),
    }
}

/// Classify one raw log line; never fails, unknown input is [`Category::Info`] without identifiers
pub fn classify(raw_line: &str) -> LogEntry {
    let (device_id, vendor_product) = extract_identifiers(raw_line);

    LogEntry {
        message: strip_prefix(raw_line).to_string(),
        raw_line: raw_line.to_string(),
        timestamp: parse_timestamp(raw_line),
        device_id,
        vendor_product,
        category: categorize(raw_line),
    }
}

/// Keep only USB relevant lines and classify them, preserving order
pub fn filter_usb_entries<S: AsRef<str>>(lines: &[S]) -> Vec<LogEntry> {
    lines
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| is_usb_relevant(l))
        .map(classify)
        .collect()
}

/// A representative kernel line for each category
#[cfg(test)]
pub(crate) fn sample_line(category: Category) -> &'static str {
    match category {
        Category::Info => "usb 1-1: new full-speed USB device number 2 using xhci_hcd",
        Category::Error => "usb 1-1: device not accepting address 2, error -71",
        Category::Warning => "usb 1-1: warning: config 1 has no interfaces",
        Category::Reset => "usb 1-1: reset high-speed USB device number 2 using xhci_hcd",
        Category::Disconnect => "usb 1-1: USB disconnect, device number 2",
        Category::OverCurrent => "usb usb1-port1: over-current condition",
        Category::Timeout => "usb 1-1: control timeout on ep0out",
        Category::DescriptorError => "usb 1-1: device descriptor read/64, -71",
        Category::EnumerationError => "usb 1-1-port1: cannot enumerate device",
    }
}
