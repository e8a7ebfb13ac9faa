//! Helper functions for USB sysfs style bus-path identifiers
//!
//! A bus-path names the physical position of a device: `1-1.2` is bus 1, root port 1, hub port 2. The Linux kernel uses the same form for directories in `/sys/bus/usb/devices` and in its log messages, which is what allows [`crate::correlate`] to join the two.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref BUS_PATH: Regex = Regex::new(r"^\d+-\d+(\.\d+)*$").expect("valid bus-path pattern");
}

/// A validated bus-path such as `1-1.2`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusPath(String);

impl fmt::Display for BusPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BusPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl BusPath {
    /// Parse a sysfs device directory name into a [`BusPath`]
    ///
    /// Interface directories (`1-1.2:1.0`), bus controllers (`usb1`) and anything else that is not a device return `None`.
    ///
    /// ```
    /// use usbwhy::path::BusPath;
    ///
    /// assert!(BusPath::parse("1-0").is_some());
    /// assert!(BusPath::parse("2-4.1.3").is_some());
    /// assert!(BusPath::parse("1-1.2:1.0").is_none());
    /// assert!(BusPath::parse("usb1").is_none());
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        if BUS_PATH.is_match(name) {
            Some(Self(name.to_string()))
        } else {
            None
        }
    }

    /// The inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract bus number from path
    ///
    /// ```
    /// use usbwhy::path::BusPath;
    /// assert_eq!(BusPath::parse("3-1.4").unwrap().bus(), Some(3));
    /// ```
    pub fn bus(&self) -> Option<u8> {
        self.0.split('-').next().and_then(|b| b.parse().ok())
    }

    /// Is the path a root hub
    ///
    /// Only root hubs can be port 0, e.g. "1-0"
    pub fn is_root_hub(&self) -> bool {
        self.0.ends_with("-0")
    }

    /// Number of hub levels between the root hub and the device
    pub fn depth(&self) -> usize {
        self.0.matches('.').count()
    }

    /// Get the bus-path of the parent hub
    ///
    /// Strip the last `.N` port; a device directly on the root port hangs off `<bus>-0`; root hubs have no parent.
    ///
    /// ```
    /// use usbwhy::path::BusPath;
    ///
    /// let path = BusPath::parse("1-1.2").unwrap();
    /// assert_eq!(path.parent().unwrap().as_str(), "1-1");
    /// let path = BusPath::parse("1-1").unwrap();
    /// assert_eq!(path.parent().unwrap().as_str(), "1-0");
    /// let path = BusPath::parse("1-0").unwrap();
    /// assert_eq!(path.parent(), None);
    /// ```
    pub fn parent(&self) -> Option<BusPath> {
        if let Some((head, _)) = self.0.rsplit_once('.') {
            Some(BusPath(head.to_string()))
        } else if self.is_root_hub() {
            None
        } else {
            self.bus().map(|b| BusPath(format!("{}-0", b)))
        }
    }
}
