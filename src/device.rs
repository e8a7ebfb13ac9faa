//! USB device records as supplied by enumeration, plus filtering and JSON snapshots of them
//!
//! A [`Device`] is an immutable snapshot taken once per run. Identity is the bus-path `device_id`; two records with the same `device_id` are the same device as far as [`crate::correlate`] is concerned.
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;
use std::fs;
use std::io::Read;
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};
use crate::path::BusPath;

/// Snapshot of one USB device's identity and metadata at enumeration time
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Bus-path such as "1-1.2"; unique among currently enumerated devices
    pub device_id: String,
    /// idVendor as 4 hex digits
    pub vendor_id: Option<String>,
    /// idProduct as 4 hex digits
    pub product_id: Option<String>,
    /// Vendor display name from lsusb or the USB ID database
    pub vendor_name: Option<String>,
    /// Product display name from lsusb or the USB ID database
    pub product_name: Option<String>,
    /// bDeviceClass as read from sysfs, e.g. "09" or "ff"
    pub device_class: Option<String>,
    /// Negotiated speed in Mbit/s as reported by sysfs
    pub speed: Option<String>,
    /// Name of the bound kernel driver
    pub driver: Option<String>,
    #[serde(alias = "busnum")]
    /// Bus number
    pub bus_number: Option<String>,
    #[serde(alias = "devnum")]
    /// Device number on the bus
    pub device_number: Option<String>,
    /// Bus-path of the parent hub
    pub parent_id: Option<String>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.device_id)?;
        if let Some(vp) = self.vendor_product_key() {
            write!(f, " ({})", vp)?;
        }
        Ok(())
    }
}

impl Device {
    /// New device with just a bus-path; all optional fields empty
    pub fn new(device_id: &str) -> Self {
        Device {
            device_id: device_id.to_string(),
            ..Default::default()
        }
    }

    /// Builder helper for the vendor and product id pair
    pub fn with_ids(mut self, vendor_id: &str, product_id: &str) -> Self {
        self.vendor_id = Some(vendor_id.to_string());
        self.product_id = Some(product_id.to_string());
        self
    }

    /// `vendor_id:product_id` when both are known
    ///
    /// ```
    /// use usbwhy::device::Device;
    ///
    /// let device = Device::new("1-1.2").with_ids("1d6b", "0002");
    /// assert_eq!(device.vendor_product_key(), Some("1d6b:0002".to_string()));
    /// assert_eq!(Device::new("1-3").vendor_product_key(), None);
    /// ```
    pub fn vendor_product_key(&self) -> Option<String> {
        match (self.vendor_id.as_ref(), self.product_id.as_ref()) {
            (Some(v), Some(p)) => Some(format!("{}:{}", v, p)),
            _ => None,
        }
    }

    /// The bus-path as a [`BusPath`] if it is well formed
    pub fn bus_path(&self) -> Option<BusPath> {
        BusPath::parse(&self.device_id)
    }

    /// Vendor and product names joined for display, if either is known
    pub fn display_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.vendor_name.as_deref(), self.product_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Retain only devices matching a bus-path or a vendor:product pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    /// Exact `device_id` such as "1-1.2"
    BusPath(String),
    /// Lowercase `vvvv:pppp`
    VendorProduct(String),
}

impl FromStr for DeviceFilter {
    type Err = Error;

    /// Accepts "1-1.2" (bus-device) or "1234:5678" (vendor:product, hexadecimal)
    ///
    /// ```
    /// use std::str::FromStr;
    /// use usbwhy::device::DeviceFilter;
    ///
    /// assert_eq!(DeviceFilter::from_str("1-1.2").unwrap(), DeviceFilter::BusPath("1-1.2".into()));
    /// assert_eq!(DeviceFilter::from_str("1D6B:0002").unwrap(), DeviceFilter::VendorProduct("1d6b:0002".into()));
    /// assert!(DeviceFilter::from_str("garbage").is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        if let Some((vid, pid)) = s.split_once(':') {
            if vid.len() == 4
                && pid.len() == 4
                && u16::from_str_radix(vid, 16).is_ok()
                && u16::from_str_radix(pid, 16).is_ok()
            {
                return Ok(DeviceFilter::VendorProduct(s.to_lowercase()));
            }
        }

        if s.contains('-') {
            return Ok(DeviceFilter::BusPath(s.to_string()));
        }

        Err(Error::new(
            ErrorKind::InvalidArg,
            &format!(
                "Invalid device '{}'; expected bus-device like '1-1.2' or vendor:product like '1234:5678'",
                s
            ),
        ))
    }
}

impl DeviceFilter {
    /// Does `device` pass this filter
    pub fn is_match(&self, device: &Device) -> bool {
        match self {
            DeviceFilter::BusPath(id) => &device.device_id == id,
            DeviceFilter::VendorProduct(vp) => device
                .vendor_product_key()
                .map(|k| k.to_lowercase() == *vp)
                .unwrap_or(false),
        }
    }

    /// Keep only the devices that match, preserving order
    pub fn retain(&self, devices: &mut Vec<Device>) {
        devices.retain(|d| self.is_match(d));
    }
}

/// Reads a device snapshot at `file_path`: a JSON array of [`Device`] as written by `--dump-devices`
pub fn read_json_dump(file_path: &str) -> Result<Vec<Device>> {
    let mut file = fs::File::options().read(true).open(file_path)?;

    let mut data = String::new();
    file.read_to_string(&mut data)?;

    let json_dump: Vec<Device> = serde_json::from_str(&data).map_err(|e| {
        Error::new(
            ErrorKind::Parsing,
            &format!("Failed to parse device dump at {:?}; Error({})", file_path, e),
        )
    })?;

    Ok(json_dump)
}
