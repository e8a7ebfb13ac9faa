//! Vendor and product display names for enumerated devices
//!
//! `lsusb -v` is tried first since it reflects the system hwdb, then short `lsusb`, and whatever is still missing is looked up in the bundled USB IDs repository. None of this is required for diagnosis so every failure here is logged and swallowed.
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use usb_ids::{self, FromId};

use crate::command;
use crate::device::Device;
use crate::error::Result;

const LSUSB_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    static ref BUS_LINE_ID: Regex = Regex::new(r"ID (\w{4}):(\w{4})\s*(.*)$").expect("valid lsusb id pattern");
    static ref ID_VENDOR: Regex = Regex::new(r"idVendor\s+0x\w+\s+(\S.+)").expect("valid idVendor pattern");
    static ref ID_PRODUCT: Regex = Regex::new(r"idProduct\s+0x\w+\s+(\S.+)").expect("valid idProduct pattern");
}

/// Names found for one `vendor:product` key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Names {
    /// Vendor name
    pub vendor_name: Option<String>,
    /// Product name
    pub product_name: Option<String>,
}

/// Parse `lsusb` or `lsusb -v` output into names keyed by `vendor:product`
///
/// The short `Bus 001 Device 002: ID 046d:c52b Logitech, Inc. Unifying Receiver` line only has a combined description, which is used as the vendor name until the verbose `idVendor`/`idProduct` lines give the split names.
///
/// ```
/// use usbwhy::names::parse_lsusb;
///
/// let out = "Bus 001 Device 004: ID 046d:c52b Logitech, Inc. Unifying Receiver
///   idVendor           0x046d Logitech, Inc.
///   idProduct          0xc52b Unifying Receiver";
/// let names = parse_lsusb(out);
/// let n = names.get("046d:c52b").unwrap();
/// assert_eq!(n.vendor_name.as_deref(), Some("Logitech, Inc."));
/// assert_eq!(n.product_name.as_deref(), Some("Unifying Receiver"));
/// ```
pub fn parse_lsusb(output: &str) -> HashMap<String, Names> {
    let mut info: HashMap<String, Names> = HashMap::new();
    let mut current: Option<(String, Names)> = None;

    for line in output.lines().map(str::trim) {
        if line.starts_with("Bus ") && line.contains("Device ") {
            if let Some(caps) = BUS_LINE_ID.captures(line) {
                if let Some((key, names)) = current.take() {
                    info.insert(key, names);
                }
                let description = caps[3].trim();
                current = Some((
                    format!("{}:{}", &caps[1], &caps[2]),
                    Names {
                        vendor_name: (!description.is_empty()).then(|| description.to_string()),
                        product_name: None,
                    },
                ));
                continue;
            }
        }

        if let Some((_, names)) = current.as_mut() {
            if let Some(caps) = ID_VENDOR.captures(line) {
                names.vendor_name = Some(caps[1].trim().to_string());
            } else if let Some(caps) = ID_PRODUCT.captures(line) {
                names.product_name = Some(caps[1].trim().to_string());
            }
        }
    }

    if let Some((key, names)) = current.take() {
        info.insert(key, names);
    }

    info
}

/// Get name of vendor from [`usb_ids::Vendor`]
///
/// ```
/// use usbwhy::names;
/// assert_eq!(names::vendor("1d6b"), Some("Linux Foundation".to_owned()));
/// assert_eq!(names::vendor("zzzz"), None);
/// ```
pub fn vendor(vid: &str) -> Option<String> {
    let vid = u16::from_str_radix(vid, 16).ok()?;
    usb_ids::Vendor::from_id(vid).map(|v| v.name().to_owned())
}

/// Get name of product from [`usb_ids::Device`]
///
/// ```
/// use usbwhy::names;
/// assert_eq!(names::product("1d6b", "0003"), Some("3.0 root hub".to_owned()));
/// ```
pub fn product(vid: &str, pid: &str) -> Option<String> {
    let vid = u16::from_str_radix(vid, 16).ok()?;
    let pid = u16::from_str_radix(pid, 16).ok()?;
    usb_ids::Device::from_vid_pid(vid, pid).map(|d| d.name().to_owned())
}

fn lsusb_names() -> Result<HashMap<String, Names>> {
    match command::run("lsusb", &["-v"], LSUSB_TIMEOUT) {
        Ok(out) => Ok(parse_lsusb(&out)),
        Err(e) => {
            log::debug!("lsusb -v unavailable, trying short lsusb: {}", e);
            command::run("lsusb", &[], LSUSB_TIMEOUT).map(|out| parse_lsusb(&out))
        }
    }
}

/// Fill in names from a names table, only where a device is missing them
pub fn apply_names(devices: &mut [Device], names: &HashMap<String, Names>) {
    for device in devices.iter_mut() {
        if let Some(found) = device.vendor_product_key().and_then(|k| names.get(&k)) {
            if device.vendor_name.is_none() {
                device.vendor_name = found.vendor_name.clone();
            }
            if device.product_name.is_none() {
                device.product_name = found.product_name.clone();
            }
        }
    }
}

/// Fill in names from the USB IDs repository where still missing
pub fn apply_usb_ids(devices: &mut [Device]) {
    for device in devices.iter_mut() {
        if let (Some(vid), Some(pid)) = (device.vendor_id.clone(), device.product_id.clone()) {
            if device.vendor_name.is_none() {
                device.vendor_name = vendor(&vid);
            }
            if device.product_name.is_none() {
                device.product_name = product(&vid, &pid);
            }
        }
    }
}

/// Enrich `devices` with vendor and product names; `use_lsusb` false skips running `lsusb`
pub fn enrich(devices: &mut [Device], use_lsusb: bool) {
    if use_lsusb {
        match lsusb_names() {
            Ok(names) => {
                log::debug!("lsusb gave names for {} vendor:product ids", names.len());
                apply_names(devices, &names);
            }
            Err(e) => log::warn!("Unable to get names from lsusb: {:#}", e),
        }
    }
    apply_usb_ids(devices);
}
