//! Enumerate USB devices from Linux sysfs
//!
//! Every directory in `/sys/bus/usb/devices` named like a bus-path is a device; interface (`1-1:1.0`) and controller (`usb1`) entries are skipped. Attributes are small text files so they are read directly rather than through udev.
use std::fs;
use std::path::{Path, PathBuf};

use crate::device::{self, Device};
use crate::error::{Error, ErrorKind, Result};
use crate::path::BusPath;

/// Default location of USB devices in sysfs
pub const SYSFS_USB_DEVICES: &str = "/sys/bus/usb/devices";

/// Anything that can supply the current list of device records
pub trait DeviceSupplier {
    /// Get the device records; order is preserved into the report
    fn devices(&self) -> Result<Vec<Device>>;
}

/// Reads devices from a sysfs style directory tree
#[derive(Debug, Clone)]
pub struct SysfsSupplier {
    root: PathBuf,
}

impl Default for SysfsSupplier {
    fn default() -> Self {
        Self::new(SYSFS_USB_DEVICES)
    }
}

/// Supplies devices from a JSON snapshot written by `--dump-devices`
#[derive(Debug, Clone)]
pub struct JsonDumpSupplier {
    file_path: String,
}

impl JsonDumpSupplier {
    /// New supplier reading `file_path`
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
        }
    }
}

impl DeviceSupplier for JsonDumpSupplier {
    fn devices(&self) -> Result<Vec<Device>> {
        device::read_json_dump(&self.file_path)
    }
}

/// Get device attribute from sysfs, trimmed; `None` if missing or unreadable
fn get_sysfs_string(device_dir: &Path, name: &str) -> Option<String> {
    match fs::read_to_string(device_dir.join(name)) {
        Ok(s) => Some(s.trim().to_string()),
        Err(_) => None,
    }
}

/// Driver name is the file name of the `driver` symlink target
fn get_sysfs_driver(device_dir: &Path) -> Option<String> {
    fs::read_link(device_dir.join("driver"))
        .ok()
        .and_then(|p| p.file_name().map(|f| f.to_string_lossy().to_string()))
}

impl SysfsSupplier {
    /// New supplier reading from `root`, normally [`SYSFS_USB_DEVICES`]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Read a single device directory; `None` if the name is not a bus-path or the entry has neither vendor nor product id
    fn read_device(&self, device_dir: &Path, path: BusPath) -> Option<Device> {
        let vendor_id = get_sysfs_string(device_dir, "idVendor");
        let product_id = get_sysfs_string(device_dir, "idProduct");
        if vendor_id.is_none() && product_id.is_none() {
            log::trace!("Skipping {}: no idVendor or idProduct", path);
            return None;
        }

        Some(Device {
            device_id: path.to_string(),
            vendor_id,
            product_id,
            vendor_name: None,
            product_name: None,
            device_class: get_sysfs_string(device_dir, "bDeviceClass"),
            speed: get_sysfs_string(device_dir, "speed"),
            driver: get_sysfs_driver(device_dir),
            bus_number: get_sysfs_string(device_dir, "busnum"),
            device_number: get_sysfs_string(device_dir, "devnum"),
            parent_id: path.parent().map(|p| p.to_string()),
        })
    }
}

impl DeviceSupplier for SysfsSupplier {
    fn devices(&self) -> Result<Vec<Device>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            Error::new(
                ErrorKind::NotFound,
                &format!("Unable to read {}: Error({})", self.root.display(), e),
            )
        })?;

        let mut found: Vec<(BusPath, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name();
                BusPath::parse(&name.to_string_lossy()).map(|p| (p, e.path()))
            })
            .filter(|(_, path)| path.is_dir())
            .collect();
        // read_dir order is arbitrary; keep output stable
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let devices: Vec<Device> = found
            .into_iter()
            .filter_map(|(bus_path, dir)| self.read_device(&dir, bus_path))
            .collect();
        log::debug!(
            "Found {} devices in {}",
            devices.len(),
            self.root.display()
        );

        Ok(devices)
    }
}
