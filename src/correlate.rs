//! Join classified log entries to device records
//!
//! An entry bearing a bus-path is attached to the single device with that `device_id`. Otherwise an entry bearing a `vendor:product` pair is attached to every device with that pair, since several identical devices can be plugged in at once and the log line does not say which one it was. Anything else is unmatched.
use std::collections::HashMap;

use crate::classify::LogEntry;
use crate::device::Device;

/// Result of [`correlate`]: entries per device plus entries that matched nothing
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Correlation<'d, 'e> {
    /// Devices that received at least one entry, in order of first association, with their entries in log order
    targets: Vec<(&'d Device, Vec<&'e LogEntry>)>,
    /// Entries attached to no device, in log order
    unmatched: Vec<&'e LogEntry>,
}

impl<'d, 'e> Correlation<'d, 'e> {
    fn attach(&mut self, index: &mut HashMap<&'d str, usize>, device: &'d Device, entry: &'e LogEntry) {
        match index.get(device.device_id.as_str()) {
            Some(&i) => self.targets[i].1.push(entry),
            None => {
                index.insert(device.device_id.as_str(), self.targets.len());
                self.targets.push((device, vec![entry]));
            }
        }
    }

    /// Entries attached to the device with `device_id`; empty if none
    pub fn entries_for(&self, device_id: &str) -> &[&'e LogEntry] {
        self.targets
            .iter()
            .find(|(d, _)| d.device_id == device_id)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Every device that received entries, in order of first association
    pub fn targets(&self) -> &[(&'d Device, Vec<&'e LogEntry>)] {
        &self.targets
    }

    /// Entries attached to no device
    pub fn unmatched(&self) -> &[&'e LogEntry] {
        &self.unmatched
    }

    /// Number of entry to device associations, counting fan-out copies
    pub fn associations(&self) -> usize {
        self.targets.iter().map(|(_, e)| e.len()).sum()
    }
}

/// Map each entry to zero, one or many devices
///
/// Pure and deterministic: devices and entries are only borrowed, and the same inputs always give the same [`Correlation`].
///
/// ```
/// use usbwhy::classify::classify;
/// use usbwhy::correlate::correlate;
/// use usbwhy::device::Device;
///
/// let devices = vec![
///     Device::new("1-1").with_ids("046d", "c52b"),
///     Device::new("1-2").with_ids("046d", "c52b"),
/// ];
/// let entries = vec![classify("usb 1-1: reset"), classify("input: 046d:c52b as mouse0")];
/// let c = correlate(&devices, &entries);
/// assert_eq!(c.entries_for("1-1").len(), 2);
/// assert_eq!(c.entries_for("1-2").len(), 1);
/// assert!(c.unmatched().is_empty());
/// ```
pub fn correlate<'d, 'e, I>(devices: I, entries: &'e [LogEntry]) -> Correlation<'d, 'e>
where
    I: IntoIterator<Item = &'d Device>,
{
    let mut by_id: HashMap<&'d str, &'d Device> = HashMap::new();
    let mut by_vendor_product: HashMap<String, Vec<&'d Device>> = HashMap::new();

    for device in devices {
        // first record wins for a repeated device_id, in both lookups
        if by_id.contains_key(device.device_id.as_str()) {
            log::debug!("Ignoring repeated device record {}", device.device_id);
            continue;
        }
        by_id.insert(device.device_id.as_str(), device);
        if let Some(vp) = device.vendor_product_key() {
            by_vendor_product.entry(vp).or_default().push(device);
        }
    }

    let mut correlation = Correlation::default();
    let mut index: HashMap<&'d str, usize> = HashMap::new();

    for entry in entries {
        if let Some(device) = entry.device_id.as_deref().and_then(|id| by_id.get(id).copied()) {
            correlation.attach(&mut index, device, entry);
            continue;
        }

        if let Some(matches) = entry
            .vendor_product
            .as_ref()
            .and_then(|vp| by_vendor_product.get(vp))
        {
            for device in matches {
                correlation.attach(&mut index, *device, entry);
            }
            continue;
        }

        log::trace!("Unmatched log entry: {}", entry.message);
        correlation.unmatched.push(entry);
    }

    log::debug!(
        "Correlated {} entries: {} associations over {} devices, {} unmatched",
        entries.len(),
        correlation.associations(),
        correlation.targets.len(),
        correlation.unmatched.len()
    );

    correlation
}
