//! Plain text rendering of a [`Diagnosis`], coloured with a [`ColourTheme`]
use colored::{Color, Colorize};
use itertools::Itertools;

use crate::analyzer::DeviceAnalysis;
use crate::classify::{Category, LogEntry};
use crate::colour::{paint, ColourTheme};
use crate::device::Device;
use crate::diagnose::Diagnosis;

const RULE_WIDTH: usize = 60;

/// Passed to render functions
#[derive(Debug, Clone)]
pub struct PrintSettings {
    /// Show recent log entries per device and unmatched entries
    pub verbose: bool,
    /// `None` for no colour or bold at all
    pub colours: Option<ColourTheme>,
    /// Recent entries shown per device in verbose mode
    pub recent_entries: usize,
    /// Unmatched entries shown in verbose mode
    pub recent_unmatched: usize,
    /// Messages truncated to this many characters
    pub message_width: usize,
}

impl Default for PrintSettings {
    fn default() -> Self {
        PrintSettings {
            verbose: false,
            colours: Some(ColourTheme::default()),
            recent_entries: 10,
            recent_unmatched: 20,
            message_width: 80,
        }
    }
}

impl PrintSettings {
    fn paint<S: AsRef<str>>(&self, s: S, pick: fn(&ColourTheme) -> Option<Color>) -> String {
        match self.colours.as_ref() {
            Some(ct) => paint(s, pick(ct)).to_string(),
            None => s.as_ref().to_string(),
        }
    }

    fn paint_bold<S: AsRef<str>>(&self, s: S, pick: fn(&ColourTheme) -> Option<Color>) -> String {
        match self.colours.as_ref() {
            Some(ct) => paint(s, pick(ct)).bold().to_string(),
            None => s.as_ref().to_string(),
        }
    }

    fn bold<S: AsRef<str>>(&self, s: S) -> String {
        match self.colours {
            Some(_) => s.as_ref().bold().to_string(),
            None => s.as_ref().to_string(),
        }
    }
}

/// First `width` characters of `message`
pub fn truncate(message: &str, width: usize) -> &str {
    match message.char_indices().nth(width) {
        Some((i, _)) => &message[..i],
        None => message,
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Device identity block, each line indented by `indent` levels
pub fn render_device(device: &Device, indent: usize, settings: &PrintSettings) -> Vec<String> {
    let prefix = "  ".repeat(indent);
    let mut ret = Vec::new();

    let mut id_line = format!("{}{}", prefix, settings.paint_bold(&device.device_id, |c| c.device_id));
    if let (Some(bus), Some(dev)) = (&device.bus_number, &device.device_number) {
        id_line.push_str(&format!(" (Bus {}, Device {})", bus, dev));
    }
    ret.push(id_line);

    if let Some(vp) = device.vendor_product_key() {
        let mut vp_line = format!("{}  ID: {}", prefix, settings.paint(&vp, |c| c.vid_pid));
        if let Some(name) = device.display_name() {
            vp_line.push_str(&format!(" {}", settings.paint(name, |c| c.name)));
        }
        ret.push(vp_line);
    }

    if let Some(class) = &device.device_class {
        ret.push(format!("{}  Class: {}", prefix, class));
    }
    if let Some(speed) = &device.speed {
        ret.push(format!("{}  Speed: {}", prefix, speed));
    }
    ret.push(match &device.driver {
        Some(d) => format!("{}  Driver: {}", prefix, settings.paint(d, |c| c.driver)),
        None => format!("{}  Driver: {}", prefix, settings.paint("none", |c| c.no_driver)),
    });

    ret
}

/// `[category] message` line for verbose listings
pub fn render_entry(entry: &LogEntry, settings: &PrintSettings) -> String {
    let category = entry.category();
    let tag = format!("[{}]", category);
    let tag = match settings.colours.as_ref() {
        Some(ct) => paint(&tag, ct.category(category)).to_string(),
        None => tag,
    };
    format!("  {} {}", tag, truncate(&entry.message, settings.message_width))
}

/// Non-zero counts as "3 resets, 1 over-current"; `None` if nothing to say
pub fn render_log_summary(analysis: &DeviceAnalysis<'_>, settings: &PrintSettings) -> Option<String> {
    let parts: [(Category, &str, fn(&ColourTheme) -> Option<Color>); 5] = [
        (Category::Reset, "resets", |_| None),
        (Category::Disconnect, "disconnects", |_| None),
        (Category::Error, "errors", |c| c.error),
        (Category::Warning, "warnings", |c| c.warning),
        (Category::OverCurrent, "over-current", |c| c.error),
    ];
    let summary = parts
        .iter()
        .filter_map(|(category, label, pick)| match analysis.count(*category) {
            0 => None,
            n => Some(settings.paint(format!("{} {}", n, label), *pick)),
        })
        .join(", ");

    if summary.is_empty() {
        None
    } else {
        Some(format!("Log summary: {}", summary))
    }
}

/// Full block for one analysis
pub fn render_analysis(analysis: &DeviceAnalysis<'_>, ghost: bool, settings: &PrintSettings) -> Vec<String> {
    let mut ret = vec![String::new(), settings.bold(rule())];

    let mut header = format!("Device: {}", analysis.device.device_id);
    if let Some(vp) = analysis.device.vendor_product_key() {
        header.push_str(&format!(" ({})", vp));
    }
    ret.push(settings.bold(header));
    ret.push(rule());
    ret.extend(render_device(analysis.device, 1, settings));
    if ghost {
        ret.push(settings.paint(
            "  Not currently connected, only seen in kernel logs",
            |c| c.ghost,
        ));
    }

    ret.push(String::new());
    if analysis.has_issues() {
        ret.push(settings.paint_bold("Issues detected:", |c| c.issue));
        for issue in &analysis.issues {
            ret.push(format!("  {} {}", settings.paint("•", |c| c.issue), issue));
        }
    } else {
        ret.push(settings.paint("No obvious issues detected", |c| c.healthy));
    }

    if !analysis.log_entries.is_empty() {
        ret.push(String::new());
        if let Some(summary) = render_log_summary(analysis, settings) {
            ret.push(summary);
        }

        if settings.verbose {
            ret.push(String::new());
            ret.push(settings.bold("Recent log entries:"));
            for entry in analysis.recent_entries(settings.recent_entries) {
                ret.push(render_entry(entry, settings));
            }
        }
    }

    ret
}

/// Section for entries matched to no device; empty if there are none
pub fn render_unmatched(unmatched: &[LogEntry], settings: &PrintSettings) -> Vec<String> {
    if unmatched.is_empty() {
        return Vec::new();
    }

    let mut ret = vec![
        String::new(),
        settings.bold(rule()),
        settings.paint_bold(
            format!("Unmatched log entries ({})", unmatched.len()),
            |c| c.attention,
        ),
        rule(),
        "These log entries couldn't be matched to any current device.".to_string(),
    ];

    if settings.verbose {
        let start = unmatched.len().saturating_sub(settings.recent_unmatched);
        for entry in &unmatched[start..] {
            ret.push(render_entry(entry, settings));
        }
    }

    ret
}

/// The whole text report
pub fn render_report(diagnosis: &Diagnosis<'_>, settings: &PrintSettings) -> String {
    let mut ret = vec![settings.bold("USB Device Analysis"), String::new()];

    if diagnosis.analyses.is_empty() {
        ret.push("No USB devices found or no devices match the specified criteria.".to_string());
        return ret.join("\n");
    }

    match diagnosis.devices_with_issues() {
        0 => ret.push(settings.paint_bold(
            format!(
                "All {} device(s) appear to be functioning normally",
                diagnosis.total_devices()
            ),
            |c| c.healthy,
        )),
        n => ret.push(settings.paint_bold(
            format!("Found {} device(s) with potential issues", n),
            |c| c.attention,
        )),
    }
    ret.push(String::new());

    for (i, analysis) in diagnosis.analyses.iter().enumerate() {
        ret.extend(render_analysis(analysis, diagnosis.is_ghost(i), settings));
    }
    ret.extend(render_unmatched(&diagnosis.unmatched, settings));

    ret.join("\n")
}

/// Print [`render_report`] to stdout
pub fn print_report(diagnosis: &Diagnosis<'_>, settings: &PrintSettings) {
    println!("{}", render_report(diagnosis, settings));
}
