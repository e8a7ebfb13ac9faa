//! Where the magic happens for `usbwhy` binary!
use clap::Parser;
use std::env;
use std::io::IsTerminal;
use std::str::FromStr;

use usbwhy::classify::{filter_usb_entries, LogEntry};
use usbwhy::config::Config;
use usbwhy::device::{self, Device, DeviceFilter};
use usbwhy::diagnose::Diagnoser;
use usbwhy::display::{self, PrintSettings};
use usbwhy::error::Result;
use usbwhy::logsource::{self, LogFallback, LogFile, LogSource, LogWindow};
use usbwhy::names;
use usbwhy::report::Report;
use usbwhy::sysfs::{DeviceSupplier, JsonDumpSupplier, SysfsSupplier, SYSFS_USB_DEVICES};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Diagnose USB device issues by analyzing USB topology and kernel logs",
    after_help = "Examples:
  usbwhy                       # Analyze all USB devices
  usbwhy --device 1-1.2        # Focus on specific device
  usbwhy --device 1234:5678    # Focus on vendor:product ID
  usbwhy --since 3600          # Analyze last hour of logs
  usbwhy --lines 1000          # Analyze last 1000 log lines
  usbwhy --json                # JSON output
  usbwhy --verbose             # Show detailed log entries"
)]
struct Args {
    /// Focus on specific device: bus-device like '1-1.2' or vendor:product like '1234:5678'
    #[arg(long, value_name = "ID")]
    device: Option<String>,

    /// Analyze kernel logs from last N seconds
    #[arg(long, value_name = "SECONDS")]
    since: Option<u64>,

    /// Analyze last N lines of kernel logs (for dmesg/log files), 0 for all
    #[arg(long, value_name = "N")]
    lines: Option<usize>,

    /// Output results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Disable coloured output, can also use NO_COLOR environment variable
    #[arg(long, default_value_t = false)]
    no_color: bool,

    /// Show detailed log entries
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Path to user config file to use for custom settings
    #[arg(short, long)]
    config: Option<String>,

    /// Read devices from a JSON snapshot (written by --dump-devices) rather than sysfs
    #[arg(long, value_name = "FILE")]
    from_json: Option<String>,

    /// Read the kernel log from FILE rather than journalctl, dmesg or the system log files
    #[arg(long, value_name = "FILE")]
    from_log: Option<String>,

    /// Previously seen devices (a --dump-devices snapshot); those found in the log but no longer present are reported as disconnected
    #[arg(long, value_name = "FILE")]
    known_devices: Option<String>,

    /// Print the enumerated devices as JSON and exit
    #[arg(long, default_value_t = false)]
    dump_devices: bool,

    /// Root of the sysfs USB device directory
    #[arg(long, value_name = "DIR", default_value = SYSFS_USB_DEVICES)]
    sysfs_root: String,

    /// Do not run lsusb for device names
    #[arg(long, default_value_t = false)]
    no_lsusb: bool,

    /// Turn debugging information on. Alternatively can use RUST_LOG env: INFO, DEBUG, TRACE
    #[arg(short = 'd', long, action = clap::ArgAction::Count)]
    debug: u8,
}

/// Print the empty report for `--json`, else `message` on stderr
fn print_empty(args: &Args, message: &str) -> Result<()> {
    if args.json {
        println!("{}", Report::empty().to_json()?);
    } else {
        eprintln!("{}", message);
    }
    Ok(())
}

fn get_devices(args: &Args, config: &Config) -> Result<Vec<Device>> {
    match &args.from_json {
        Some(file_path) => {
            let mut devices = JsonDumpSupplier::new(file_path).devices()?;
            // snapshot may be from another host so only the bundled database
            names::apply_usb_ids(&mut devices);
            Ok(devices)
        }
        None => {
            let mut devices = SysfsSupplier::new(&args.sysfs_root)
                .devices()
                .unwrap_or_else(|e| {
                    log::warn!("Error enumerating devices: {:#}", e);
                    Vec::new()
                });
            names::enrich(&mut devices, !(args.no_lsusb || config.no_lsusb));
            Ok(devices)
        }
    }
}

fn get_log_entries(args: &Args, config: &Config) -> Result<Vec<LogEntry>> {
    let window = LogWindow {
        since: args.since,
        lines: args.lines,
    };

    match &args.from_log {
        Some(file_path) => {
            let text = LogFile::new(file_path, window.lines).read()?;
            let lines: Vec<&str> = text.lines().collect();
            Ok(logsource::apply_since(filter_usb_entries(&lines), window.since))
        }
        None => Ok(logsource::collect_entries(
            &LogFallback::system(&window, &config.log_files),
            &window,
        )),
    }
}

fn use_colours(args: &Args) -> bool {
    !args.no_color && env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// Runs the binary, returning the exit code for a completed run
fn run(args: Args) -> Result<i32> {
    usbwhy::set_log_level(args.debug)?;
    let config = Config::load(args.config.as_deref())?;
    log::trace!("Args {:?}, config {:?}", args, config);

    let filter = args
        .device
        .as_deref()
        .map(DeviceFilter::from_str)
        .transpose()?;

    let mut devices = get_devices(&args, &config)?;

    if args.dump_devices {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(0);
    }

    if devices.is_empty() {
        print_empty(&args, "No USB devices found.")?;
        return Ok(0);
    }

    let mut known_devices = match &args.known_devices {
        Some(file_path) => device::read_json_dump(file_path)?,
        None => Vec::new(),
    };

    if let Some(filter) = &filter {
        filter.retain(&mut devices);
        if devices.is_empty() {
            print_empty(
                &args,
                &format!("No device found matching: {}", args.device.as_deref().unwrap_or_default()),
            )?;
            return Ok(1);
        }
        filter.retain(&mut known_devices);
    }

    let entries = get_log_entries(&args, &config)?;
    let diagnosis = Diagnoser::new(&devices)
        .with_known_devices(&known_devices)
        .diagnose(&entries);

    if args.json {
        println!("{}", Report::new(&diagnosis).to_json()?);
    } else {
        let settings = PrintSettings {
            verbose: args.verbose,
            colours: use_colours(&args).then(|| config.colours.clone()),
            recent_entries: config.recent_entries,
            recent_unmatched: config.recent_unmatched,
            message_width: config.message_width,
        };
        display::print_report(&diagnosis, &settings);
    }

    Ok(0)
}

fn main() {
    let args = Args::parse();

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
