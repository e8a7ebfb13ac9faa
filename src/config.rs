//! Config for usbwhy binary
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use crate::colour;
use crate::error::{Error, ErrorKind, Result};
use crate::logsource::DEFAULT_LOG_FILES;

const CONF_DIR: &str = "usbwhy";
const CONF_NAME: &str = "usbwhy.json";

/// Settings read from `usbwhy.json`; command line flags override these
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Config {
    /// User supplied [`colour::ColourTheme`] - overrides default
    pub colours: colour::ColourTheme,
    /// Recent entries shown per device in verbose mode
    pub recent_entries: usize,
    /// Recent unmatched entries shown in verbose mode
    pub recent_unmatched: usize,
    /// Log messages are truncated to this many characters in text output
    pub message_width: usize,
    /// Log files tried, in order, when neither the journal nor dmesg is available
    pub log_files: Vec<String>,
    /// Do not run `lsusb` for names; the bundled USB ID database is still used
    pub no_lsusb: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            colours: colour::ColourTheme::default(),
            recent_entries: 10,
            recent_unmatched: 20,
            message_width: 80,
            log_files: DEFAULT_LOG_FILES.iter().map(|s| s.to_string()).collect(),
            no_lsusb: false,
        }
    }
}

impl Config {
    /// Default new
    pub fn new() -> Config {
        Config {
            ..Default::default()
        }
    }

    /// Path of the default config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONF_DIR).join(CONF_NAME))
    }

    /// Attempt to read from .json format config at `file_path`
    pub fn from_file<P: Into<PathBuf>>(file_path: P) -> Result<Config> {
        let file_path = file_path.into();
        let f = File::open(&file_path).map_err(|e| {
            Error::new(
                ErrorKind::Io,
                &format!("Unable to open config {}: {}", file_path.display(), e),
            )
        })?;
        let mut br = BufReader::new(f);
        let mut data = String::new();

        br.read_to_string(&mut data)?;
        serde_json::from_str::<Config>(&data).map_err(|e| {
            Error::new(
                ErrorKind::Config,
                &format!("Failed to parse config {}: {}", file_path.display(), e),
            )
        })
    }

    /// Load `file_path` if given, which must exist, else the default location if it exists, else defaults
    pub fn load(file_path: Option<&str>) -> Result<Config> {
        match file_path {
            Some(p) => Config::from_file(p),
            None => match Config::default_path() {
                Some(p) if p.exists() => {
                    log::info!("Using config {}", p.display());
                    Config::from_file(p)
                }
                _ => Ok(Config::new()),
            },
        }
    }
}
