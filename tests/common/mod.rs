//! Runs tests using actual binary, adapted from 'fd' method: https://github.com/sharkdp/fd/blob/master/tests/testenv/mod.rs
#![allow(dead_code)]
use std::env;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::process;

// if changing the report shape, regenerate with `--from-json DEVICES_DUMP --from-log KERNEL_LOG > file`
/// Device snapshot in `--dump-devices` format
pub const DEVICES_DUMP: &str = "./tests/data/devices.json";
/// Earlier snapshot containing a device no longer connected
pub const KNOWN_DEVICES_DUMP: &str = "./tests/data/known_devices.json";
/// Snapshot with no devices at all
pub const NO_DEVICES_DUMP: &str = "./tests/data/no_devices.json";
/// Syslog style kernel log matching [`DEVICES_DUMP`]
pub const KERNEL_LOG: &str = "./tests/data/kern.log";
/// Text report for [`DEVICES_DUMP`] and [`KERNEL_LOG`]
pub const TEXT_REPORT: &str = "./tests/data/report.txt";
/// Has no usbwhy config so defaults are used regardless of the user running tests
pub const CONFIG_HOME: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data");

pub fn read_dump(file_name: &str) -> BufReader<File> {
    let f = File::open(file_name).expect("Unable to open dump file");
    BufReader::new(f)
}

pub fn read_dump_to_string(file_name: &str) -> String {
    let mut ret = String::new();
    let mut br = read_dump(file_name);
    br.read_to_string(&mut ret)
        .unwrap_or_else(|_| panic!("Failed to read {}", file_name));
    ret
}

/// Environment for the integration tests.
pub struct TestEnv {
    /// Path to the *usbwhy* executable.
    usbwhy_exe: PathBuf,
    /// Kernel log passed with `--from-log`
    log_file: Option<String>,
    /// Normalize each line by sorting the whitespace-separated words
    normalize_line: bool,
    /// Strip whitespace at start
    strip_start: bool,
}

/// Find the *usbwhy* executable.
fn find_usbwhy_exe() -> PathBuf {
    // Tests exe is in target/debug/deps, the *usbwhy* exe is in target/debug
    let root = env::current_exe()
        .expect("tests executable")
        .parent()
        .expect("tests executable directory")
        .parent()
        .expect("usbwhy executable directory")
        .to_path_buf();

    let exe_name = if cfg!(windows) {
        "usbwhy.exe"
    } else {
        "usbwhy"
    };

    root.join(exe_name)
}

/// Format an error message for when *usbwhy* did not exit as expected.
fn format_exit_error(args: &[&str], output: &process::Output) -> String {
    format!(
        "`usbwhy {}` did not exit as expected ({}).\nstdout:\n---\n{}---\nstderr:\n---\n{}---",
        args.join(" "),
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

/// Format an error message for when the output of *usbwhy* did not match the expected output.
fn format_output_error(args: &[&str], expected: &str, actual: &str) -> String {
    // Generate diff text.
    let diff_text = diff::lines(expected, actual)
        .into_iter()
        .map(|diff| match diff {
            diff::Result::Left(l) => format!("-{}", l),
            diff::Result::Both(l, _) => format!(" {}", l),
            diff::Result::Right(r) => format!("+{}", r),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        concat!(
            "`usbwhy {}` did not produce the expected output.\n",
            "Showing diff between expected and actual:\n{}\n"
        ),
        args.join(" "),
        diff_text
    )
}

/// Normalize the output for comparison.
fn normalize_output(s: &str, trim_start: bool, normalize_line: bool) -> String {
    s.lines()
        .map(|line| {
            let line = if trim_start { line.trim_start() } else { line };
            if normalize_line {
                let mut words: Vec<_> = line.split_whitespace().collect();
                words.sort_unstable();
                return words.join(" ");
            }
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim whitespace from the beginning of each line.
fn trim_lines(s: &str) -> String {
    s.lines()
        .map(|line| line.trim_start())
        .fold(String::new(), |mut str, line| {
            str.push_str(line);
            str.push('\n');
            str
        })
}

impl TestEnv {
    pub fn new() -> TestEnv {
        TestEnv {
            usbwhy_exe: find_usbwhy_exe(),
            log_file: Some(KERNEL_LOG.to_string()),
            normalize_line: false,
            strip_start: false,
        }
    }

    pub fn normalize_line(self, normalize: bool, strip_start: bool) -> TestEnv {
        TestEnv {
            normalize_line: normalize,
            strip_start,
            ..self
        }
    }

    /// Use a different kernel log, or `None` for the system log sources
    pub fn log_file(self, log_file: Option<&str>) -> TestEnv {
        TestEnv {
            log_file: log_file.map(|s| s.to_string()),
            ..self
        }
    }

    /// Get the path of the usbwhy executable.
    #[cfg_attr(windows, allow(unused))]
    pub fn test_exe(&self) -> &PathBuf {
        &self.usbwhy_exe
    }

    fn command(&self, dump_file: Option<&str>, args: &[&str]) -> process::Command {
        let mut cmd = process::Command::new(&self.usbwhy_exe);
        cmd.env("XDG_CONFIG_HOME", CONFIG_HOME)
            .env_remove("RUST_LOG")
            .arg("--no-lsusb");
        if let Some(dump) = dump_file {
            cmd.arg("--from-json").arg(dump);
        }
        if let Some(log) = self.log_file.as_ref() {
            cmd.arg("--from-log").arg(log);
        }
        cmd.args(args);
        cmd
    }

    /// Run *usbwhy* and return the output regardless of status.
    pub fn run(&self, dump_file: Option<&str>, args: &[&str]) -> process::Output {
        self.command(dump_file, args).output().expect("usbwhy output")
    }

    /// Assert that calling *usbwhy* with the specified arguments exits 0 and get the output.
    pub fn assert_success_and_get_output(
        &self,
        dump_file: Option<&str>,
        args: &[&str],
    ) -> process::Output {
        let output = self.run(dump_file, args);

        // Check for exit status.
        if !output.status.success() {
            panic!("{}", format_exit_error(args, &output));
        }

        output
    }

    pub fn assert_success_and_get_normalized_output(
        &self,
        dump_file: Option<&str>,
        args: &[&str],
    ) -> String {
        let output = self.assert_success_and_get_output(dump_file, args);
        normalize_output(
            &String::from_utf8_lossy(&output.stdout),
            self.strip_start,
            self.normalize_line,
        )
    }

    /// Assert that calling *usbwhy* with the specified arguments produces the expected output.
    pub fn assert_output(
        &self,
        dump_file: Option<&str>,
        args: &[&str],
        expected: &str,
        contains: bool,
    ) {
        // Don't touch if doing contains
        let (expected, actual) = if contains {
            let output = self.assert_success_and_get_output(dump_file, args);
            (
                expected.to_string(),
                String::from_utf8_lossy(&output.stdout).to_string(),
            )
        // Normalize both expected and actual output.
        } else {
            (
                normalize_output(expected, self.strip_start, self.normalize_line),
                self.assert_success_and_get_normalized_output(dump_file, args),
            )
        };

        // Compare actual output to expected output.
        if contains {
            if !actual.contains(&expected) {
                panic!("{}", format_output_error(args, &expected, &actual));
            }
        } else if expected != actual {
            panic!("{}", format_output_error(args, &expected, &actual));
        }
    }

    /// Run with `--json` and parse stdout
    pub fn get_output_json(&self, dump_file: Option<&str>, args: &[&str]) -> serde_json::Value {
        let mut json_args = vec!["--json"];
        json_args.extend_from_slice(args);
        let output = self.assert_success_and_get_output(dump_file, &json_args);
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            panic!(
                "`usbwhy {}` did not print JSON: {}\n{}",
                json_args.join(" "),
                e,
                String::from_utf8_lossy(&output.stdout)
            )
        })
    }

    /// Assert `--json` output includes `expected`
    pub fn assert_output_json(
        &self,
        dump_file: Option<&str>,
        args: &[&str],
        expected: serde_json::Value,
    ) {
        let actual = self.get_output_json(dump_file, args);

        assert_json_diff::assert_json_include!(actual: actual, expected: expected);
    }

    /// Assert that calling *usbwhy* with the specified arguments produces the expected error,
    /// and does not succeed.
    pub fn assert_failure_with_error(
        &self,
        dump_file: Option<&str>,
        args: &[&str],
        expected: &str,
    ) {
        let status = self.assert_error(dump_file, args, Some(expected));
        if status.success() {
            panic!("error '{}' did not occur.", expected);
        }
    }

    /// Assert that calling *usbwhy* with the specified arguments does not succeed.
    pub fn assert_failure(&self, dump_file: Option<&str>, args: &[&str]) {
        let status = self.assert_error(dump_file, args, None);
        if status.success() {
            panic!("Failure did not occur as expected.");
        }
    }

    fn assert_error(
        &self,
        dump_file: Option<&str>,
        args: &[&str],
        expected: Option<&str>,
    ) -> process::ExitStatus {
        let output = self.run(dump_file, args);

        if let Some(expected) = expected {
            // Normalize both expected and actual output.
            let expected_error = trim_lines(expected).trim_end().to_string();
            let actual_err = trim_lines(&String::from_utf8_lossy(&output.stderr));

            // Compare actual output to expected output.
            if !actual_err.trim_start().starts_with(&expected_error) {
                panic!(
                    "{}",
                    format_output_error(args, &expected_error, &actual_err)
                );
            }
        }

        output.status
    }
}
